//! Derived tank stats, upgrade purchases and fort income.

use crate::config::MatchConfig;
use crate::error::CommandError;
use crate::world::{Tank, World};
use shared::{
    UpgradeKind, UpgradeLevels, ARMOR_HP_PER_LEVEL, CANNON_DAMAGE_PER_LEVEL, ENGINE_SPEED_BONUS,
    MAX_UPGRADE_LEVEL,
};

/// Stats a tank derives from its upgrade levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankStats {
    /// Hexes per second.
    pub speed: f64,
    pub max_hp: u32,
    pub shell_damage: u32,
    /// Maximum hex distance of an attack.
    pub shell_range: u32,
    pub vision_range: u32,
    pub shot_ammo_cost: f64,
}

impl TankStats {
    pub fn derive(config: &MatchConfig, levels: &UpgradeLevels) -> Self {
        Self {
            speed: config.base_speed * (1.0 + ENGINE_SPEED_BONUS * f64::from(levels.engine)),
            max_hp: config.tank_max_hp + ARMOR_HP_PER_LEVEL * u32::from(levels.armor),
            shell_damage: config.shell_damage + CANNON_DAMAGE_PER_LEVEL * u32::from(levels.cannon),
            shell_range: config.shell_range + u32::from(levels.cannon),
            vision_range: config.fog_range + u32::from(levels.sensor),
            shot_ammo_cost: (config.shot_ammo_cost
                - config.loader_reduction * f64::from(levels.loader))
            .max(0.0),
        }
    }
}

/// Gear cost to raise an upgrade from `level`, or `None` when already maxed.
pub fn upgrade_cost(config: &MatchConfig, level: u8) -> Option<u32> {
    if level >= MAX_UPGRADE_LEVEL {
        return None;
    }
    config.upgrade_costs.get(level as usize).copied()
}

/// Buys one level of `kind` for the tank and returns the new level.
///
/// Armor raises max hp and heals the tank by the same amount.
pub fn purchase(config: &MatchConfig, tank: &mut Tank, kind: UpgradeKind) -> Result<u8, CommandError> {
    let level = tank.upgrades.get(kind);
    let cost = upgrade_cost(config, level).ok_or(CommandError::MaxLevel(kind))?;
    if tank.gears < f64::from(cost) {
        return Err(CommandError::NotEnoughGears {
            have: tank.gears,
            need: cost,
        });
    }

    tank.gears -= f64::from(cost);
    *tank.upgrades.get_mut(kind) += 1;

    if kind == UpgradeKind::Armor {
        let max_hp = tank.stats(config).max_hp;
        tank.hp = (tank.hp + ARMOR_HP_PER_LEVEL).min(max_hp);
    }
    Ok(level + 1)
}

/// Credits every owned fort's yield for `dt` seconds to its owner's tank.
///
/// Destroyed tanks earn nothing until they respawn.
pub fn accrue_resources(config: &MatchConfig, world: &mut World, dt: f64) {
    for fort in &world.forts {
        let Some(owner) = fort.owner else {
            continue;
        };
        let Some(tank) = world.tanks.get_mut(&owner) else {
            continue;
        };
        if tank.is_destroyed() {
            continue;
        }
        if fort.kind.yields_fuel() {
            tank.fuel = (tank.fuel + config.fort_fuel_gen * dt).min(config.max_fuel);
        }
        if fort.kind.yields_ammo() {
            tank.ammo = (tank.ammo + config.fort_ammo_gen * dt).min(config.max_ammo);
        }
        if fort.kind.yields_gears() {
            tank.gears += config.fort_gear_gen * dt;
        }
    }
}
