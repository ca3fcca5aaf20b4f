//! Attack validation and damage resolution.
//!
//! Attacks target a hex, not a tank: every enemy tank standing on the hex takes
//! the full shell, and a shot at an empty hex still spends ammo.

use crate::config::MatchConfig;
use crate::error::CommandError;
use crate::world::World;
use shared::{Hex, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub victim: PlayerId,
    pub damage: u32,
    pub remaining_hp: u32,
    /// True when this shell took the victim from positive hp to zero.
    pub killed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttackOutcome {
    pub ammo_spent: f64,
    pub hits: Vec<Hit>,
}

impl AttackOutcome {
    pub fn kills(&self) -> usize {
        self.hits.iter().filter(|h| h.killed).count()
    }
}

/// Validates and resolves one attack against the world as it is right now.
///
/// A rejected attack leaves the world untouched.
pub fn resolve_attack(
    config: &MatchConfig,
    world: &mut World,
    attacker: PlayerId,
    target: Hex,
) -> Result<AttackOutcome, CommandError> {
    let tank = world
        .tanks
        .get(&attacker)
        .ok_or(CommandError::UnknownPlayer(attacker))?;
    if tank.is_destroyed() {
        return Err(CommandError::TankDestroyed);
    }
    if !target.is_within(world.map_radius) {
        return Err(CommandError::OffMap {
            q: target.q,
            r: target.r,
        });
    }

    let stats = tank.stats(config);
    let distance = tank.position.distance_to(target);
    if distance > stats.shell_range {
        return Err(CommandError::OutOfRange {
            distance,
            range: stats.shell_range,
        });
    }
    if tank.ammo < stats.shot_ammo_cost {
        return Err(CommandError::NotEnoughAmmo {
            have: tank.ammo,
            need: stats.shot_ammo_cost,
        });
    }
    if distance == 0 {
        return Err(CommandError::OwnHex);
    }

    if let Some(tank) = world.tanks.get_mut(&attacker) {
        tank.ammo = (tank.ammo - stats.shot_ammo_cost).max(0.0);
    }

    let mut outcome = AttackOutcome {
        ammo_spent: stats.shot_ammo_cost,
        hits: Vec::new(),
    };
    for victim in world.tanks.values_mut() {
        if victim.owner == attacker || victim.position != target || victim.is_destroyed() {
            continue;
        }
        victim.hp = victim.hp.saturating_sub(stats.shell_damage);
        let killed = victim.hp == 0;
        if killed {
            victim.killed_by = Some(attacker);
        }
        outcome.hits.push(Hit {
            victim: victim.owner,
            damage: stats.shell_damage,
            remaining_hp: victim.hp,
            killed,
        });
    }

    let kills = outcome.kills() as u32;
    if kills > 0 {
        if let Some(record) = world.players.get_mut(&attacker) {
            record.kills += kills;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{PlayerRecord, Tank};
    use assert_approx_eq::assert_approx_eq;

    fn setup() -> (MatchConfig, World) {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        for (id, hex) in [(1, Hex::new(0, 0)), (2, Hex::new(3, 0))] {
            world.tanks.insert(id, Tank::new(id, hex, &config));
            world
                .players
                .insert(id, PlayerRecord::new(id, format!("p{}", id)));
        }
        (config, world)
    }

    #[test]
    fn test_hit_deals_damage_and_spends_ammo() {
        let (config, mut world) = setup();
        let outcome = resolve_attack(&config, &mut world, 1, Hex::new(3, 0)).unwrap();

        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].remaining_hp, 60);
        assert!(!outcome.hits[0].killed);
        assert_eq!(world.tanks[&2].hp, 60);
        assert_approx_eq!(world.tanks[&1].ammo, 42.0);
    }

    #[test]
    fn test_miss_still_spends_ammo() {
        let (config, mut world) = setup();
        let outcome = resolve_attack(&config, &mut world, 1, Hex::new(0, 2)).unwrap();
        assert!(outcome.hits.is_empty());
        assert_approx_eq!(world.tanks[&1].ammo, 42.0);
    }

    #[test]
    fn test_out_of_range_rejected_without_mutation() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&2).unwrap().position = Hex::new(6, 0);
        let before = world.tanks.clone();

        let err = resolve_attack(&config, &mut world, 1, Hex::new(6, 0)).unwrap_err();
        assert_eq!(err, CommandError::OutOfRange { distance: 6, range: 5 });
        assert_eq!(world.tanks, before);
    }

    #[test]
    fn test_cannon_extends_range_and_damage() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().upgrades.cannon = 1;
        world.tanks.get_mut(&2).unwrap().position = Hex::new(6, 0);

        let outcome = resolve_attack(&config, &mut world, 1, Hex::new(6, 0)).unwrap();
        assert_eq!(outcome.hits[0].damage, 50);
        assert_eq!(world.tanks[&2].hp, 50);
    }

    #[test]
    fn test_own_hex_rejected() {
        let (config, mut world) = setup();
        assert_eq!(
            resolve_attack(&config, &mut world, 1, Hex::new(0, 0)),
            Err(CommandError::OwnHex)
        );
        assert_approx_eq!(world.tanks[&1].ammo, 50.0);
    }

    #[test]
    fn test_off_map_rejected() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().position = Hex::new(8, 0);
        assert!(matches!(
            resolve_attack(&config, &mut world, 1, Hex::new(10, 0)),
            Err(CommandError::OffMap { q: 10, r: 0 })
        ));
    }

    #[test]
    fn test_second_attack_fails_without_ammo() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().ammo = 10.0;

        assert!(resolve_attack(&config, &mut world, 1, Hex::new(3, 0)).is_ok());
        let err = resolve_attack(&config, &mut world, 1, Hex::new(3, 0)).unwrap_err();
        assert!(matches!(err, CommandError::NotEnoughAmmo { .. }));
        assert_eq!(world.tanks[&2].hp, 60);
        assert_approx_eq!(world.tanks[&1].ammo, 2.0);
    }

    #[test]
    fn test_kill_credited_once() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&2).unwrap().hp = 30;

        let outcome = resolve_attack(&config, &mut world, 1, Hex::new(3, 0)).unwrap();
        assert_eq!(outcome.kills(), 1);
        assert_eq!(world.tanks[&2].hp, 0);
        assert_eq!(world.tanks[&2].killed_by, Some(1));
        assert_eq!(world.players[&1].kills, 1);

        // A tank already at zero hp is no longer a target
        let again = resolve_attack(&config, &mut world, 1, Hex::new(3, 0)).unwrap();
        assert!(again.hits.is_empty());
        assert_eq!(world.players[&1].kills, 1);
    }

    #[test]
    fn test_dead_attacker_rejected() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().alive = false;
        assert_eq!(
            resolve_attack(&config, &mut world, 1, Hex::new(3, 0)),
            Err(CommandError::TankDestroyed)
        );
    }
}
