//! World invariants - sanity checks that detect simulation bugs.
//!
//! None of these can be violated by player input. A violation means a tick
//! phase broke the model, so they are checked after every tick in debug
//! builds and asserted by the test suite.

use crate::config::MatchConfig;
use crate::world::World;
use shared::MAX_UPGRADE_LEVEL;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub message: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Checks every world invariant; an empty result means the world is sound.
#[must_use]
pub fn check_invariants(config: &MatchConfig, world: &World) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut violation = |message: String| violations.push(InvariantViolation { message });

    for (&id, tank) in &world.tanks {
        if tank.owner != id {
            violation(format!("Tank keyed by {} is owned by {}", id, tank.owner));
        }
        if !(0.0..=config.max_fuel).contains(&tank.fuel) {
            violation(format!("Tank {} has fuel {} outside [0, {}]", id, tank.fuel, config.max_fuel));
        }
        if !(0.0..=config.max_ammo).contains(&tank.ammo) {
            violation(format!("Tank {} has ammo {} outside [0, {}]", id, tank.ammo, config.max_ammo));
        }
        if !(tank.gears >= 0.0 && tank.gears.is_finite()) {
            violation(format!("Tank {} has gears {}", id, tank.gears));
        }
        let max_hp = tank.stats(config).max_hp;
        if tank.hp > max_hp {
            violation(format!("Tank {} has hp {} > max {}", id, tank.hp, max_hp));
        }
        if !tank.alive && (tank.hp != 0 || tank.respawn_at.is_none()) {
            violation(format!("Dead tank {} has hp {} and respawn {:?}", id, tank.hp, tank.respawn_at));
        }
        if !tank.position.is_within(world.map_radius) {
            violation(format!("Tank {} is off the map at {:?}", id, tank.position));
        }
        for kind in shared::UpgradeKind::ALL {
            if tank.upgrades.get(kind) > MAX_UPGRADE_LEVEL {
                violation(format!("Tank {} has {} above max level", id, kind));
            }
        }
        if !world.players.contains_key(&id) {
            violation(format!("Tank {} has no player record", id));
        }
    }

    for fort in &world.forts {
        if !(0.0..=1.0).contains(&fort.capture_progress) {
            violation(format!("Fort {} has capture progress {}", fort.id, fort.capture_progress));
        }
        if fort.capture_progress > 0.0 {
            match fort.capturing_player {
                None => violation(format!("Fort {} has progress but no capturer", fort.id)),
                Some(p) if fort.owner == Some(p) => {
                    violation(format!("Fort {} is being captured by its owner {}", fort.id, p))
                }
                Some(_) => {}
            }
        }
        if let Some(owner) = fort.owner {
            if !world.is_connected(owner) {
                violation(format!("Fort {} is owned by absent player {}", fort.id, owner));
            }
        }
    }

    let connected = world.connected_count();
    if connected > config.max_players as usize {
        violation(format!("{} connected players exceed the cap of {}", connected, config.max_players));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{PlayerRecord, Tank};
    use shared::Hex;

    fn setup() -> (MatchConfig, World) {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        world.tanks.insert(1, Tank::new(1, Hex::new(8, 0), &config));
        world.players.insert(1, PlayerRecord::new(1, "p1".into()));
        (config, world)
    }

    #[test]
    fn test_fresh_world_is_sound() {
        let (config, world) = setup();
        assert!(check_invariants(&config, &world).is_empty());
    }

    #[test]
    fn test_detects_resource_out_of_bounds() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().fuel = -1.0;
        world.tanks.get_mut(&1).unwrap().ammo = 101.0;
        assert_eq!(check_invariants(&config, &world).len(), 2);
    }

    #[test]
    fn test_detects_fort_owned_by_absent_player() {
        let (config, mut world) = setup();
        world.forts[0].owner = Some(7);
        let violations = check_invariants(&config, &world);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("absent player 7"));
    }

    #[test]
    fn test_detects_orphan_progress() {
        let (config, mut world) = setup();
        world.forts[1].capture_progress = 0.4;
        assert_eq!(check_invariants(&config, &world).len(), 1);
    }
}
