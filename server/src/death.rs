//! Death, loot and respawn transitions.

use crate::config::MatchConfig;
use crate::world::World;
use log::info;
use rand::Rng;
use shared::{FortId, Hex, PlayerId};

/// Resources a dead tank lost, or the killer's cut of them
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Loot {
    pub fuel: f64,
    pub ammo: f64,
    pub gears: f64,
}

impl Loot {
    pub fn scaled(&self, share: f64) -> Loot {
        Loot {
            fuel: self.fuel * share,
            ammo: self.ammo * share,
            gears: self.gears * share,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeathReport {
    pub victim: PlayerId,
    pub killer: Option<PlayerId>,
    pub position: Hex,
    pub kept_forts: Vec<FortId>,
    pub released_forts: Vec<FortId>,
    /// Everything the victim lost.
    pub lost: Loot,
    /// Share handed to the killer; `None` without a killer still in the world.
    pub looted: Option<Loot>,
}

/// Transitions every tank that reached zero hp into the dead state.
///
/// Runs in two passes. The first halves each victim's resources, releases
/// their far forts and starts the respawn timer, in player id order. The
/// second pays every recorded killer its share of what the victim lost.
/// Loot is paid after all halving, so a killer destroyed in the same tick
/// keeps its cut through the respawn instead of losing half of it.
pub fn process_deaths(config: &MatchConfig, world: &mut World, now: f64) -> Vec<DeathReport> {
    let victims: Vec<PlayerId> = world
        .tanks
        .values()
        .filter(|t| t.alive && t.hp == 0)
        .map(|t| t.owner)
        .collect();

    let mut reports = Vec::with_capacity(victims.len());
    for victim in victims {
        let Some(tank) = world.tanks.get_mut(&victim) else {
            continue;
        };
        let position = tank.position;
        let killer = tank.killed_by.take().filter(|&k| k != victim);

        let before = (tank.fuel, tank.ammo, tank.gears);
        tank.fuel = (tank.fuel / 2.0).max(config.fuel_floor).min(config.max_fuel);
        tank.ammo = (tank.ammo / 2.0).max(config.ammo_floor).min(config.max_ammo);
        tank.gears /= 2.0;
        let lost = Loot {
            fuel: (before.0 - tank.fuel).max(0.0),
            ammo: (before.1 - tank.ammo).max(0.0),
            gears: (before.2 - tank.gears).max(0.0),
        };

        tank.alive = false;
        tank.respawn_at = Some(now + config.respawn_time);
        tank.halt();

        let (kept_forts, released_forts) = redistribute_forts(config, world, victim, position);

        if let Some(record) = world.players.get_mut(&victim) {
            record.deaths += 1;
        }
        info!(
            "Tank of player {} destroyed by {:?}, {} forts released",
            victim,
            killer,
            released_forts.len()
        );

        reports.push(DeathReport {
            victim,
            killer,
            position,
            kept_forts,
            released_forts,
            lost,
            looted: None,
        });
    }

    for report in reports.iter_mut() {
        report.looted = report
            .killer
            .and_then(|k| pay_loot(config, world, k, &report.lost));
    }
    reports
}

/// Credits the killer's cut of `lost`, clamped to the resource caps.
///
/// Returns `None` when the killer's tank has already left the world.
fn pay_loot(config: &MatchConfig, world: &mut World, killer: PlayerId, lost: &Loot) -> Option<Loot> {
    let tank = world.tanks.get_mut(&killer)?;
    let share = lost.scaled(config.loot_share);
    tank.fuel = (tank.fuel + share.fuel).min(config.max_fuel);
    tank.ammo = (tank.ammo + share.ammo).min(config.max_ammo);
    tank.gears += share.gears;
    Some(share)
}

/// Keeps the victim's nearest forts and releases the rest.
fn redistribute_forts(
    config: &MatchConfig,
    world: &mut World,
    victim: PlayerId,
    position: Hex,
) -> (Vec<FortId>, Vec<FortId>) {
    let mut owned: Vec<(u32, FortId)> = world
        .forts
        .iter()
        .filter(|f| f.owner == Some(victim))
        .map(|f| (f.position.distance_to(position), f.id))
        .collect();
    owned.sort_unstable();

    let keep = (config.forts_kept_on_death as usize).min(owned.len());
    let kept: Vec<FortId> = owned[..keep].iter().map(|&(_, id)| id).collect();
    let released: Vec<FortId> = owned[keep..].iter().map(|&(_, id)| id).collect();

    for fort in world.forts.iter_mut() {
        if released.contains(&fort.id) {
            fort.release(victim);
        }
    }
    (kept, released)
}

/// Releases every fort a player owns, as when their tank leaves the match
pub fn release_forts(world: &mut World, player: PlayerId) -> Vec<FortId> {
    world
        .forts
        .iter_mut()
        .filter(|f| f.owner == Some(player))
        .map(|f| {
            f.release(player);
            f.id
        })
        .collect()
}

/// Revives every dead tank whose respawn time has come, at a free edge hex.
pub fn process_respawns<R: Rng>(
    config: &MatchConfig,
    world: &mut World,
    now: f64,
    rng: &mut R,
) -> Vec<PlayerId> {
    let due: Vec<PlayerId> = world
        .tanks
        .values()
        .filter(|t| !t.alive && t.respawn_at.is_some_and(|at| now >= at))
        .map(|t| t.owner)
        .collect();

    for &player in &due {
        let spawn = world.random_edge_spawn(rng);
        if let Some(tank) = world.tanks.get_mut(&player) {
            tank.position = spawn;
            tank.hp = tank.stats(config).max_hp;
            tank.alive = true;
            tank.respawn_at = None;
            tank.killed_by = None;
            tank.halt();
        }
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{PlayerRecord, Tank};
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (MatchConfig, World) {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        for (id, hex) in [(1, Hex::new(0, 0)), (2, Hex::new(1, 0))] {
            world.tanks.insert(id, Tank::new(id, hex, &config));
            world
                .players
                .insert(id, PlayerRecord::new(id, format!("p{}", id)));
        }
        (config, world)
    }

    fn kill(world: &mut World, victim: PlayerId, killer: Option<PlayerId>) {
        let tank = world.tanks.get_mut(&victim).unwrap();
        tank.hp = 0;
        tank.killed_by = killer;
    }

    #[test]
    fn test_resources_halved() {
        let (config, mut world) = setup();
        {
            let tank = world.tanks.get_mut(&1).unwrap();
            tank.fuel = 100.0;
            tank.ammo = 50.0;
            tank.gears = 10.0;
        }
        kill(&mut world, 1, None);
        let reports = process_deaths(&config, &mut world, 12.0);

        let tank = &world.tanks[&1];
        assert_approx_eq!(tank.fuel, 50.0);
        assert_approx_eq!(tank.ammo, 25.0);
        assert_approx_eq!(tank.gears, 5.0);
        assert!(!tank.alive);
        assert_eq!(tank.respawn_at, Some(20.0));
        assert_eq!(reports.len(), 1);
        assert_approx_eq!(reports[0].lost.fuel, 50.0);
        assert_eq!(world.players[&1].deaths, 1);
    }

    #[test]
    fn test_resources_floored() {
        let (config, mut world) = setup();
        {
            let tank = world.tanks.get_mut(&1).unwrap();
            tank.fuel = 20.0;
            tank.ammo = 10.0;
            tank.gears = 0.0;
        }
        kill(&mut world, 1, None);
        let reports = process_deaths(&config, &mut world, 0.0);

        assert_approx_eq!(world.tanks[&1].fuel, 15.0);
        assert_approx_eq!(world.tanks[&1].ammo, 10.0);
        assert_approx_eq!(reports[0].lost.fuel, 5.0);
        assert_approx_eq!(reports[0].lost.ammo, 0.0);
    }

    #[test]
    fn test_two_nearest_forts_kept() {
        let (config, mut world) = setup();
        for fort in world.forts.iter_mut() {
            fort.owner = Some(1);
        }
        let death_spot = world.forts[3].position;
        world.tanks.get_mut(&1).unwrap().position = death_spot;
        kill(&mut world, 1, Some(2));

        let report = process_deaths(&config, &mut world, 0.0).remove(0);
        assert_eq!(report.kept_forts.len(), 2);
        assert_eq!(report.kept_forts[0], 3);
        assert_eq!(report.released_forts.len(), world.forts.len() - 2);

        let kept_distance = report
            .kept_forts
            .iter()
            .map(|&id| world.forts[id as usize].position.distance_to(death_spot))
            .max()
            .unwrap();
        for fort in &world.forts {
            if report.kept_forts.contains(&fort.id) {
                assert_eq!(fort.owner, Some(1));
            } else {
                assert_eq!(fort.owner, None);
                assert_eq!(fort.previous_owner, Some(1));
                assert_eq!(fort.capture_progress, 0.0);
                assert!(fort.position.distance_to(death_spot) >= kept_distance);
            }
        }
    }

    #[test]
    fn test_living_killer_collects_loot() {
        let (config, mut world) = setup();
        {
            let victim = world.tanks.get_mut(&1).unwrap();
            victim.fuel = 100.0;
            victim.gears = 8.0;
        }
        world.tanks.get_mut(&2).unwrap().fuel = 40.0;
        kill(&mut world, 1, Some(2));

        let report = process_deaths(&config, &mut world, 0.0).remove(0);
        let looted = report.looted.unwrap();
        assert_approx_eq!(looted.fuel, 25.0);
        assert_approx_eq!(world.tanks[&2].fuel, 65.0);
        assert_approx_eq!(world.tanks[&2].gears, 2.0);
    }

    #[test]
    fn test_loot_clamped_to_caps() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().ammo = 100.0;
        world.tanks.get_mut(&2).unwrap().ammo = 95.0;
        kill(&mut world, 1, Some(2));

        process_deaths(&config, &mut world, 0.0);
        assert_approx_eq!(world.tanks[&2].ammo, config.max_ammo);
    }

    #[test]
    fn test_mutual_kill_pays_both_killers() {
        let (config, mut world) = setup();
        world.tanks.get_mut(&1).unwrap().fuel = 100.0;
        world.tanks.get_mut(&2).unwrap().fuel = 60.0;
        kill(&mut world, 1, Some(2));
        kill(&mut world, 2, Some(1));

        let reports = process_deaths(&config, &mut world, 0.0);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.looted.is_some()));
        // 100 -> 50, plus half of the 30 player 2 lost
        assert_approx_eq!(world.tanks[&1].fuel, 65.0);
        // 60 -> 30, plus half of the 50 player 1 lost
        assert_approx_eq!(world.tanks[&2].fuel, 55.0);
    }

    #[test]
    fn test_killer_destroyed_same_tick_keeps_loot() {
        let (config, mut world) = setup();
        world.tanks.insert(3, Tank::new(3, Hex::new(2, 0), &config));
        world.players.insert(3, PlayerRecord::new(3, "p3".into()));
        world.tanks.get_mut(&1).unwrap().fuel = 100.0;
        world.tanks.get_mut(&2).unwrap().fuel = 80.0;
        world.tanks.get_mut(&3).unwrap().fuel = 60.0;

        // 2 kills 1, then 3 kills 2
        kill(&mut world, 1, Some(2));
        kill(&mut world, 2, Some(3));
        let reports = process_deaths(&config, &mut world, 0.0);

        assert_eq!(reports.len(), 2);
        assert_approx_eq!(world.tanks[&1].fuel, 50.0);
        assert!(!world.tanks[&2].alive);
        assert_approx_eq!(world.tanks[&2].fuel, 40.0 + 25.0);
        assert_approx_eq!(world.tanks[&3].fuel, 60.0 + 20.0);

        let looted = reports.iter().find(|r| r.victim == 1).unwrap().looted.unwrap();
        assert_approx_eq!(looted.fuel, 25.0);
    }

    #[test]
    fn test_loot_skipped_when_killer_left() {
        let (config, mut world) = setup();
        kill(&mut world, 1, Some(2));
        world.tanks.remove(&2);

        let report = process_deaths(&config, &mut world, 0.0).remove(0);
        assert_eq!(report.killer, Some(2));
        assert!(report.looted.is_none());
    }

    #[test]
    fn test_death_processed_once() {
        let (config, mut world) = setup();
        kill(&mut world, 1, None);
        assert_eq!(process_deaths(&config, &mut world, 0.0).len(), 1);
        assert!(process_deaths(&config, &mut world, 0.05).is_empty());
        assert_eq!(world.players[&1].deaths, 1);
    }

    #[test]
    fn test_respawn_exactly_after_delay() {
        let (config, mut world) = setup();
        let mut rng = StdRng::seed_from_u64(3);
        world.tanks.get_mut(&1).unwrap().upgrades.armor = 1;
        kill(&mut world, 1, None);
        process_deaths(&config, &mut world, 10.0);
        let fuel = world.tanks[&1].fuel;

        assert!(process_respawns(&config, &mut world, 17.99, &mut rng).is_empty());
        assert!(!world.tanks[&1].alive);

        assert_eq!(process_respawns(&config, &mut world, 18.0, &mut rng), vec![1]);
        let tank = &world.tanks[&1];
        assert!(tank.alive);
        assert_eq!(tank.hp, 120);
        assert_eq!(tank.position.distance_to_center(), config.map_radius);
        assert_approx_eq!(tank.fuel, fuel);
    }

    #[test]
    fn test_release_forts_on_leave() {
        let (_config, mut world) = setup();
        world.forts[0].owner = Some(2);
        world.forts[5].owner = Some(2);
        world.forts[6].owner = Some(1);

        assert_eq!(release_forts(&mut world, 2), vec![0, 5]);
        assert_eq!(world.forts[0].previous_owner, Some(2));
        assert_eq!(world.forts[6].owner, Some(1));
    }
}
