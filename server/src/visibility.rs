//! Fog of war and per-player snapshot construction.
//!
//! A [`SpatialIndex`] is built once per tick; every player's snapshot is then
//! assembled by walking that player's visible hexes, so the cost scales with
//! what the player can see rather than with the size of the world.

use crate::config::MatchConfig;
use crate::world::{Fort, Tank, World};
use shared::{
    EnemyTankView, FortView, Hex, LeaderboardEntry, MatchPhase, OwnTankView, PlayerId,
    RematchStatus, Snapshot,
};
use std::collections::{BTreeSet, HashMap};

/// Hex lookups for tanks and forts, rebuilt every tick.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tanks_by_hex: HashMap<Hex, Vec<PlayerId>>,
    forts_by_hex: HashMap<Hex, usize>,
    forts_by_owner: HashMap<PlayerId, Vec<usize>>,
}

impl SpatialIndex {
    pub fn build(world: &World) -> Self {
        let mut index = SpatialIndex::default();
        for tank in world.tanks.values().filter(|t| !t.is_destroyed()) {
            index
                .tanks_by_hex
                .entry(tank.position)
                .or_default()
                .push(tank.owner);
        }
        for (i, fort) in world.forts.iter().enumerate() {
            index.forts_by_hex.insert(fort.position, i);
            if let Some(owner) = fort.owner {
                index.forts_by_owner.entry(owner).or_default().push(i);
            }
        }
        index
    }

    pub fn tanks_at(&self, hex: &Hex) -> &[PlayerId] {
        self.tanks_by_hex.get(hex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fort_at(&self, hex: &Hex) -> Option<usize> {
        self.forts_by_hex.get(hex).copied()
    }

    pub fn forts_owned_by(&self, player: PlayerId) -> &[usize] {
        self.forts_by_owner.get(&player).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds fog-filtered snapshots from one tick's world state.
///
/// Holds only shared references, so building snapshots never mutates the world.
pub struct SnapshotBuilder<'a> {
    config: &'a MatchConfig,
    world: &'a World,
    index: SpatialIndex,
    leaderboard: Vec<LeaderboardEntry>,
    timestamp: u64,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(config: &'a MatchConfig, world: &'a World, timestamp: u64) -> Self {
        Self {
            config,
            world,
            index: SpatialIndex::build(world),
            leaderboard: world.leaderboard(),
            timestamp,
        }
    }

    /// Hexes inside the fog radius of the player's living tanks, clipped to the map.
    pub fn visible_hexes(&self, player: PlayerId) -> BTreeSet<Hex> {
        let radius = self.world.map_radius;
        self.world
            .tanks
            .values()
            .filter(|t| t.owner == player && !t.is_destroyed())
            .flat_map(|t| t.position.area(t.stats(self.config).vision_range))
            .filter(|h| h.is_within(radius))
            .collect()
    }

    /// The snapshot for one player, or `None` if they have no tank.
    ///
    /// Feed, chat and the last processed input are left empty for the session
    /// layer to fill in.
    pub fn build(&self, player: PlayerId) -> Option<Snapshot> {
        let tank = self.world.tanks.get(&player)?;
        let visible = self.visible_hexes(player);

        let mut enemies = Vec::new();
        let mut fort_indices = BTreeSet::new();
        for hex in &visible {
            for &owner in self.index.tanks_at(hex) {
                if owner == player {
                    continue;
                }
                if let Some(enemy) = self.world.tanks.get(&owner) {
                    enemies.push(self.enemy_view(enemy));
                }
            }
            if let Some(i) = self.index.fort_at(hex) {
                fort_indices.insert(i);
            }
        }
        fort_indices.extend(self.index.forts_owned_by(player).iter().copied());
        enemies.sort_by_key(|e| e.owner);

        let forts = fort_indices
            .into_iter()
            .filter_map(|i| self.world.forts.get(i))
            .map(fort_view)
            .collect();

        Some(Snapshot {
            tick: self.world.tick,
            timestamp: self.timestamp,
            phase: self.world.phase,
            elapsed_time: self.world.elapsed(),
            remaining_time: self.world.remaining(self.config),
            last_processed_input: 0,
            own_tank: self.own_view(tank),
            visible_enemy_tanks: enemies,
            forts,
            visible_hexes: visible.into_iter().collect(),
            leaderboard: self.leaderboard.clone(),
            feed_events: Vec::new(),
            chat_messages: Vec::new(),
            rematch: self.rematch_status(player),
        })
    }

    fn own_view(&self, tank: &Tank) -> OwnTankView {
        let stats = tank.stats(self.config);
        OwnTankView {
            position: tank.position,
            destination: tank.destination,
            hp: tank.hp,
            max_hp: stats.max_hp,
            fuel: tank.fuel,
            max_fuel: self.config.max_fuel,
            ammo: tank.ammo,
            max_ammo: self.config.max_ammo,
            gears: tank.gears,
            upgrades: tank.upgrades,
            alive: tank.alive,
            respawn_in: tank
                .respawn_at
                .map(|at| (at - self.world.now).max(0.0)),
            speed: stats.speed,
            vision_range: stats.vision_range,
            shell_damage: stats.shell_damage,
            shell_range: stats.shell_range,
            shot_ammo_cost: stats.shot_ammo_cost,
        }
    }

    fn enemy_view(&self, tank: &Tank) -> EnemyTankView {
        EnemyTankView {
            owner: tank.owner,
            position: tank.position,
            hp: tank.hp,
            max_hp: tank.stats(self.config).max_hp,
            alive: tank.alive,
        }
    }

    fn rematch_status(&self, player: PlayerId) -> Option<RematchStatus> {
        let world = self.world;
        let closes_at = match world.phase {
            MatchPhase::Active => return None,
            MatchPhase::Ended => {
                world.phase_since + self.config.post_match_time + self.config.rematch_window
            }
            MatchPhase::RematchVote => world.phase_since + self.config.rematch_window,
        };
        let connected = world.players.values().filter(|p| p.connected);
        Some(RematchStatus {
            votes: connected.clone().filter(|p| p.rematch_vote).count() as u32,
            connected: connected.count() as u32,
            voted: world.players.get(&player).is_some_and(|p| p.rematch_vote),
            closes_in: (closes_at - world.now).max(0.0),
        })
    }
}

fn fort_view(fort: &Fort) -> FortView {
    FortView {
        id: fort.id,
        position: fort.position,
        kind: fort.kind,
        owner: fort.owner,
        previous_owner: fort.previous_owner,
        capture_progress: fort.capture_progress,
        capturing_player: fort.capturing_player,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PlayerRecord;

    fn setup(positions: &[(PlayerId, Hex)]) -> (MatchConfig, World) {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        for &(id, hex) in positions {
            world.tanks.insert(id, Tank::new(id, hex, &config));
            world
                .players
                .insert(id, PlayerRecord::new(id, format!("p{}", id)));
        }
        (config, world)
    }

    #[test]
    fn test_visible_hexes_follow_fog_radius() {
        let (config, world) = setup(&[(1, Hex::new(0, 0))]);
        let builder = SnapshotBuilder::new(&config, &world, 0);
        let visible = builder.visible_hexes(1);
        assert_eq!(visible.len(), 37);
        assert!(visible.iter().all(|h| h.distance_to_center() <= 3));
    }

    #[test]
    fn test_visible_hexes_clipped_to_map() {
        let (config, world) = setup(&[(1, Hex::new(8, 0))]);
        let builder = SnapshotBuilder::new(&config, &world, 0);
        let visible = builder.visible_hexes(1);
        assert!(visible.len() < 37);
        assert!(visible.iter().all(|h| h.is_within(config.map_radius)));
    }

    #[test]
    fn test_sensor_widens_view() {
        let (config, mut world) = setup(&[(1, Hex::new(0, 0)), (2, Hex::new(4, 0))]);
        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        assert!(snapshot.visible_enemy_tanks.is_empty());

        world.tanks.get_mut(&1).unwrap().upgrades.sensor = 1;
        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        assert_eq!(snapshot.visible_enemy_tanks.len(), 1);
        assert_eq!(snapshot.visible_enemy_tanks[0].owner, 2);
        assert_eq!(snapshot.own_tank.vision_range, 4);
    }

    #[test]
    fn test_enemies_outside_fog_omitted() {
        let (config, world) = setup(&[
            (1, Hex::new(0, 0)),
            (2, Hex::new(2, 0)),
            (3, Hex::new(-6, 0)),
        ]);
        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        let owners: Vec<PlayerId> = snapshot.visible_enemy_tanks.iter().map(|e| e.owner).collect();
        assert_eq!(owners, vec![2]);
        assert_eq!(snapshot.leaderboard.len(), 3);
    }

    #[test]
    fn test_own_forts_always_visible() {
        let (config, mut world) = setup(&[(1, Hex::new(0, 0))]);
        world.forts[0].owner = Some(1);
        let far = world.forts[0].position;
        world.tanks.get_mut(&1).unwrap().position = Hex::new(-far.q, -far.r);

        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        assert!(snapshot.forts.iter().any(|f| f.id == 0));
        assert!(!snapshot.visible_hexes.contains(&far));
        for fort in &snapshot.forts {
            assert!(fort.owner == Some(1) || snapshot.visible_hexes.contains(&fort.position));
        }
    }

    #[test]
    fn test_dead_player_sees_only_own_assets() {
        let (config, mut world) = setup(&[(1, Hex::new(0, 0)), (2, Hex::new(1, 0))]);
        world.forts[2].owner = Some(1);
        {
            let tank = world.tanks.get_mut(&1).unwrap();
            tank.alive = false;
            tank.hp = 0;
            tank.respawn_at = Some(5.0);
        }
        world.now = 2.0;

        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        assert!(snapshot.visible_hexes.is_empty());
        assert!(snapshot.visible_enemy_tanks.is_empty());
        assert_eq!(snapshot.forts.len(), 1);
        assert_eq!(snapshot.own_tank.respawn_in, Some(3.0));
    }

    #[test]
    fn test_building_twice_is_identical() {
        let (config, mut world) = setup(&[(1, Hex::new(0, 0)), (2, Hex::new(2, -1))]);
        world.forts[1].owner = Some(2);
        let before = world.clone();

        let builder = SnapshotBuilder::new(&config, &world, 99);
        let first = builder.build(1);
        let second = builder.build(1);
        assert_eq!(first, second);
        assert_eq!(world.tanks, before.tanks);
        assert_eq!(world.forts, before.forts);
    }

    #[test]
    fn test_rematch_status_only_after_match() {
        let (config, mut world) = setup(&[(1, Hex::new(0, 0)), (2, Hex::new(3, 0))]);
        let snapshot = SnapshotBuilder::new(&config, &world, 0).build(1).unwrap();
        assert!(snapshot.rematch.is_none());

        world.phase = MatchPhase::RematchVote;
        world.phase_since = 100.0;
        world.now = 110.0;
        world.players.get_mut(&2).unwrap().rematch_vote = true;
        let status = SnapshotBuilder::new(&config, &world, 0)
            .build(1)
            .unwrap()
            .rematch
            .unwrap();
        assert_eq!(status.votes, 1);
        assert_eq!(status.connected, 2);
        assert!(!status.voted);
        assert_eq!(status.closes_in, 20.0);
    }
}
