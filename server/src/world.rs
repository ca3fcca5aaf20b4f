//! Authoritative match state: tanks, forts, players and the match clock.
//!
//! Everything here is owned by the tick loop. Subsystems receive `&mut World`
//! for the duration of one tick phase and never keep references past it.

use crate::config::MatchConfig;
use crate::economy::TankStats;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::hex::edge_hexes;
use shared::{
    FortId, FortKind, Hex, LeaderboardEntry, MatchPhase, PlayerId, UpgradeLevels,
    POINTS_PER_CAPTURE, POINTS_PER_KILL,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub owner: PlayerId,
    pub position: Hex,
    pub destination: Option<Hex>,
    /// Neighbor hex being entered, paired with `move_progress` in [0, 1)
    pub heading: Option<Hex>,
    pub move_progress: f64,
    pub hp: u32,
    pub fuel: f64,
    pub ammo: f64,
    pub gears: f64,
    pub upgrades: UpgradeLevels,
    pub alive: bool,
    pub respawn_at: Option<f64>,
    /// Player whose shell brought hp to zero, consumed by death processing
    pub killed_by: Option<PlayerId>,
}

impl Tank {
    pub fn new(owner: PlayerId, position: Hex, config: &MatchConfig) -> Self {
        Self {
            owner,
            position,
            destination: None,
            heading: None,
            move_progress: 0.0,
            hp: config.tank_max_hp,
            fuel: config.start_fuel,
            ammo: config.start_ammo,
            gears: 0.0,
            upgrades: UpgradeLevels::default(),
            alive: true,
            respawn_at: None,
            killed_by: None,
        }
    }

    pub fn stats(&self, config: &MatchConfig) -> TankStats {
        TankStats::derive(config, &self.upgrades)
    }

    /// Dead, or at zero hp and waiting for death processing this tick
    pub fn is_destroyed(&self) -> bool {
        !self.alive || self.hp == 0
    }

    pub fn halt(&mut self) {
        self.destination = None;
        self.heading = None;
        self.move_progress = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fort {
    pub id: FortId,
    pub position: Hex,
    pub kind: FortKind,
    pub owner: Option<PlayerId>,
    pub previous_owner: Option<PlayerId>,
    pub capture_progress: f64,
    /// Player the current `capture_progress` belongs to
    pub capturing_player: Option<PlayerId>,
    /// Distinct players with a tank on this hex as of the last capture pass
    pub occupants: BTreeSet<PlayerId>,
}

impl Fort {
    pub fn new(id: FortId, position: Hex, kind: FortKind) -> Self {
        Self {
            id,
            position,
            kind,
            owner: None,
            previous_owner: None,
            capture_progress: 0.0,
            capturing_player: None,
            occupants: BTreeSet::new(),
        }
    }

    /// Drops ownership; the fort becomes immediately contestable.
    pub fn release(&mut self, loser: PlayerId) {
        self.owner = None;
        self.previous_owner = Some(loser);
        self.capture_progress = 0.0;
        self.capturing_player = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub kills: u32,
    pub captures: u32,
    pub deaths: u32,
    pub connected: bool,
    pub disconnected_at: Option<f64>,
    pub rematch_vote: bool,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            kills: 0,
            captures: 0,
            deaths: 0,
            connected: true,
            disconnected_at: None,
            rematch_vote: false,
        }
    }

    /// Derived from the tallies so it can never drift from them
    pub fn score(&self) -> u32 {
        POINTS_PER_KILL * self.kills + POINTS_PER_CAPTURE * self.captures
    }
}

#[derive(Debug, Clone)]
pub struct World {
    pub tick: u64,
    /// Seconds on the server clock as of the last tick
    pub now: f64,
    pub phase: MatchPhase,
    /// Clock reading when the match started; `None` until someone joins
    pub started_at: Option<f64>,
    pub phase_since: f64,
    pub map_radius: u32,
    pub tanks: BTreeMap<PlayerId, Tank>,
    pub forts: Vec<Fort>,
    pub players: BTreeMap<PlayerId, PlayerRecord>,
}

impl World {
    pub fn new(config: &MatchConfig) -> Self {
        let forts = config
            .fort_sites()
            .into_iter()
            .enumerate()
            .map(|(i, hex)| Fort::new(i as FortId, hex, FortKind::CYCLE[i % FortKind::CYCLE.len()]))
            .collect();

        Self {
            tick: 0,
            now: 0.0,
            phase: MatchPhase::Active,
            started_at: None,
            phase_since: 0.0,
            map_radius: config.map_radius,
            tanks: BTreeMap::new(),
            forts,
            players: BTreeMap::new(),
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.started_at.map_or(0.0, |start| (self.now - start).max(0.0))
    }

    pub fn remaining(&self, config: &MatchConfig) -> f64 {
        (config.match_time - self.elapsed()).max(0.0)
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.players.get(&player).is_some_and(|p| p.connected)
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    pub fn player_name(&self, player: PlayerId) -> String {
        self.players
            .get(&player)
            .map_or_else(|| format!("player-{}", player), |p| p.name.clone())
    }

    pub fn forts_held(&self, player: PlayerId) -> u32 {
        self.forts
            .iter()
            .filter(|f| f.owner == Some(player))
            .count() as u32
    }

    /// A random map-edge hex free of living tanks and forts.
    ///
    /// Falls back to any edge hex when every edge hex is taken.
    pub fn random_edge_spawn<R: Rng>(&self, rng: &mut R) -> Hex {
        let taken: HashSet<Hex> = self
            .tanks
            .values()
            .filter(|t| t.alive)
            .map(|t| t.position)
            .chain(self.forts.iter().map(|f| f.position))
            .collect();
        let edges = edge_hexes(self.map_radius);
        let free: Vec<Hex> = edges.iter().copied().filter(|h| !taken.contains(h)).collect();
        free.choose(rng)
            .or_else(|| edges.choose(rng))
            .copied()
            .unwrap_or(Hex::ORIGIN)
    }

    /// Scores for every player in the match, best first
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(|p| LeaderboardEntry {
                player_id: p.id,
                name: p.name.clone(),
                score: p.score(),
                kills: p.kills,
                captures: p.captures,
                deaths: p.deaths,
                forts_held: self.forts_held(p.id),
                connected: p.connected,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.player_id.cmp(&b.player_id)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_world_forts_follow_layout() {
        let config = MatchConfig::default();
        let world = World::new(&config);

        assert_eq!(world.forts.len(), config.fort_count as usize);
        assert_eq!(world.forts[0].kind, FortKind::Fuel);
        assert_eq!(world.forts[1].kind, FortKind::Ammo);
        assert_eq!(world.forts[2].kind, FortKind::Gear);
        assert_eq!(world.forts[3].kind, FortKind::Mixed);
        assert!(world.forts.iter().all(|f| f.owner.is_none()));
        for (i, fort) in world.forts.iter().enumerate() {
            assert_eq!(fort.id as usize, i);
        }
    }

    #[test]
    fn test_score_tracks_tallies() {
        let mut record = PlayerRecord::new(1, "alpha".into());
        record.kills = 3;
        record.captures = 2;
        assert_eq!(record.score(), 40);
    }

    #[test]
    fn test_spawn_avoids_occupied_edges() {
        let config = MatchConfig {
            map_radius: 2,
            fort_count: 0,
            ..MatchConfig::default()
        };
        let mut world = World::new(&config);
        let edges = edge_hexes(2);
        // Leave a single free edge hex
        for (i, hex) in edges.iter().skip(1).enumerate() {
            world
                .tanks
                .insert(i as PlayerId + 10, Tank::new(i as PlayerId + 10, *hex, &config));
        }

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(world.random_edge_spawn(&mut rng), edges[0]);
        }
    }

    #[test]
    fn test_spawn_falls_back_when_edges_full() {
        let config = MatchConfig {
            map_radius: 2,
            fort_count: 0,
            ..MatchConfig::default()
        };
        let mut world = World::new(&config);
        for (i, hex) in edge_hexes(2).iter().enumerate() {
            world
                .tanks
                .insert(i as PlayerId, Tank::new(i as PlayerId, *hex, &config));
        }

        let mut rng = StdRng::seed_from_u64(9);
        let spawn = world.random_edge_spawn(&mut rng);
        assert_eq!(spawn.distance_to_center(), 2);
    }

    #[test]
    fn test_leaderboard_sorted_by_score_then_id() {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        for id in 1..=3 {
            world
                .players
                .insert(id, PlayerRecord::new(id, format!("p{}", id)));
        }
        world.players.get_mut(&3).unwrap().kills = 1;
        world.players.get_mut(&1).unwrap().captures = 2;
        world.forts[0].owner = Some(1);

        let board = world.leaderboard();
        let order: Vec<PlayerId> = board.iter().map(|e| e.player_id).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(board[0].score, 10);
        assert_eq!(board[0].forts_held, 1);
    }

    #[test]
    fn test_elapsed_starts_with_first_join() {
        let config = MatchConfig::default();
        let mut world = World::new(&config);
        world.now = 30.0;
        assert_eq!(world.elapsed(), 0.0);
        world.started_at = Some(10.0);
        assert_eq!(world.elapsed(), 20.0);
        assert_eq!(world.remaining(&config), config.match_time - 20.0);
    }
}
