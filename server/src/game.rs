use crate::capture::advance_captures;
use crate::combat::resolve_attack;
use crate::config::MatchConfig;
use crate::death::{process_deaths, process_respawns, release_forts};
use crate::economy::{accrue_resources, purchase};
use crate::error::{CommandError, JoinError};
use crate::invariants::check_invariants;
use crate::movement::{advance_tanks, set_destination};
use crate::visibility::SnapshotBuilder;
use crate::world::{PlayerRecord, Tank, World};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ChatMessage, Command, FeedEvent, MatchPhase, PlayerId, Snapshot, MAX_CHAT_LEN};
use std::collections::BTreeMap;

/// A command waiting for the next tick, stamped with its global arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub player: PlayerId,
    pub sequence: u32,
    pub arrival: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub player: PlayerId,
    pub sequence: u32,
    pub error: CommandError,
}

/// Everything a tick produced that the session layer has to deliver.
#[derive(Debug, Default)]
pub struct TickReport {
    pub feed: Vec<FeedEvent>,
    pub chat: Vec<ChatMessage>,
    pub rejections: Vec<Rejection>,
    /// Highest input sequence handled per player this tick, accepted or not
    pub processed: BTreeMap<PlayerId, u32>,
    /// Set when the rematch window ran out and every connection must close
    pub closed: bool,
}

/// The authoritative match: tunables, world and the tick pipeline
///
/// Owned by the server's tick loop and never shared. Connection tasks reach it
/// only through the commands passed to [`GameState::step`].
pub struct GameState {
    pub config: MatchConfig,
    pub world: World,
    rng: StdRng,
    next_player_id: PlayerId,
    pending_feed: Vec<FeedEvent>,
}

impl GameState {
    /// Creates an empty lobby with the fort layout already in place
    ///
    /// A configured seed makes spawns reproducible; otherwise the generator
    /// is seeded from the OS.
    pub fn new(config: MatchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            world: World::new(&config),
            config,
            rng,
            next_player_id: 1,
            pending_feed: Vec::new(),
        }
    }

    pub fn connected_count(&self) -> usize {
        self.world.connected_count()
    }

    /// Admits a player and spawns their tank on a free edge hex.
    ///
    /// Fails with [`JoinError::ServerFull`] when the connected players already
    /// fill the match. The first join starts the match clock, and every join
    /// is announced in the next tick's feed.
    pub fn add_player(&mut self, name: String, now: f64) -> Result<PlayerId, JoinError> {
        if self.connected_count() >= self.config.max_players as usize {
            return Err(JoinError::ServerFull);
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        let spawn = self.world.random_edge_spawn(&mut self.rng);
        self.world.tanks.insert(id, Tank::new(id, spawn, &self.config));
        self.world
            .players
            .insert(id, PlayerRecord::new(id, name.clone()));

        if self.world.started_at.is_none() {
            self.world.now = self.world.now.max(now);
            self.world.started_at = Some(now);
            self.world.phase_since = now;
            info!("Match started");
        }

        info!("Added player {} ({}) at {:?}", id, name, spawn);
        self.pending_feed.push(FeedEvent::PlayerJoined { player: id, name });
        Ok(id)
    }

    /// Stops accepting commands from a player who left
    ///
    /// The player's forts are released at once and their tank halts where it
    /// is. The tank stays visible and can still be shot until
    /// `disconnect_grace` has passed, then the tick removes it. The record
    /// stays on the leaderboard, marked disconnected, until the match resets.
    pub fn mark_disconnected(&mut self, player: PlayerId, now: f64) {
        let Some(record) = self.world.players.get_mut(&player) else {
            return;
        };
        if !record.connected {
            return;
        }
        record.connected = false;
        record.disconnected_at = Some(now);
        record.rematch_vote = false;
        let name = record.name.clone();

        if let Some(tank) = self.world.tanks.get_mut(&player) {
            tank.halt();
        }
        let released = release_forts(&mut self.world, player);
        info!(
            "Player {} ({}) disconnected, {} forts released",
            player,
            name,
            released.len()
        );
        self.pending_feed.push(FeedEvent::PlayerLeft { player, name });
    }

    /// Advances the match to `now` (seconds on the server clock).
    ///
    /// Commands are applied in arrival order first: chat and votes in any
    /// phase, everything else only while the match is active. Attacks resolve
    /// immediately against the state left by earlier commands. Then lingering
    /// tanks expire and the phase runs its simulation or post-match step.
    /// Rejections never touch the world; they are returned in the report
    /// together with the feed, chat and the highest sequence per player.
    pub fn step(&mut self, now: f64, mut commands: Vec<QueuedCommand>) -> TickReport {
        let mut report = TickReport {
            feed: std::mem::take(&mut self.pending_feed),
            ..TickReport::default()
        };
        let dt = (now - self.world.now).max(0.0);
        self.world.now = now;
        self.world.tick += 1;

        commands.sort_by_key(|c| c.arrival);
        for queued in commands {
            let entry = report.processed.entry(queued.player).or_insert(queued.sequence);
            *entry = (*entry).max(queued.sequence);

            if let Err(error) = self.apply_command(&queued, &mut report) {
                debug!(
                    "Rejected {} #{} from player {}: {}",
                    queued.command.kind_name(),
                    queued.sequence,
                    queued.player,
                    error
                );
                report.rejections.push(Rejection {
                    player: queued.player,
                    sequence: queued.sequence,
                    error,
                });
            }
        }

        self.expire_disconnected(now);

        match self.world.phase {
            MatchPhase::Active => self.simulate(now, dt, &mut report),
            MatchPhase::Ended | MatchPhase::RematchVote => self.advance_post_match(now, &mut report),
        }

        if cfg!(debug_assertions) {
            for violation in check_invariants(&self.config, &self.world) {
                error!("{}", violation);
            }
        }
        report
    }

    /// One fog-filtered snapshot per connected player
    pub fn snapshots(&self, timestamp: u64) -> Vec<(PlayerId, Snapshot)> {
        let builder = SnapshotBuilder::new(&self.config, &self.world, timestamp);
        self.world
            .players
            .values()
            .filter(|p| p.connected)
            .filter_map(|p| builder.build(p.id).map(|s| (p.id, s)))
            .collect()
    }

    fn apply_command(
        &mut self,
        queued: &QueuedCommand,
        report: &mut TickReport,
    ) -> Result<(), CommandError> {
        let player = queued.player;
        let record = self
            .world
            .players
            .get_mut(&player)
            .filter(|p| p.connected)
            .ok_or(CommandError::UnknownPlayer(player))?;

        match &queued.command {
            Command::Chat { text } => {
                let text: String = text.trim().chars().take(MAX_CHAT_LEN).collect();
                if text.is_empty() {
                    return Err(CommandError::EmptyChat);
                }
                let name = record.name.clone();
                report.chat.push(ChatMessage {
                    from: player,
                    name,
                    text,
                    elapsed: self.world.elapsed(),
                });
                return Ok(());
            }
            Command::RematchVote { vote } => {
                if self.world.phase == MatchPhase::Active {
                    return Err(CommandError::NoVoteOpen);
                }
                record.rematch_vote = *vote;
                return Ok(());
            }
            _ => {}
        }

        if self.world.phase != MatchPhase::Active {
            return Err(CommandError::MatchNotActive);
        }
        let tank = self
            .world
            .tanks
            .get_mut(&player)
            .ok_or(CommandError::UnknownPlayer(player))?;
        if tank.is_destroyed() {
            return Err(CommandError::TankDestroyed);
        }

        match &queued.command {
            Command::MoveTo { hex } => {
                if !hex.is_within(self.world.map_radius) {
                    return Err(CommandError::OffMap { q: hex.q, r: hex.r });
                }
                set_destination(tank, *hex);
            }
            Command::Purchase { upgrade } => {
                let level = purchase(&self.config, tank, *upgrade)?;
                debug!("Player {} upgraded {} to level {}", player, upgrade, level);
            }
            Command::AttackAt { hex } => {
                resolve_attack(&self.config, &mut self.world, player, *hex)?;
            }
            Command::Chat { .. } | Command::RematchVote { .. } => {}
        }
        Ok(())
    }

    fn simulate(&mut self, now: f64, dt: f64, report: &mut TickReport) {
        advance_tanks(&self.config, &mut self.world, dt);
        accrue_resources(&self.config, &mut self.world, dt);

        for event in advance_captures(&self.config, &mut self.world, dt) {
            report.feed.push(FeedEvent::Capture {
                player: event.player,
                player_name: self.world.player_name(event.player),
                fort: event.fort,
                kind: event.kind,
            });
        }

        for death in process_deaths(&self.config, &mut self.world, now) {
            if let Some(killer) = death.killer {
                report.feed.push(FeedEvent::Kill {
                    killer,
                    killer_name: self.world.player_name(killer),
                    victim: death.victim,
                    victim_name: self.world.player_name(death.victim),
                });
            }
        }
        for player in process_respawns(&self.config, &mut self.world, now, &mut self.rng) {
            debug!("Player {} respawned", player);
        }

        let timed_out = self.world.elapsed() >= self.config.match_time;
        let abandoned = self.world.started_at.is_some() && self.connected_count() == 0;
        if timed_out || abandoned {
            self.end_match(now, report);
        }
    }

    fn end_match(&mut self, now: f64, report: &mut TickReport) {
        self.world.phase = MatchPhase::Ended;
        self.world.phase_since = now;
        for tank in self.world.tanks.values_mut() {
            tank.halt();
        }
        for record in self.world.players.values_mut() {
            record.rematch_vote = false;
        }

        let leaderboard = self.world.leaderboard();
        let winner = leaderboard.first().map(|e| e.player_id);
        info!(
            "Match over after {:.1}s, winner {:?}",
            self.world.elapsed(),
            winner
        );
        report.feed.push(FeedEvent::MatchOver { winner });
    }

    fn advance_post_match(&mut self, now: f64, report: &mut TickReport) {
        let connected = self.connected_count();
        if connected == 0 {
            self.close_match(report);
            return;
        }

        let votes = self
            .world
            .players
            .values()
            .filter(|p| p.connected && p.rematch_vote)
            .count();
        if votes * 2 > connected {
            info!("Rematch accepted with {}/{} votes", votes, connected);
            self.reset_match(now);
            return;
        }

        let in_phase = now - self.world.phase_since;
        match self.world.phase {
            MatchPhase::Ended if in_phase >= self.config.post_match_time => {
                self.world.phase = MatchPhase::RematchVote;
                self.world.phase_since = now;
                info!("Rematch vote open for {:.0}s", self.config.rematch_window);
            }
            MatchPhase::RematchVote if in_phase >= self.config.rematch_window => {
                self.close_match(report);
            }
            _ => {}
        }
    }

    /// Starts a fresh match with every connected player; absent players are dropped.
    fn reset_match(&mut self, now: f64) {
        let mut world = World::new(&self.config);
        world.tick = self.world.tick;
        world.now = now;
        world.started_at = Some(now);
        world.phase_since = now;

        let players: Vec<(PlayerId, String)> = self
            .world
            .players
            .values()
            .filter(|p| p.connected)
            .map(|p| (p.id, p.name.clone()))
            .collect();
        for (id, name) in players {
            let spawn = world.random_edge_spawn(&mut self.rng);
            world.tanks.insert(id, Tank::new(id, spawn, &self.config));
            world.players.insert(id, PlayerRecord::new(id, name));
        }
        self.world = world;
    }

    fn close_match(&mut self, report: &mut TickReport) {
        info!("Match closed");
        let mut world = World::new(&self.config);
        world.tick = self.world.tick;
        world.now = self.world.now;
        self.world = world;
        report.closed = true;
    }

    /// Removes tanks whose owners have been gone longer than the grace period.
    fn expire_disconnected(&mut self, now: f64) {
        let grace = self.config.disconnect_grace;
        let expired: Vec<PlayerId> = self
            .world
            .players
            .values()
            .filter(|p| p.disconnected_at.is_some_and(|at| now - at >= grace))
            .filter(|p| self.world.tanks.contains_key(&p.id))
            .map(|p| p.id)
            .collect();

        for player in expired {
            self.world.tanks.remove(&player);
            release_forts(&mut self.world, player);
            info!("Removed tank of player {} after disconnect grace", player);
        }
    }
}
