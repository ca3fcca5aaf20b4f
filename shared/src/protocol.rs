//! Wire protocol between server and clients.
//!
//! Every message is a [`Packet`] encoded with bincode and prefixed by its
//! payload length as a 4-byte big-endian integer.

use crate::hex::Hex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PlayerId = u32;
pub type FortId = u32;

pub const FRAME_HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpgradeKind {
    Engine,
    Armor,
    Cannon,
    Sensor,
    Loader,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::Engine,
        UpgradeKind::Armor,
        UpgradeKind::Cannon,
        UpgradeKind::Sensor,
        UpgradeKind::Loader,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UpgradeKind::Engine => "engine",
            UpgradeKind::Armor => "armor",
            UpgradeKind::Cannon => "cannon",
            UpgradeKind::Sensor => "sensor",
            UpgradeKind::Loader => "loader",
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Upgrade level per kind, each in `0..=MAX_UPGRADE_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeLevels {
    pub engine: u8,
    pub armor: u8,
    pub cannon: u8,
    pub sensor: u8,
    pub loader: u8,
}

impl UpgradeLevels {
    pub fn get(&self, kind: UpgradeKind) -> u8 {
        match kind {
            UpgradeKind::Engine => self.engine,
            UpgradeKind::Armor => self.armor,
            UpgradeKind::Cannon => self.cannon,
            UpgradeKind::Sensor => self.sensor,
            UpgradeKind::Loader => self.loader,
        }
    }

    pub fn get_mut(&mut self, kind: UpgradeKind) -> &mut u8 {
        match kind {
            UpgradeKind::Engine => &mut self.engine,
            UpgradeKind::Armor => &mut self.armor,
            UpgradeKind::Cannon => &mut self.cannon,
            UpgradeKind::Sensor => &mut self.sensor,
            UpgradeKind::Loader => &mut self.loader,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FortKind {
    Fuel,
    Ammo,
    Gear,
    Mixed,
}

impl FortKind {
    pub const CYCLE: [FortKind; 4] = [FortKind::Fuel, FortKind::Ammo, FortKind::Gear, FortKind::Mixed];

    pub fn yields_fuel(self) -> bool {
        matches!(self, FortKind::Fuel | FortKind::Mixed)
    }

    pub fn yields_ammo(self) -> bool {
        matches!(self, FortKind::Ammo | FortKind::Mixed)
    }

    pub fn yields_gears(self) -> bool {
        matches!(self, FortKind::Gear | FortKind::Mixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Active,
    Ended,
    RematchVote,
}

/// Player commands, validated by the server before they touch the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    MoveTo { hex: Hex },
    AttackAt { hex: Hex },
    Purchase { upgrade: UpgradeKind },
    Chat { text: String },
    RematchVote { vote: bool },
}

impl Command {
    /// Chat and votes are honored in every phase and by dead tanks.
    pub fn allowed_outside_play(&self) -> bool {
        matches!(self, Command::Chat { .. } | Command::RematchVote { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Command::MoveTo { .. } => "move_to",
            Command::AttackAt { .. } => "attack_at",
            Command::Purchase { .. } => "purchase",
            Command::Chat { .. } => "chat",
            Command::RematchVote { .. } => "rematch_vote",
        }
    }
}

/// Full state of the recipient's own tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnTankView {
    pub position: Hex,
    pub destination: Option<Hex>,
    pub hp: u32,
    pub max_hp: u32,
    pub fuel: f64,
    pub max_fuel: f64,
    pub ammo: f64,
    pub max_ammo: f64,
    pub gears: f64,
    pub upgrades: UpgradeLevels,
    pub alive: bool,
    /// Seconds until respawn while destroyed
    pub respawn_in: Option<f64>,
    pub speed: f64,
    pub vision_range: u32,
    pub shell_damage: u32,
    pub shell_range: u32,
    pub shot_ammo_cost: f64,
}

/// What a player may learn about an enemy tank inside their fog radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyTankView {
    pub owner: PlayerId,
    pub position: Hex,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FortView {
    pub id: FortId,
    pub position: Hex,
    pub kind: FortKind,
    pub owner: Option<PlayerId>,
    pub previous_owner: Option<PlayerId>,
    pub capture_progress: f64,
    pub capturing_player: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub kills: u32,
    pub captures: u32,
    pub deaths: u32,
    pub forts_held: u32,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedEvent {
    Kill {
        killer: PlayerId,
        killer_name: String,
        victim: PlayerId,
        victim_name: String,
    },
    Capture {
        player: PlayerId,
        player_name: String,
        fort: FortId,
        kind: FortKind,
    },
    PlayerJoined {
        player: PlayerId,
        name: String,
    },
    PlayerLeft {
        player: PlayerId,
        name: String,
    },
    MatchOver {
        winner: Option<PlayerId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: PlayerId,
    pub name: String,
    pub text: String,
    /// Match-elapsed seconds when the server accepted the message
    pub elapsed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RematchStatus {
    pub votes: u32,
    pub connected: u32,
    pub voted: bool,
    pub closes_in: f64,
}

/// Per-player, fog-filtered view of the match, sent every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    /// Server wall-clock milliseconds, for latency estimates
    pub timestamp: u64,
    pub phase: MatchPhase,
    pub elapsed_time: f64,
    pub remaining_time: f64,
    pub last_processed_input: u32,
    pub own_tank: OwnTankView,
    pub visible_enemy_tanks: Vec<EnemyTankView>,
    pub forts: Vec<FortView>,
    pub visible_hexes: Vec<Hex>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub feed_events: Vec<FeedEvent>,
    pub chat_messages: Vec<ChatMessage>,
    pub rematch: Option<RematchStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client to server
    Join {
        client_version: u32,
        name: String,
    },
    Input {
        sequence: u32,
        command: Command,
    },
    Heartbeat {
        timestamp: u64,
    },
    Disconnect,

    // Server to client
    Joined {
        player_id: PlayerId,
        map_radius: u32,
        tick_rate: u32,
        upgrade_costs: Vec<u32>,
    },
    Snapshot(Box<Snapshot>),
    CommandRejected {
        sequence: u32,
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Serializes a packet with its length prefix, ready to be written to a stream
pub fn encode_frame(packet: &Packet) -> bincode::Result<Vec<u8>> {
    let payload = bincode::serialize(packet)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(Box::new(bincode::ErrorKind::SizeLimit));
    }
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a frame payload (the bytes after the length prefix)
pub fn decode_payload(payload: &[u8]) -> bincode::Result<Packet> {
    bincode::deserialize(payload)
}
