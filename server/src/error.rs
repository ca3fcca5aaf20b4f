//! Error types for command validation, joining, configuration and framing.

use shared::{PlayerId, UpgradeKind};

/// Boxed error for async plumbing that crosses task boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a player command was refused. A rejected command never mutates the world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("tank is destroyed")]
    TankDestroyed,
    #[error("match is not active")]
    MatchNotActive,
    #[error("hex ({q}, {r}) is off the map")]
    OffMap { q: i32, r: i32 },
    #[error("target is {distance} hexes away, range is {range}")]
    OutOfRange { distance: u32, range: u32 },
    #[error("not enough ammo: have {have:.1}, need {need:.1}")]
    NotEnoughAmmo { have: f64, need: f64 },
    #[error("cannot fire at own hex")]
    OwnHex,
    #[error("{0} is already at max level")]
    MaxLevel(UpgradeKind),
    #[error("not enough gears: have {have:.1}, need {need}")]
    NotEnoughGears { have: f64, need: u32 },
    #[error("chat message is empty")]
    EmptyChat,
    #[error("no rematch vote is open")]
    NoVoteOpen,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Server full")]
    ServerFull,
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u32, server: u32 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{name} must not exceed {max} seconds")]
    TimerTooLong { name: &'static str, max: f64 },
    #[error("tick rate must be between 1 and {max}, got {got}")]
    TickRate { got: u32, max: u32 },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("recapture multiplier must be at least 1, got {0}")]
    RecaptureMultiplier(f64),
    #[error("max players must be between 1 and {max}, got {got}")]
    MaxPlayers { got: u32, max: u32 },
    #[error("expected {expected} upgrade costs, got {got}")]
    UpgradeCosts { expected: usize, got: usize },
    #[error("loot share must be within [0, 1], got {0}")]
    LootShare(f64),
    #[error("starting fuel and ammo must not exceed their caps")]
    StartAboveCap,
    #[error("death floors must not exceed resource caps")]
    FloorAboveCap,
    #[error("map radius must be at least 2, got {0}")]
    MapTooSmall(u32),
    #[error("fort count {count} exceeds the {available} available fort sites")]
    TooManyForts { count: u32, available: u32 },
}

/// Failure to read or write a length-prefixed frame
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
    #[error("malformed frame: {0}")]
    Decode(#[from] bincode::Error),
    #[error("cannot encode packet: {0}")]
    Encode(bincode::Error),
}

impl FrameError {
    /// A decode failure consumed exactly one frame, so the stream is still aligned.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Decode(_))
    }
}
