//! Types shared between the Iron Fog server and its clients: the hex grid
//! model, the wire protocol and the default match tunables.

pub mod hex;
pub mod protocol;

pub use hex::{Hex, DIRECTIONS};
pub use protocol::{
    decode_payload, encode_frame, ChatMessage, Command, EnemyTankView, FeedEvent, FortId,
    FortKind, FortView, LeaderboardEntry, MatchPhase, OwnTankView, Packet, PlayerId,
    RematchStatus, Snapshot, UpgradeKind, UpgradeLevels, FRAME_HEADER_LEN, MAX_FRAME_LEN,
};

pub const PROTOCOL_VERSION: u32 = 1;
pub const TICK_RATE: u32 = 20;

pub const MAP_RADIUS: u32 = 8;
pub const FOG_RANGE: u32 = 3;
pub const FORT_COUNT: u32 = 8;
pub const MAX_PLAYERS: u32 = 4;

pub const CAPTURE_TIME: f64 = 5.0;
pub const RECAPTURE_MULTIPLIER: f64 = 1.5;
pub const MATCH_TIME: f64 = 600.0;
pub const POST_MATCH_TIME: f64 = 10.0;
pub const REMATCH_WINDOW: f64 = 30.0;
pub const RESPAWN_TIME: f64 = 8.0;
pub const DISCONNECT_GRACE: f64 = 10.0;
pub const IDLE_TIMEOUT: f64 = 30.0;

pub const MOVE_SPEED_BASE: f64 = 2.5;
pub const FUEL_PER_HEX: f64 = 4.0;
pub const FORT_FUEL_GEN: f64 = 1.2;
pub const FORT_AMMO_GEN: f64 = 0.9;
pub const FORT_GEAR_GEN: f64 = 0.10;

pub const TANK_MAX_HP: u32 = 100;
pub const SHELL_DAMAGE: u32 = 40;
pub const SHELL_RANGE: u32 = 5;
pub const AMMO_PER_SHOT: f64 = 8.0;
pub const LOADER_REDUCTION: f64 = 2.0;

pub const START_FUEL: f64 = 80.0;
pub const START_AMMO: f64 = 50.0;
pub const MAX_FUEL: f64 = 120.0;
pub const MAX_AMMO: f64 = 100.0;

/// Death never leaves a tank with less fuel than this.
pub const FUEL_FLOOR: f64 = 15.0;
/// Death never leaves a tank with less ammo than this.
pub const AMMO_FLOOR: f64 = 10.0;
pub const FORTS_KEPT_ON_DEATH: u32 = 2;
pub const LOOT_SHARE: f64 = 0.5;

pub const MAX_UPGRADE_LEVEL: u8 = 3;
/// Gear cost to go from level L to L+1, indexed by L.
pub const UPGRADE_COSTS: [u32; 3] = [5, 10, 18];
pub const ENGINE_SPEED_BONUS: f64 = 0.2;
pub const ARMOR_HP_PER_LEVEL: u32 = 20;
pub const CANNON_DAMAGE_PER_LEVEL: u32 = 10;

pub const POINTS_PER_KILL: u32 = 10;
pub const POINTS_PER_CAPTURE: u32 = 5;

pub const MAX_NAME_LEN: usize = 20;
pub const MAX_CHAT_LEN: usize = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_table_matches_max_level() {
        assert_eq!(UPGRADE_COSTS.len(), MAX_UPGRADE_LEVEL as usize);
        assert!(UPGRADE_COSTS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_floors_below_caps() {
        assert!(FUEL_FLOOR < MAX_FUEL);
        assert!(AMMO_FLOOR < MAX_AMMO);
        assert!(START_FUEL <= MAX_FUEL);
        assert!(START_AMMO <= MAX_AMMO);
    }
}
