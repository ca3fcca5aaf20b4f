//! Match tunables, exposed as command-line flags.

use crate::error::ConfigError;
use shared::*;

/// Upper bound for every timer, one day in seconds
pub const MAX_TIMER_SECS: f64 = 86_400.0;

/// Highest tick rate whose period is still a whole number of microseconds
pub const MAX_TICK_RATE: u32 = 1_000;

/// Every gameplay parameter of a match. Each field doubles as a `--long` flag.
#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct MatchConfig {
    /// Seconds of sole occupancy needed to capture a fort
    #[arg(long, default_value_t = CAPTURE_TIME)]
    pub capture_time: f64,
    /// Capture time multiplier when the capturer previously owned the fort
    #[arg(long, default_value_t = RECAPTURE_MULTIPLIER)]
    pub recapture_multiplier: f64,
    /// Maximum concurrently connected players
    #[arg(long, default_value_t = MAX_PLAYERS)]
    pub max_players: u32,
    /// Match length in seconds
    #[arg(long, default_value_t = MATCH_TIME)]
    pub match_time: f64,
    /// Seconds the final leaderboard is shown before the rematch vote opens
    #[arg(long, default_value_t = POST_MATCH_TIME)]
    pub post_match_time: f64,
    /// Seconds the rematch vote stays open before the match closes
    #[arg(long, default_value_t = REMATCH_WINDOW)]
    pub rematch_window: f64,
    #[arg(long, default_value_t = RESPAWN_TIME)]
    pub respawn_time: f64,
    #[arg(long, default_value_t = FORT_COUNT)]
    pub fort_count: u32,
    #[arg(long, default_value_t = MAP_RADIUS)]
    pub map_radius: u32,
    /// Base vision radius in hexes
    #[arg(long, default_value_t = FOG_RANGE)]
    pub fog_range: u32,
    #[arg(long, default_value_t = FUEL_PER_HEX)]
    pub fuel_per_hex: f64,
    /// Fuel per second from each owned fuel or mixed fort
    #[arg(long, default_value_t = FORT_FUEL_GEN)]
    pub fort_fuel_gen: f64,
    /// Ammo per second from each owned ammo or mixed fort
    #[arg(long, default_value_t = FORT_AMMO_GEN)]
    pub fort_ammo_gen: f64,
    /// Gears per second from each owned gear or mixed fort
    #[arg(long, default_value_t = FORT_GEAR_GEN)]
    pub fort_gear_gen: f64,
    /// Hexes per second before engine upgrades
    #[arg(long, default_value_t = MOVE_SPEED_BASE)]
    pub base_speed: f64,
    #[arg(long, default_value_t = SHELL_DAMAGE)]
    pub shell_damage: u32,
    #[arg(long, default_value_t = SHELL_RANGE)]
    pub shell_range: u32,
    #[arg(long, default_value_t = AMMO_PER_SHOT)]
    pub shot_ammo_cost: f64,
    /// Ammo cost reduction per loader level
    #[arg(long, default_value_t = LOADER_REDUCTION)]
    pub loader_reduction: f64,
    #[arg(long, default_value_t = TANK_MAX_HP)]
    pub tank_max_hp: u32,
    #[arg(long, default_value_t = START_FUEL)]
    pub start_fuel: f64,
    #[arg(long, default_value_t = START_AMMO)]
    pub start_ammo: f64,
    #[arg(long, default_value_t = MAX_FUEL)]
    pub max_fuel: f64,
    #[arg(long, default_value_t = MAX_AMMO)]
    pub max_ammo: f64,
    #[arg(long, default_value_t = FUEL_FLOOR)]
    pub fuel_floor: f64,
    #[arg(long, default_value_t = AMMO_FLOOR)]
    pub ammo_floor: f64,
    /// Forts a destroyed tank keeps, nearest first
    #[arg(long, default_value_t = FORTS_KEPT_ON_DEATH)]
    pub forts_kept_on_death: u32,
    /// Fraction of the victim's lost resources handed to the killer
    #[arg(long, default_value_t = LOOT_SHARE)]
    pub loot_share: f64,
    /// Gear cost per upgrade level, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = UPGRADE_COSTS)]
    pub upgrade_costs: Vec<u32>,
    /// Seconds a disconnected player's tank lingers in the world
    #[arg(long, default_value_t = DISCONNECT_GRACE)]
    pub disconnect_grace: f64,
    /// Seconds without any packet before a connection is dropped
    #[arg(long, default_value_t = IDLE_TIMEOUT)]
    pub idle_timeout: f64,
    /// Seed for spawn placement; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            capture_time: CAPTURE_TIME,
            recapture_multiplier: RECAPTURE_MULTIPLIER,
            max_players: MAX_PLAYERS,
            match_time: MATCH_TIME,
            post_match_time: POST_MATCH_TIME,
            rematch_window: REMATCH_WINDOW,
            respawn_time: RESPAWN_TIME,
            fort_count: FORT_COUNT,
            map_radius: MAP_RADIUS,
            fog_range: FOG_RANGE,
            fuel_per_hex: FUEL_PER_HEX,
            fort_fuel_gen: FORT_FUEL_GEN,
            fort_ammo_gen: FORT_AMMO_GEN,
            fort_gear_gen: FORT_GEAR_GEN,
            base_speed: MOVE_SPEED_BASE,
            shell_damage: SHELL_DAMAGE,
            shell_range: SHELL_RANGE,
            shot_ammo_cost: AMMO_PER_SHOT,
            loader_reduction: LOADER_REDUCTION,
            tank_max_hp: TANK_MAX_HP,
            start_fuel: START_FUEL,
            start_ammo: START_AMMO,
            max_fuel: MAX_FUEL,
            max_ammo: MAX_AMMO,
            fuel_floor: FUEL_FLOOR,
            ammo_floor: AMMO_FLOOR,
            forts_kept_on_death: FORTS_KEPT_ON_DEATH,
            loot_share: LOOT_SHARE,
            upgrade_costs: UPGRADE_COSTS.to_vec(),
            disconnect_grace: DISCONNECT_GRACE,
            idle_timeout: IDLE_TIMEOUT,
            seed: None,
        }
    }
}

impl MatchConfig {
    /// Radius of the ring the forts sit on
    pub fn fort_ring_radius(&self) -> u32 {
        self.map_radius / 2 + 1
    }

    /// Fixed fort sites: `fort_count` hexes spread evenly around the fort ring
    pub fn fort_sites(&self) -> Vec<Hex> {
        let ring = Hex::ORIGIN.ring(self.fort_ring_radius());
        let count = self.fort_count as usize;
        (0..count).map(|i| ring[i * ring.len() / count]).collect()
    }

    /// Checks the tunables before any of them reaches the simulation or a timer.
    ///
    /// Every float must be finite. Timers are capped at [`MAX_TIMER_SECS`] so
    /// they always convert to a `Duration`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floats = [
            ("capture_time", self.capture_time),
            ("recapture_multiplier", self.recapture_multiplier),
            ("match_time", self.match_time),
            ("post_match_time", self.post_match_time),
            ("rematch_window", self.rematch_window),
            ("respawn_time", self.respawn_time),
            ("fuel_per_hex", self.fuel_per_hex),
            ("fort_fuel_gen", self.fort_fuel_gen),
            ("fort_ammo_gen", self.fort_ammo_gen),
            ("fort_gear_gen", self.fort_gear_gen),
            ("base_speed", self.base_speed),
            ("shot_ammo_cost", self.shot_ammo_cost),
            ("loader_reduction", self.loader_reduction),
            ("start_fuel", self.start_fuel),
            ("start_ammo", self.start_ammo),
            ("max_fuel", self.max_fuel),
            ("max_ammo", self.max_ammo),
            ("fuel_floor", self.fuel_floor),
            ("ammo_floor", self.ammo_floor),
            ("loot_share", self.loot_share),
            ("disconnect_grace", self.disconnect_grace),
            ("idle_timeout", self.idle_timeout),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite(name));
            }
        }

        let timers = [
            ("capture_time", self.capture_time),
            ("match_time", self.match_time),
            ("post_match_time", self.post_match_time),
            ("rematch_window", self.rematch_window),
            ("respawn_time", self.respawn_time),
            ("disconnect_grace", self.disconnect_grace),
            ("idle_timeout", self.idle_timeout),
        ];
        for (name, value) in timers {
            if value > MAX_TIMER_SECS {
                return Err(ConfigError::TimerTooLong {
                    name,
                    max: MAX_TIMER_SECS,
                });
            }
        }

        let positive = [
            ("capture_time", self.capture_time),
            ("match_time", self.match_time),
            ("respawn_time", self.respawn_time),
            ("base_speed", self.base_speed),
            ("max_fuel", self.max_fuel),
            ("max_ammo", self.max_ammo),
            ("idle_timeout", self.idle_timeout),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive(name));
            }
        }

        let non_negative = [
            ("post_match_time", self.post_match_time),
            ("rematch_window", self.rematch_window),
            ("fuel_per_hex", self.fuel_per_hex),
            ("fort_fuel_gen", self.fort_fuel_gen),
            ("fort_ammo_gen", self.fort_ammo_gen),
            ("fort_gear_gen", self.fort_gear_gen),
            ("shot_ammo_cost", self.shot_ammo_cost),
            ("loader_reduction", self.loader_reduction),
            ("disconnect_grace", self.disconnect_grace),
            ("fuel_floor", self.fuel_floor),
            ("ammo_floor", self.ammo_floor),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Negative(name));
            }
        }

        if self.recapture_multiplier < 1.0 {
            return Err(ConfigError::RecaptureMultiplier(self.recapture_multiplier));
        }
        if self.max_players == 0 || self.max_players > MAX_PLAYERS {
            return Err(ConfigError::MaxPlayers {
                got: self.max_players,
                max: MAX_PLAYERS,
            });
        }
        if self.upgrade_costs.len() != MAX_UPGRADE_LEVEL as usize {
            return Err(ConfigError::UpgradeCosts {
                expected: MAX_UPGRADE_LEVEL as usize,
                got: self.upgrade_costs.len(),
            });
        }
        if !(0.0..=1.0).contains(&self.loot_share) {
            return Err(ConfigError::LootShare(self.loot_share));
        }
        if self.tank_max_hp == 0 {
            return Err(ConfigError::NotPositive("tank_max_hp"));
        }
        if self.start_fuel > self.max_fuel || self.start_ammo > self.max_ammo {
            return Err(ConfigError::StartAboveCap);
        }
        if self.fuel_floor > self.max_fuel || self.ammo_floor > self.max_ammo {
            return Err(ConfigError::FloorAboveCap);
        }
        if self.map_radius < 2 {
            return Err(ConfigError::MapTooSmall(self.map_radius));
        }
        let available = 6 * self.fort_ring_radius();
        if self.fort_count > available {
            return Err(ConfigError::TooManyForts {
                count: self.fort_count,
                available,
            });
        }
        Ok(())
    }
}

/// Rejects tick rates whose interval would round down to zero.
pub fn validate_tick_rate(tick_rate: u32) -> Result<(), ConfigError> {
    if tick_rate == 0 || tick_rate > MAX_TICK_RATE {
        return Err(ConfigError::TickRate {
            got: tick_rate,
            max: MAX_TICK_RATE,
        });
    }
    Ok(())
}
