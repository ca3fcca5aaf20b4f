//! # Iron Fog Server Library
//!
//! The authoritative server for Iron Fog, a real-time tank match for up to
//! four players on a hex grid. The server owns the only copy of the world;
//! clients send commands and receive a fog-filtered snapshot every tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Movement, combat, fort capture, resource accrual, death and respawn all
//! run here in a fixed order once per tick. Clients never mutate state
//! directly; every command is validated and may be rejected with a reason.
//!
//! ### Fog of War
//! Each player only learns about enemy tanks and forts inside the vision
//! radius of their own tank. Forts a player owns are always reported.
//!
//! ### Match Lifecycle
//! A match runs on a countdown from the first join. When it ends the final
//! leaderboard is shown, then a rematch vote opens. A strict majority of
//! connected players restarts the match; otherwise the server returns to an
//! empty lobby.
//!
//! ## Architecture Design
//!
//! ### Single Owner Tick Loop
//! One task owns [`game::GameState`] and advances it at a fixed tick rate.
//! Connection tasks never touch the world: they forward decoded commands
//! over bounded channels, stamped with a global arrival counter so the tick
//! loop can apply them in the order they reached the server.
//!
//! ### TCP Framing
//! Every packet is a 4-byte big-endian length followed by a bincode payload.
//! A payload that fails to decode is skipped without dropping the session.
//!
//! ### Slow Clients
//! Snapshots are offered to each connection's outbound queue without
//! waiting. A client that falls behind misses frames; its feed and chat
//! backlog is carried into the next snapshot it does receive.
//!
//! ## Module Organization
//!
//! - `world`: tanks, forts, player records and the match clock
//! - `movement`, `combat`, `capture`, `economy`, `death`: the tick phases
//! - `visibility`: spatial index and per-player snapshots
//! - `game`: command validation and the tick pipeline
//! - `invariants`: consistency checks run after every tick in debug builds
//! - `client_manager`: per-connection queues and timeouts
//! - `network`: listener, session tasks and frame I/O
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::MatchConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // 20 ticks per second with default match tunables
//!     let server = Server::new("127.0.0.1:8080", 20, MatchConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod death;
pub mod economy;
pub mod error;
pub mod game;
pub mod invariants;
pub mod movement;
pub mod network;
pub mod visibility;
pub mod world;
