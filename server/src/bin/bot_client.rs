//! Headless bot for exercising a running server.
//!
//! Each bot joins, then wanders the map issuing random moves, shots,
//! purchases and the odd chat line while logging what its snapshots show.

use clap::Parser;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::error::BoxError;
use server::network::{read_frame, write_frame};
use shared::{Command, Hex, Packet, Snapshot, UpgradeKind, PROTOCOL_VERSION};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of bots to run
    #[arg(short = 'b', long, default_value = "1")]
    bots: u32,

    /// Commands each bot sends per second
    #[arg(short = 'r', long, default_value = "2")]
    rate: u32,

    /// Seconds to play before disconnecting
    #[arg(short = 'd', long, default_value = "60")]
    duration: u64,

    /// Seed for the bots' choices
    #[arg(long)]
    seed: Option<u64>,
}

fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut handles = Vec::new();
    for index in 0..args.bots {
        let server = args.server.clone();
        let seed = args
            .seed
            .map(|s| s.wrapping_add(u64::from(index)))
            .unwrap_or_else(rand::random);
        let rate = args.rate.max(1);
        let duration = Duration::from_secs(args.duration);
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_bot(server, index, seed, rate, duration).await {
                error!("Bot {} failed: {}", index, e);
            }
        }));
        // Stagger joins so the server sees distinct arrivals
        sleep(Duration::from_millis(100)).await;
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn run_bot(
    server: String,
    index: u32,
    seed: u64,
    rate: u32,
    duration: Duration,
) -> Result<(), BoxError> {
    let stream = TcpStream::connect(&server).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let join = Packet::Join {
        client_version: PROTOCOL_VERSION,
        name: format!("bot-{}", index),
    };
    write_frame(&mut writer, &join).await?;

    let (player_id, map_radius) = match read_frame(&mut reader).await? {
        Packet::Joined {
            player_id,
            map_radius,
            tick_rate,
            ..
        } => {
            info!(
                "Bot {} joined as player {} ({} ticks/s, map radius {})",
                index, player_id, tick_rate, map_radius
            );
            (player_id, map_radius)
        }
        Packet::Disconnected { reason } => {
            warn!("Bot {} was turned away: {}", index, reason);
            return Ok(());
        }
        other => return Err(format!("expected Joined, got {:?}", other).into()),
    };

    let listener = tokio::spawn(log_snapshots(reader, player_id));

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sequence = 1u32;
    let mut ticker = interval(Duration::from_millis(1000 / u64::from(rate)));
    let deadline = tokio::time::Instant::now() + duration;

    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        if listener.is_finished() {
            info!("Bot {} lost its connection", index);
            return Ok(());
        }

        let command = random_command(&mut rng, map_radius);
        write_frame(&mut writer, &Packet::Input { sequence, command }).await?;
        sequence = sequence.wrapping_add(1);

        if sequence % 4 == 0 {
            write_frame(
                &mut writer,
                &Packet::Heartbeat {
                    timestamp: get_timestamp(),
                },
            )
            .await?;
        }
    }

    write_frame(&mut writer, &Packet::Disconnect).await?;
    info!("Bot {} finished after {} commands", index, sequence - 1);
    listener.abort();
    Ok(())
}

fn random_hex<R: Rng>(rng: &mut R, map_radius: u32) -> Hex {
    let radius = map_radius as i32;
    loop {
        let hex = Hex::new(rng.gen_range(-radius..=radius), rng.gen_range(-radius..=radius));
        if hex.is_within(map_radius) {
            return hex;
        }
    }
}

fn random_command<R: Rng>(rng: &mut R, map_radius: u32) -> Command {
    match rng.gen_range(0..20) {
        0..=9 => Command::MoveTo {
            hex: random_hex(rng, map_radius),
        },
        10..=16 => Command::AttackAt {
            hex: random_hex(rng, map_radius),
        },
        17..=18 => {
            let upgrade = UpgradeKind::ALL[rng.gen_range(0..UpgradeKind::ALL.len())];
            Command::Purchase { upgrade }
        }
        _ => Command::Chat {
            text: "rolling out".to_string(),
        },
    }
}

async fn log_snapshots(mut reader: OwnedReadHalf, player_id: u32) {
    let mut received = 0u64;
    loop {
        match read_frame(&mut reader).await {
            Ok(Packet::Snapshot(snapshot)) => {
                received += 1;
                if received % 20 == 1 {
                    log_snapshot(player_id, &snapshot);
                }
            }
            Ok(Packet::CommandRejected { sequence, reason }) => {
                info!("Player {}: command {} rejected: {}", player_id, sequence, reason);
            }
            Ok(Packet::Disconnected { reason }) => {
                info!("Player {} disconnected by server: {}", player_id, reason);
                return;
            }
            Ok(other) => warn!("Player {}: unexpected packet {:?}", player_id, other),
            Err(e) if e.is_recoverable() => warn!("Player {}: bad frame: {}", player_id, e),
            Err(e) => {
                info!("Player {}: connection ended: {}", player_id, e);
                return;
            }
        }
    }
}

fn log_snapshot(player_id: u32, snapshot: &Snapshot) {
    let tank = &snapshot.own_tank;
    info!(
        "Player {} tick {} {:?}: at {:?} hp {}/{} fuel {:.0} ammo {:.0} gears {:.1}, {} enemies, {} forts in view, {:.0}s left",
        player_id,
        snapshot.tick,
        snapshot.phase,
        tank.position,
        tank.hp,
        tank.max_hp,
        tank.fuel,
        tank.ammo,
        tank.gears,
        snapshot.visible_enemy_tanks.len(),
        snapshot.forts.len(),
        snapshot.remaining_time
    );
    for event in &snapshot.feed_events {
        info!("Player {} feed: {:?}", player_id, event);
    }
}
