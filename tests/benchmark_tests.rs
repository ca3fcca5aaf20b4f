//! Performance benchmarks for critical match systems

use server::config::MatchConfig;
use server::game::{GameState, QueuedCommand};
use server::visibility::SnapshotBuilder;
use shared::{encode_frame, decode_payload, Command, Hex, Packet, UpgradeKind};
use std::time::Instant;

const DT: f64 = 1.0 / 20.0;

/// A seeded lobby with four players
fn full_lobby() -> GameState {
    let mut game = GameState::new(MatchConfig {
        seed: Some(11),
        ..MatchConfig::default()
    });
    for i in 0..4 {
        game.add_player(format!("bench{}", i), 0.0).unwrap();
    }
    game
}

/// Deterministic command mix for one tick
fn commands_for_tick(tick: u64, arrival: &mut u64) -> Vec<QueuedCommand> {
    let mut commands = Vec::new();
    for player in 1..=4u32 {
        let angle = (tick as i32 + player as i32 * 3) % 8;
        let command = match tick % 4 {
            0 => Command::MoveTo {
                hex: Hex::new(angle - 4, 4 - angle),
            },
            1 => Command::AttackAt {
                hex: Hex::new(angle - 3, 1),
            },
            2 => Command::Purchase {
                upgrade: UpgradeKind::ALL[(tick as usize + player as usize) % 5],
            },
            _ => Command::MoveTo { hex: Hex::ORIGIN },
        };
        *arrival += 1;
        commands.push(QueuedCommand {
            player,
            sequence: tick as u32,
            arrival: *arrival,
            command,
        });
    }
    commands
}

/// Benchmarks a full tick with four busy players
#[test]
fn benchmark_tick_step() {
    let mut game = full_lobby();
    let iterations = 2_000u64;
    let mut arrival = 0;
    let start = Instant::now();

    for tick in 1..=iterations {
        let commands = commands_for_tick(tick, &mut arrival);
        let _ = game.step(tick as f64 * DT, commands);
    }

    let duration = start.elapsed();
    println!(
        "Tick step: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 100 simulated seconds must finish well under a second of real time
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks fog-filtered snapshot construction
#[test]
fn benchmark_snapshot_building() {
    let mut game = full_lobby();
    for (i, fort) in game.world.forts.iter_mut().enumerate() {
        fort.owner = Some((i % 4) as u32 + 1);
    }

    let iterations = 2_000;
    let start = Instant::now();

    for i in 0..iterations {
        let builder = SnapshotBuilder::new(&game.config, &game.world, i as u64);
        for player in 1..=4 {
            let snapshot = builder.build(player);
            assert!(snapshot.is_some());
        }
    }

    let duration = start.elapsed();
    println!(
        "Snapshot building: {} × 4 snapshots in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot framing, the per-tick wire cost
#[test]
fn benchmark_snapshot_serialization() {
    let game = full_lobby();
    let (_, snapshot) = game.snapshots(1_234_567_890).remove(0);
    let packet = Packet::Snapshot(Box::new(snapshot));

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&packet).unwrap();
        let decoded = decode_payload(&frame[4..]).unwrap();
        assert!(matches!(decoded, Packet::Snapshot(_)));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests command ordering under a large backlog
#[test]
fn stress_test_many_commands() {
    let mut game = full_lobby();
    let mut commands: Vec<QueuedCommand> = (0..4_000u64)
        .map(|i| QueuedCommand {
            player: (i % 4) as u32 + 1,
            sequence: i as u32,
            arrival: 4_000 - i,
            command: Command::MoveTo {
                hex: Hex::new((i % 9) as i32 - 4, 0),
            },
        })
        .collect();
    commands.reverse();

    let start = Instant::now();
    let report = game.step(DT, commands);
    let duration = start.elapsed();

    println!("Command backlog: 4000 commands in {:?}", duration);

    assert_eq!(report.processed.len(), 4);
    assert!(report.rejections.is_empty());
    // Should complete in under 100ms
    assert!(duration.as_millis() < 100);
}
