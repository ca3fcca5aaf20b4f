//! Fort capture state machine.
//!
//! Each fort tracks the player its partial progress belongs to. Sole occupancy
//! by that player advances the progress, vacancy decays it at the same rate,
//! and two or more distinct occupants freeze it. A different sole occupant has
//! to drain the existing progress before building its own.

use crate::config::MatchConfig;
use crate::world::{Fort, World};
use log::info;
use shared::{FortId, FortKind, PlayerId};
use std::collections::BTreeSet;

/// Progress within this distance of 1.0 completes a capture, and of 0.0 clears it
const CAPTURE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub fort: FortId,
    pub kind: FortKind,
    pub player: PlayerId,
    /// Owner the fort was taken from, if any.
    pub from: Option<PlayerId>,
}

/// Seconds of sole occupancy `player` needs to capture `fort` from zero
pub fn required_time(config: &MatchConfig, fort: &Fort, player: PlayerId) -> f64 {
    if fort.previous_owner == Some(player) {
        config.capture_time * config.recapture_multiplier
    } else {
        config.capture_time
    }
}

/// Advances capture progress on every fort by `dt` seconds.
pub fn advance_captures(config: &MatchConfig, world: &mut World, dt: f64) -> Vec<CaptureEvent> {
    let mut events = Vec::new();
    let tanks = &world.tanks;
    let players = &world.players;

    for fort in world.forts.iter_mut() {
        fort.occupants = tanks
            .values()
            .filter(|t| t.position == fort.position && !t.is_destroyed())
            .filter(|t| players.get(&t.owner).is_some_and(|p| p.connected))
            .map(|t| t.owner)
            .collect::<BTreeSet<_>>();

        if let Some(event) = step_fort(config, fort, dt) {
            events.push(event);
        }
    }

    for event in &events {
        if let Some(record) = world.players.get_mut(&event.player) {
            record.captures += 1;
            info!(
                "Player {} captured fort {} ({:?})",
                record.name, event.fort, event.kind
            );
        }
    }
    events
}

fn step_fort(config: &MatchConfig, fort: &mut Fort, dt: f64) -> Option<CaptureEvent> {
    let mut occupants = fort.occupants.iter().copied();
    let sole = match (occupants.next(), occupants.next()) {
        (None, _) => {
            decay(config, fort, dt);
            return None;
        }
        (Some(p), None) => p,
        // Contested
        (Some(_), Some(_)) => return None,
    };

    if fort.owner == Some(sole) {
        return None;
    }

    match fort.capturing_player {
        Some(rival) if rival != sole && fort.capture_progress > 0.0 => {
            decay(config, fort, dt);
            None
        }
        _ => {
            fort.capturing_player = Some(sole);
            fort.capture_progress += dt / required_time(config, fort, sole);
            if fort.capture_progress < 1.0 - CAPTURE_EPSILON {
                return None;
            }

            let from = fort.owner.replace(sole);
            if from.is_some() {
                fort.previous_owner = from;
            }
            fort.capture_progress = 0.0;
            fort.capturing_player = None;
            Some(CaptureEvent {
                fort: fort.id,
                kind: fort.kind,
                player: sole,
                from,
            })
        }
    }
}

fn decay(config: &MatchConfig, fort: &mut Fort, dt: f64) {
    let Some(candidate) = fort.capturing_player else {
        fort.capture_progress = 0.0;
        return;
    };
    fort.capture_progress -= dt / required_time(config, fort, candidate);
    if fort.capture_progress <= CAPTURE_EPSILON {
        fort.capture_progress = 0.0;
        fort.capturing_player = None;
    }
}
