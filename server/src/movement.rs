//! Hex-by-hex tank movement with fuel consumption.

use crate::config::MatchConfig;
use crate::world::{Tank, World};
use shared::Hex;

/// Progress within this distance of a whole hex counts as arrived
const STEP_EPSILON: f64 = 1e-9;

/// Points a tank at a new destination.
///
/// Partial progress into the next hex survives only if the new route leaves
/// through the same neighbor.
pub fn set_destination(tank: &mut Tank, destination: Hex) {
    let first_step = tank.position.step_toward(destination);
    if tank.heading != Some(first_step) {
        tank.heading = None;
        tank.move_progress = 0.0;
    }
    tank.destination = (destination != tank.position).then_some(destination);
}

/// Advances every living tank with a destination by `dt` seconds of driving.
pub fn advance_tanks(config: &MatchConfig, world: &mut World, dt: f64) {
    for tank in world.tanks.values_mut() {
        if tank.is_destroyed() || tank.destination.is_none() {
            continue;
        }
        let speed = tank.stats(config).speed;
        drive(tank, speed * dt, config.fuel_per_hex);
    }
}

fn drive(tank: &mut Tank, mut budget: f64, fuel_per_hex: f64) {
    while budget > STEP_EPSILON {
        let Some(destination) = tank.destination else {
            return;
        };
        if tank.position == destination {
            tank.halt();
            return;
        }
        if tank.fuel <= 0.0 {
            tank.fuel = 0.0;
            tank.destination = None;
            return;
        }

        let position = tank.position;
        let next = *tank
            .heading
            .get_or_insert_with(|| position.step_toward(destination));

        let mut step = budget.min(1.0 - tank.move_progress);
        if fuel_per_hex > 0.0 {
            step = step.min(tank.fuel / fuel_per_hex);
        }
        tank.fuel = (tank.fuel - step * fuel_per_hex).max(0.0);
        tank.move_progress += step;
        budget -= step;

        if tank.move_progress >= 1.0 - STEP_EPSILON {
            tank.position = next;
            tank.heading = None;
            tank.move_progress = 0.0;
        }
    }

    if tank.destination == Some(tank.position) {
        tank.halt();
    } else if tank.fuel <= STEP_EPSILON {
        tank.fuel = 0.0;
        tank.destination = None;
    }
}
