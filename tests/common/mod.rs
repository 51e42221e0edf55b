#![allow(dead_code)]

use odrive_stage::sim::SimAxis;
use odrive_stage::{Axis, ManualClock, Timing};
use tracing_subscriber::EnvFilter;

pub type SimController = Axis<SimAxis<ManualClock>, ManualClock>;

/// Route controller logs to the test output (set RUST_LOG=debug for more)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

/// Carriage at `start` on a track between `low` and `high`
pub fn controller(clock: &ManualClock, low: f32, high: f32, start: f32) -> SimController {
    let sim = SimAxis::new(clock.clone())
        .with_track(low, high)
        .at(start)
        .calibrated();
    Axis::with_clock(sim, 20_000.0, clock.clone()).unwrap()
}

pub fn controller_with_timing(
    clock: &ManualClock,
    low: f32,
    high: f32,
    start: f32,
    timing: Timing,
) -> SimController {
    controller(clock, low, high, start).with_timing(timing)
}
