//! Simulated physiological signal
//!
//! The generator models the signal as a bounded random walk with occasional
//! stress drops and relaxation jumps. Manual mode pins the output to a zone
//! for demonstrations. Both modes share the walk position, so switching
//! between them keeps the trace continuous.

use crate::types::{Reading, Zone};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Walk position used before any reading exists
pub const SEED_VALUE: f64 = 45.0;

/// Lowest value the generator emits
pub const MIN_VALUE: f64 = 20.0;

/// Highest value the generator emits
pub const MAX_VALUE: f64 = 80.0;

/// Maximum per-step drift in either direction
const STEP: f64 = 3.0;

/// Probability of a spike on any step
const SPIKE_PROBABILITY: f64 = 0.1;

/// Sudden stress drop
const SPIKE_DOWN: f64 = -15.0;

/// Sudden relaxation jump
const SPIKE_UP: f64 = 10.0;

/// Probability that the simulated device reports connected
const CONNECTED_PROBABILITY: f64 = 0.9;

/// Pseudo-random signal source with explicit walk state
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    rng: StdRng,
    previous_value: f64,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGenerator {
    /// Create a generator seeded from the operating system
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Create a reproducible generator
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            previous_value: SEED_VALUE,
        }
    }

    /// Current walk position
    pub fn previous_value(&self) -> f64 {
        self.previous_value
    }

    /// Move the walk to `value` (clamped)
    pub fn reset(&mut self, value: f64) {
        self.previous_value = value.clamp(MIN_VALUE, MAX_VALUE);
    }

    /// Next reading of the autonomous random walk.
    ///
    /// Continues from `previous` when given, otherwise from the generator's
    /// own walk position.
    pub fn next_auto(&mut self, previous: Option<&Reading>, at: DateTime<Utc>) -> Reading {
        let start = previous
            .map(|r| f64::from(r.value))
            .unwrap_or(self.previous_value);

        let mut value = start + self.rng.random_range(-STEP..STEP);

        if self.rng.random_bool(SPIKE_PROBABILITY) {
            value += if self.rng.random_bool(0.5) {
                SPIKE_DOWN
            } else {
                SPIKE_UP
            };
        }

        let value = value.clamp(MIN_VALUE, MAX_VALUE).round();
        self.previous_value = value;

        let device_connected = self.rng.random_bool(CONNECTED_PROBABILITY);
        let value = value as u32;

        Reading {
            value,
            timestamp: at,
            zone: Zone::classify(value),
            device_connected,
        }
    }

    /// Next reading pinned to `zone`.
    ///
    /// The reading carries the requested zone even if its value would
    /// classify differently, and always reports the device as connected.
    pub fn next_manual(&mut self, zone: Zone, at: DateTime<Utc>) -> Reading {
        let (base, spread) = zone_profile(zone);
        let jitter = self.rng.random_range(-spread..spread);
        let value = (base + jitter).round().clamp(MIN_VALUE, MAX_VALUE);
        self.previous_value = value;

        Reading {
            value: value as u32,
            timestamp: at,
            zone,
            device_connected: true,
        }
    }
}

/// Base value and jitter spread for manual readings
fn zone_profile(zone: Zone) -> (f64, f64) {
    match zone {
        Zone::Low => (25.0, 3.0),
        Zone::Normal => (45.0, 5.0),
        Zone::High => (70.0, 5.0),
    }
}
