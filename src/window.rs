//! Rolling reading window
//!
//! This module keeps the bounded reading history and derives everything the
//! patient sees about the signal from it: summary metrics, the short-term
//! trend and the stress alert.

use crate::config::{DEFAULT_STRESS_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::types::{Reading, Trend, WindowMetrics, Zone};
use std::collections::VecDeque;

/// Number of most recent readings used for the trend
const TREND_SPAN: usize = 3;

/// Change across the trend span that counts as a real movement
const TREND_THRESHOLD: i64 = 3;

/// Bounded FIFO of readings with trend and stress detection
#[derive(Debug, Clone)]
pub struct RollingWindowAggregator {
    readings: VecDeque<Reading>,
    window_size: usize,
    stress_threshold: u32,
    /// Consecutive low-zone readings seen so far
    consecutive_low: u32,
    /// Sticky alert flag, cleared only by `dismiss_stress`
    stressed: bool,
    /// Total readings ever pushed; the newest reading's sequence number
    pushed: u64,
}

impl Default for RollingWindowAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_STRESS_THRESHOLD)
    }
}

impl RollingWindowAggregator {
    /// Create an empty window
    pub fn new(window_size: usize, stress_threshold: u32) -> Self {
        Self {
            readings: VecDeque::with_capacity(window_size),
            window_size,
            stress_threshold,
            consecutive_low: 0,
            stressed: false,
            pushed: 0,
        }
    }

    /// Append a reading, evicting the oldest once the window is full
    pub fn push(&mut self, reading: Reading) {
        if reading.zone == Zone::Low {
            self.consecutive_low += 1;
            if self.consecutive_low >= self.stress_threshold {
                self.stressed = true;
            }
        } else {
            self.consecutive_low = 0;
        }

        self.readings.push_back(reading);
        while self.readings.len() > self.window_size {
            self.readings.pop_front();
        }
        self.pushed += 1;
    }

    /// Readings in the window, oldest first
    pub fn readings(&self) -> impl Iterator<Item = &Reading> + '_ {
        self.readings.iter()
    }

    /// Window contents as an owned vector, oldest first
    pub fn history(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Most recent reading
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Sequence number of the most recent reading (1-based; 0 before any push)
    pub fn latest_sequence(&self) -> u64 {
        self.pushed
    }

    /// Summary statistics over the whole window
    pub fn metrics(&self) -> WindowMetrics {
        if self.readings.is_empty() {
            return WindowMetrics::default();
        }

        let count = self.readings.len() as f64;
        let sum: f64 = self.readings.iter().map(|r| f64::from(r.value)).sum();
        let avg = (sum / count).round();

        let min = self.readings.iter().map(|r| r.value).min().unwrap_or(0);
        let max = self.readings.iter().map(|r| r.value).max().unwrap_or(0);

        let variance = self
            .readings
            .iter()
            .map(|r| (f64::from(r.value) - avg).powi(2))
            .sum::<f64>()
            / count;
        let variability = (variance.sqrt() * 10.0).round() / 10.0;

        WindowMetrics {
            avg: avg as u32,
            min,
            max,
            variability,
        }
    }

    /// Direction of the last three readings
    pub fn trend(&self) -> Trend {
        if self.readings.len() < TREND_SPAN {
            return Trend::Stable;
        }

        let first = &self.readings[self.readings.len() - TREND_SPAN];
        let last = &self.readings[self.readings.len() - 1];
        let diff = i64::from(last.value) - i64::from(first.value);

        if diff > TREND_THRESHOLD {
            Trend::Up
        } else if diff < -TREND_THRESHOLD {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    /// Whether the stress alert is asserted
    pub fn is_stressed(&self) -> bool {
        self.stressed
    }

    /// Clear the stress alert. The consecutive-low count is kept, so another
    /// low reading re-asserts the alert straight away.
    pub fn dismiss_stress(&mut self) {
        self.stressed = false;
    }
}
