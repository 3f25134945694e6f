//! Logical clock and periodic task scheduling
//!
//! The engine never reads wall-clock time while running. A [`Scheduler`]
//! advances logical time one tick at a time and reports which periodic tasks
//! are due; the caller runs their handlers to completion before the next tick.

use chrono::{DateTime, Duration, Utc};

/// Periodic tasks driven by the clock, in dispatch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Generate the next reading
    Signal,
    /// Advance playback progress
    Playback,
    /// Advance session duration and capture readings
    SessionTimer,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Signal, TaskKind::Playback, TaskKind::SessionTimer];

    fn index(self) -> usize {
        match self {
            TaskKind::Signal => 0,
            TaskKind::Playback => 1,
            TaskKind::SessionTimer => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PeriodicTask {
    period: u64,
    /// Tick at which the task next runs; `None` while disarmed
    next_due: Option<u64>,
}

/// Single-threaded cooperative scheduler over logical time
#[derive(Debug, Clone)]
pub struct Scheduler {
    now: u64,
    anchor: DateTime<Utc>,
    tick_seconds: u64,
    tasks: [PeriodicTask; 3],
    halted: bool,
}

impl Scheduler {
    /// Create a scheduler whose tick 0 corresponds to `anchor`.
    ///
    /// `periods` are given in ticks, in [`TaskKind::ALL`] order. All tasks
    /// start disarmed.
    pub fn new(anchor: DateTime<Utc>, tick_seconds: u64, periods: [u64; 3]) -> Self {
        let tasks = periods.map(|period| PeriodicTask {
            period: period.max(1),
            next_due: None,
        });
        Self {
            now: 0,
            anchor,
            tick_seconds,
            tasks,
            halted: false,
        }
    }

    /// Current logical time in ticks
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Logical seconds represented by one tick
    pub fn tick_seconds(&self) -> u64 {
        self.tick_seconds
    }

    /// Wall-clock timestamp for a logical tick
    pub fn timestamp_at(&self, tick: u64) -> DateTime<Utc> {
        let seconds = i64::try_from(tick.saturating_mul(self.tick_seconds)).unwrap_or(i64::MAX);
        self.anchor + Duration::seconds(seconds)
    }

    /// Wall-clock timestamp for the current tick
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp_at(self.now)
    }

    /// Schedule `task` to run every period, starting one period from now.
    /// Re-arming an armed task keeps its current schedule.
    pub fn arm(&mut self, task: TaskKind) {
        if self.halted {
            return;
        }
        let slot = &mut self.tasks[task.index()];
        if slot.next_due.is_none() {
            slot.next_due = Some(self.now + slot.period);
        }
    }

    /// Stop `task`; it is not reported due again until re-armed
    pub fn disarm(&mut self, task: TaskKind) {
        self.tasks[task.index()].next_due = None;
    }

    /// Disarm every task permanently; later ticks do nothing
    pub fn halt(&mut self) {
        for task in TaskKind::ALL {
            self.disarm(task);
        }
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Advance logical time by one tick and return the tasks due at the new
    /// time, in dispatch order
    pub fn tick(&mut self) -> Vec<TaskKind> {
        if self.halted {
            return Vec::new();
        }
        self.now += 1;

        let mut due = Vec::new();
        for task in TaskKind::ALL {
            let slot = &mut self.tasks[task.index()];
            if slot.next_due == Some(self.now) {
                slot.next_due = Some(self.now + slot.period);
                due.push(task);
            }
        }
        due
    }
}
