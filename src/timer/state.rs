use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// The four states of a slot's countdown.
///
/// A timer flows Idle → Running ⇄ Paused → Completed; `Stop` returns any
/// state to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::Idle => write!(f, "STOPPED"),
            TimerState::Running => write!(f, "RUNNING"),
            TimerState::Paused => write!(f, "PAUSED"),
            TimerState::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Status light shown next to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    Gray,
    LightGreen,
    Yellow,
    Green,
}

impl TimerState {
    pub fn indicator(self) -> Indicator {
        match self {
            TimerState::Idle => Indicator::Gray,
            TimerState::Running => Indicator::LightGreen,
            TimerState::Paused => Indicator::Yellow,
            TimerState::Completed => Indicator::Green,
        }
    }
}

/// What a `start` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Started from Idle or Completed with the full duration.
    Fresh,
    /// Continued from Paused with the remaining time untouched.
    Resumed,
    /// Already running; nothing changed.
    AlreadyRunning,
}

/// The result of delivering one tick to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick came from a cancelled tick source, or the timer is not running.
    Ignored,
    Ticked(u32),
    /// Remaining reached zero on this tick.
    Completed,
}

/// Countdown bookkeeping for one timer, free of any scheduling.
///
/// `generation` changes on every start, pause and stop; a tick source is
/// spawned for one generation and its ticks are ignored once that
/// generation is gone, which makes `stop` effective before the next tick.
#[derive(Debug, Clone)]
pub struct TimerCore {
    total: u32,
    remaining: u32,
    state: TimerState,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    generation: u64,
}

impl TimerCore {
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total: total_seconds,
            remaining: total_seconds,
            state: TimerState::Idle,
            started_at: None,
            paused_at: None,
            generation: 0,
        }
    }

    pub fn start(&mut self, now: Instant) -> StartKind {
        let kind = match self.state {
            TimerState::Running => return StartKind::AlreadyRunning,
            TimerState::Paused => {
                // Shift the start reference by the pause length so paused
                // time never counts as elapsed.
                if let (Some(started), Some(paused)) = (self.started_at, self.paused_at) {
                    self.started_at = Some(started + now.saturating_duration_since(paused));
                }
                StartKind::Resumed
            }
            TimerState::Idle | TimerState::Completed => {
                self.started_at = Some(now);
                self.remaining = self.total;
                StartKind::Fresh
            }
        };
        self.paused_at = None;
        self.state = TimerState::Running;
        self.generation += 1;
        kind
    }

    /// Returns false unless the timer was running.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        self.paused_at = Some(now);
        self.generation += 1;
        true
    }

    pub fn stop(&mut self) {
        self.state = TimerState::Idle;
        self.remaining = self.total;
        self.started_at = None;
        self.paused_at = None;
        self.generation += 1;
    }

    pub fn reset(&mut self, new_total: u32) {
        self.stop();
        self.total = new_total;
        self.remaining = new_total;
    }

    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation || self.state != TimerState::Running {
            return TickOutcome::Ignored;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = TimerState::Completed;
            self.generation += 1;
            TickOutcome::Completed
        } else {
            TickOutcome::Ticked(self.remaining)
        }
    }

    /// Active time since the start reference, excluding pauses.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started)) => now.saturating_duration_since(started),
            (TimerState::Paused, Some(started)) => self
                .paused_at
                .map(|p| p.saturating_duration_since(started))
                .unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Fraction of the countdown already consumed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        1.0 - f64::from(self.remaining) / f64::from(self.total)
    }

    /// Text shown inside the slot.
    pub fn display_text(&self, code: &str) -> String {
        match self.state {
            TimerState::Running | TimerState::Paused => {
                format_remaining(self.remaining, self.total)
            }
            TimerState::Idle => code.to_string(),
            TimerState::Completed => format!("DONE {code}"),
        }
    }
}

/// `MM:SS` for timers shorter than an hour, `HH:MM:SS` otherwise.
pub fn format_remaining(remaining: u32, total: u32) -> String {
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;
    if total < 3600 {
        format!("{:02}:{seconds:02}", remaining / 60)
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
