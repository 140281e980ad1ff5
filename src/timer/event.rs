use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::{Indicator, TimerState};

/// Registry-assigned timer identity. Ids increase monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of a timer, taken under the timer's lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub name: String,
    pub code: String,
    pub barcode: Option<String>,
    pub state: TimerState,
    pub remaining: u32,
    pub total: u32,
    pub display: String,
    pub progress: f64,
}

impl TimerSnapshot {
    pub fn indicator(&self) -> Indicator {
        self.state.indicator()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerEventKind {
    Added,
    Removed,
    Started,
    Resumed,
    Paused,
    Stopped,
    Tick,
    Completed,
}

/// A notification fanned in from a timer (or the registry) to the single consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEvent {
    pub kind: TimerEventKind,
    pub snapshot: TimerSnapshot,
}
