mod countdown;
mod event;
mod registry;
mod state;

pub use countdown::{CountdownTimer, TICK_PERIOD};
pub use event::{TimerEvent, TimerEventKind, TimerId, TimerSnapshot};
pub use registry::TimerRegistry;
pub use state::{Indicator, StartKind, TickOutcome, TimerCore, TimerState, format_remaining};
