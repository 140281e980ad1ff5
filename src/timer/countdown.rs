use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use super::event::{TimerEvent, TimerEventKind, TimerId, TimerSnapshot};
use super::state::{StartKind, TickOutcome, TimerCore, TimerState};

/// Period of every timer's tick source.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

pub(crate) type EventSink = UnboundedSender<TimerEvent>;

/// A countdown bound to one grid slot, driven by its own tick task.
///
/// Every notification is sent while the timer's lock is held, so events for
/// one timer reach the consumer in the order they happened and never
/// overlap. `start` spawns the tick task and must be called from inside a
/// tokio runtime.
pub struct CountdownTimer {
    shared: Arc<Shared>,
}

struct Shared {
    id: TimerId,
    name: String,
    code: String,
    barcode: Option<String>,
    inner: Mutex<Inner>,
}

struct Inner {
    core: TimerCore,
    sink: Option<EventSink>,
    ticker: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    pub fn new(
        id: TimerId,
        name: impl Into<String>,
        code: impl Into<String>,
        barcode: Option<String>,
        total_seconds: u32,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                name: name.into(),
                code: code.into(),
                barcode,
                inner: Mutex::new(Inner {
                    core: TimerCore::new(total_seconds),
                    sink: None,
                    ticker: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> TimerId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn code(&self) -> &str {
        &self.shared.code
    }

    pub fn barcode(&self) -> Option<&str> {
        self.shared.barcode.as_deref()
    }

    /// Subscribes `sink` to this timer's notifications, replacing any previous one.
    pub(crate) fn attach(&self, sink: EventSink) {
        self.shared.lock().sink = Some(sink);
    }

    /// Drops the subscription; later transitions are silent.
    pub fn detach(&self) {
        self.shared.lock().sink = None;
    }

    pub fn start(&self) -> StartKind {
        let mut inner = self.shared.lock();
        let kind = inner.core.start(Instant::now());
        if kind == StartKind::AlreadyRunning {
            return kind;
        }
        if let Some(old) = inner.ticker.take() {
            old.abort();
        }
        let generation = inner.core.generation();
        inner.ticker = Some(tokio::spawn(run_ticker(
            Arc::downgrade(&self.shared),
            generation,
        )));

        let event = match kind {
            StartKind::Resumed => TimerEventKind::Resumed,
            _ => TimerEventKind::Started,
        };
        self.shared.emit(&inner, event);
        kind
    }

    pub fn pause(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.core.pause(Instant::now()) {
            return false;
        }
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        self.shared.emit(&inner, TimerEventKind::Paused);
        true
    }

    /// Cancels the tick source and rewinds to the full duration. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        inner.core.stop();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        self.shared.emit(&inner, TimerEventKind::Stopped);
    }

    pub fn reset(&self, new_total: u32) {
        let mut inner = self.shared.lock();
        inner.core.reset(new_total);
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        self.shared.emit(&inner, TimerEventKind::Stopped);
    }

    /// Unsubscribes first, then releases the tick source.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        inner.sink = None;
        inner.core.stop();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.shared.lock();
        self.shared.snapshot(&inner.core)
    }

    pub fn state(&self) -> TimerState {
        self.shared.lock().core.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().core.is_running()
    }

    pub fn remaining(&self) -> u32 {
        self.shared.lock().core.remaining()
    }

    pub fn total(&self) -> u32 {
        self.shared.lock().core.total()
    }

    pub fn elapsed(&self) -> Duration {
        self.shared.lock().core.elapsed(Instant::now())
    }

    pub fn display_text(&self) -> String {
        self.shared.lock().core.display_text(&self.shared.code)
    }

    pub fn progress(&self) -> f64 {
        self.shared.lock().core.progress()
    }
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("id", &self.shared.id)
            .field("code", &self.shared.code)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, core: &TimerCore) -> TimerSnapshot {
        TimerSnapshot {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
            barcode: self.barcode.clone(),
            state: core.state(),
            remaining: core.remaining(),
            total: core.total(),
            display: core.display_text(&self.code),
            progress: core.progress(),
        }
    }

    fn emit(&self, inner: &Inner, kind: TimerEventKind) {
        if let Some(sink) = &inner.sink {
            // A closed receiver means the consumer is gone; nothing to notify.
            let _ = sink.send(TimerEvent {
                kind,
                snapshot: self.snapshot(&inner.core),
            });
        }
    }

    /// Applies one tick; returns whether the tick source should keep running.
    fn deliver_tick(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        match inner.core.tick(generation) {
            TickOutcome::Ignored => false,
            TickOutcome::Ticked(remaining) => {
                debug!(code = %self.code, remaining, "Timer tick");
                self.emit(&inner, TimerEventKind::Tick);
                true
            }
            TickOutcome::Completed => {
                inner.ticker = None;
                info!(code = %self.code, id = %self.id, "Timer completed");
                self.emit(&inner, TimerEventKind::Tick);
                self.emit(&inner, TimerEventKind::Completed);
                false
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(shared: Weak<Shared>, generation: u64) {
    let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.deliver_tick(generation) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn timer(total: u32) -> (CountdownTimer, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let t = CountdownTimer::new(TimerId(1), "B-05", "B-05", Some("LOT42".into()), total);
        t.attach(tx);
        (t, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn kinds(events: &[TimerEvent]) -> Vec<TimerEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_completion_with_one_notification() {
        let (t, mut rx) = timer(3);
        t.start();
        time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(t.remaining(), 0);
        assert_eq!(t.state(), TimerState::Completed);
        let events = drain(&mut rx);
        assert_eq!(
            kinds(&events),
            vec![
                TimerEventKind::Started,
                TimerEventKind::Tick,
                TimerEventKind::Tick,
                TimerEventKind::Tick,
                TimerEventKind::Completed,
            ]
        );
        let remaining: Vec<u32> = events.iter().map(|e| e.snapshot.remaining).collect();
        assert_eq!(remaining, vec![3, 2, 1, 0, 0]);
        assert_eq!(events[4].snapshot.display, "DONE B-05");

        time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_does_not_double_count() {
        let (t, mut rx) = timer(10);
        assert_eq!(t.start(), StartKind::Fresh);
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(t.start(), StartKind::AlreadyRunning);
        time::sleep(Duration::from_millis(2600)).await;

        assert_eq!(t.remaining(), 7);
        let ticks = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == TimerEventKind::Tick)
            .count();
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_remaining_across_wall_clock_delay() {
        let (t, _rx) = timer(10);
        t.start();
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(t.remaining(), 8);

        assert!(t.pause());
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(t.remaining(), 8);
        assert_eq!(t.state(), TimerState::Paused);

        assert_eq!(t.start(), StartKind::Resumed);
        assert_eq!(t.remaining(), 8);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(t.remaining(), 7);
        assert!(t.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_immediate_and_idempotent() {
        let (t, mut rx) = timer(10);
        t.start();
        time::sleep(Duration::from_millis(1500)).await;
        t.stop();
        t.stop();
        drain(&mut rx);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(t.remaining(), 10);
        assert_eq!(t.state(), TimerState::Idle);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(t.display_text(), "B-05");
    }

    #[tokio::test(start_paused = true)]
    async fn detached_timer_is_silent() {
        let (t, mut rx) = timer(5);
        t.detach();
        t.start();
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(t.remaining(), 3);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_its_ticker() {
        let (t, mut rx) = timer(5);
        t.start();
        drop(t);
        time::sleep(Duration::from_secs(3)).await;
        let events = drain(&mut rx);
        assert_eq!(kinds(&events), vec![TimerEventKind::Started]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_applies_new_total() {
        let (t, _rx) = timer(5);
        t.start();
        time::sleep(Duration::from_millis(1500)).await;
        t.reset(3600);
        assert_eq!(t.state(), TimerState::Idle);
        assert_eq!(t.total(), 3600);
        t.start();
        assert_eq!(t.display_text(), "01:00:00");
    }
}
