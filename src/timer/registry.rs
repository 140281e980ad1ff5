use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use super::countdown::{CountdownTimer, EventSink};
use super::event::{TimerEvent, TimerEventKind, TimerId};
use crate::grid::normalize_code;

/// Owns every live timer and fans their notifications into one channel.
///
/// All mutation goes through a single `RwLock`, so a reader iterating with
/// [`all`](Self::all) sees either the map before a removal or after it,
/// never an entry that is half gone.
pub struct TimerRegistry {
    timers: RwLock<BTreeMap<TimerId, Arc<CountdownTimer>>>,
    next_id: AtomicU64,
    events: EventSink,
}

impl TimerRegistry {
    /// Creates an empty registry and the receiving end of its event stream.
    pub fn new() -> (Self, UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            timers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events: tx,
        };
        (registry, rx)
    }

    /// Registers a new idle timer. Returns `None` if its id is already taken.
    pub fn create(
        &self,
        name: &str,
        code: &str,
        total_seconds: u32,
    ) -> Option<Arc<CountdownTimer>> {
        let mut timers = self.write();
        self.insert_locked(&mut timers, name, &normalize_code(code), None, total_seconds)
    }

    pub fn start(&self, id: TimerId) -> bool {
        self.with_timer(id, |t| {
            t.start();
        })
    }

    pub fn pause(&self, id: TimerId) -> bool {
        self.with_timer(id, |t| {
            t.pause();
        })
    }

    pub fn stop(&self, id: TimerId) -> bool {
        self.with_timer(id, CountdownTimer::stop)
    }

    /// Unregisters and disposes a timer; its subscription is dropped before
    /// the tick source is released.
    pub fn remove(&self, id: TimerId) -> bool {
        let removed = self.write().remove(&id);
        match removed {
            Some(timer) => {
                self.retire(&timer);
                true
            }
            None => false,
        }
    }

    /// Stops and disposes whatever occupies `code`, then creates and starts
    /// its replacement, all under one write lock.
    pub fn rearm(
        &self,
        code: &str,
        total_seconds: u32,
        barcode: Option<String>,
    ) -> Option<Arc<CountdownTimer>> {
        let code = normalize_code(code);
        let mut timers = self.write();

        let occupied: Vec<TimerId> = timers
            .values()
            .filter(|t| t.code() == code)
            .map(|t| t.id())
            .collect();
        for id in occupied {
            if let Some(old) = timers.remove(&id) {
                info!(code = %code, old = %id, "Re-arming slot, disposing previous timer");
                self.retire(&old);
            }
        }

        let timer = self.insert_locked(&mut timers, &code, &code, barcode, total_seconds)?;
        timer.start();
        Some(timer)
    }

    pub fn get(&self, id: TimerId) -> Option<Arc<CountdownTimer>> {
        self.read().get(&id).cloned()
    }

    pub fn get_by_code(&self, code: &str) -> Option<Arc<CountdownTimer>> {
        let code = normalize_code(code);
        self.read().values().find(|t| t.code() == code).cloned()
    }

    pub fn all(&self) -> Vec<Arc<CountdownTimer>> {
        self.read().values().cloned().collect()
    }

    pub fn running(&self) -> Vec<Arc<CountdownTimer>> {
        self.read()
            .values()
            .filter(|t| t.is_running())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Disposes every timer. Timers are detached first, so the teardown emits
    /// no per-timer notifications.
    pub fn shutdown(&self) {
        let drained = std::mem::take(&mut *self.write());
        for timer in drained.values() {
            timer.dispose();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Timer registry shut down");
        }
    }

    #[cfg(test)]
    fn rewind_ids(&self, next: u64) {
        self.next_id.store(next, Ordering::Relaxed);
    }

    fn insert_locked(
        &self,
        timers: &mut BTreeMap<TimerId, Arc<CountdownTimer>>,
        name: &str,
        code: &str,
        barcode: Option<String>,
        total_seconds: u32,
    ) -> Option<Arc<CountdownTimer>> {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timer = Arc::new(CountdownTimer::new(id, name, code, barcode, total_seconds));

        match timers.entry(id) {
            Entry::Occupied(_) => {
                warn!(%id, "Timer id already registered");
                None
            }
            Entry::Vacant(slot) => {
                timer.attach(self.events.clone());
                slot.insert(Arc::clone(&timer));
                self.notify(&timer, TimerEventKind::Added);
                Some(timer)
            }
        }
    }

    fn retire(&self, timer: &CountdownTimer) {
        timer.dispose();
        self.notify(timer, TimerEventKind::Removed);
    }

    fn notify(&self, timer: &CountdownTimer, kind: TimerEventKind) {
        let _ = self.events.send(TimerEvent {
            kind,
            snapshot: timer.snapshot(),
        });
    }

    fn with_timer(&self, id: TimerId, f: impl FnOnce(&CountdownTimer)) -> bool {
        match self.get(id) {
            Some(timer) => {
                f(&timer);
                true
            }
            None => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<TimerId, Arc<CountdownTimer>>> {
        self.timers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<TimerId, Arc<CountdownTimer>>> {
        self.timers.write().unwrap_or_else(PoisonError::into_inner)
    }
}
