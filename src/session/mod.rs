//! Operator input: collects the fields each mode needs, admits the start
//! through the sequence check, re-arms the slot timers and records the start.

mod input;
mod retry;

pub use input::{Focus, InputMode, PendingInput};
pub use retry::RetryConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::PressureConfig;
use crate::error::PressureError;
use crate::grid::{PositionMapper, normalize_code};
use crate::sequence::{Clearance, SequenceValidator};
use crate::store::{
    RecordStore, StoreError, TimerRecord, WorkstationSequence, normalize_barcode,
};
use crate::timer::{CountdownTimer, TimerId, TimerRegistry, TimerSnapshot, format_remaining};
use crate::ui::Notice;

/// Everything needed to start one or two slots in a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub mode: InputMode,
    pub barcode: Option<String>,
    pub first_code: String,
    pub second_code: Option<String>,
}

/// What happened to the start's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    Saved,
    /// No barcode, nothing to record.
    Skipped,
    /// The timers kept running; the record is lost.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StartReport {
    pub codes: Vec<String>,
    pub timers: Vec<TimerId>,
    pub duration_seconds: u32,
    pub clearance: Option<Clearance>,
    pub persisted: Persisted,
}

#[derive(Debug)]
pub enum EnterOutcome {
    /// The line was taken; the next one goes into this field.
    Awaiting(Focus),
    Started(StartReport),
    /// Fields were cleared and focus is back on the mode's first field.
    Rejected(PressureError),
}

pub struct SessionController<S> {
    config: PressureConfig,
    mapper: PositionMapper,
    validator: SequenceValidator,
    store: Arc<S>,
    registry: Arc<TimerRegistry>,
    notices: UnboundedSender<Notice>,
    mode: InputMode,
    focus: Focus,
    pending: PendingInput,
}

impl<S: RecordStore + Send + Sync + 'static> SessionController<S> {
    pub fn new(
        config: PressureConfig,
        sequence: WorkstationSequence,
        store: Arc<S>,
        registry: Arc<TimerRegistry>,
        notices: UnboundedSender<Notice>,
    ) -> Self {
        let mode = config.default_input_mode;
        Self {
            mapper: PositionMapper::new(config.columns),
            validator: SequenceValidator::new(sequence),
            config,
            store,
            registry,
            notices,
            mode,
            focus: mode.first_focus(),
            pending: PendingInput::default(),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn pending(&self) -> &PendingInput {
        &self.pending
    }

    pub fn sequence(&self) -> &WorkstationSequence {
        self.validator.sequence()
    }

    pub fn mapper(&self) -> &PositionMapper {
        &self.mapper
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
        self.reset_fields();
        info!(%mode, "Input mode changed");
        self.notify(Notice::Status(format!(
            "Switched to {mode} ({}), enter a {}",
            mode.label(),
            self.focus
        )));
    }

    /// Feeds one scanned or typed line into the focused field.
    pub async fn enter(&mut self, raw: &str) -> EnterOutcome {
        let value = raw.trim().to_string();
        if value.is_empty() {
            self.notify(Notice::Status(format!("Please enter a {}", self.focus)));
            return EnterOutcome::Awaiting(self.focus);
        }

        let request = match (self.mode, self.focus) {
            (InputMode::General, _) => StartRequest {
                mode: self.mode,
                barcode: None,
                first_code: value,
                second_code: None,
            },
            (_, Focus::Barcode) => {
                let value = normalize_barcode(&value);
                self.notify(Notice::Status(format!(
                    "Barcode {value} entered, scan the timer code"
                )));
                self.pending.barcode = Some(value);
                self.focus = Focus::FirstCode;
                return EnterOutcome::Awaiting(self.focus);
            }
            (InputMode::TripleInput, Focus::FirstCode) => {
                self.notify(Notice::Status(format!(
                    "Code {} entered, scan the second timer code",
                    normalize_code(&value)
                )));
                self.pending.first_code = Some(value);
                self.focus = Focus::SecondCode;
                return EnterOutcome::Awaiting(self.focus);
            }
            (InputMode::DoubleInput, _) => StartRequest {
                mode: self.mode,
                barcode: self.pending.barcode.clone(),
                first_code: value,
                second_code: None,
            },
            (InputMode::TripleInput, Focus::SecondCode) => StartRequest {
                mode: self.mode,
                barcode: self.pending.barcode.clone(),
                first_code: self.pending.first_code.clone().unwrap_or_default(),
                second_code: Some(value),
            },
        };

        let result = self.submit(request).await;
        self.reset_fields();
        match result {
            Ok(report) => EnterOutcome::Started(report),
            Err(err) => {
                warn!(error = %err, mode = %self.mode, "Start rejected");
                self.notify(Notice::Alert {
                    title: alert_title(&err).to_string(),
                    message: err.to_string(),
                });
                EnterOutcome::Rejected(err)
            }
        }
    }

    /// Admits and starts one request. Nothing is armed unless every code
    /// resolves and the sequence check passes.
    pub async fn submit(&self, request: StartRequest) -> Result<StartReport, PressureError> {
        let first = self.resolve(&request.first_code)?;
        let second = match (request.mode, request.second_code.as_deref()) {
            (InputMode::TripleInput, Some(code)) => {
                let second = self.resolve(code)?;
                if second == first {
                    return Err(PressureError::InvalidCode(format!("{second} (entered twice)")));
                }
                Some(second)
            }
            (InputMode::TripleInput, None) => {
                return Err(PressureError::MissingInput(Focus::SecondCode.to_string()));
            }
            _ => None,
        };

        let barcode = if request.mode.requires_barcode() {
            let barcode = request
                .barcode
                .as_deref()
                .map(normalize_barcode)
                .filter(|b| !b.is_empty())
                .ok_or_else(|| PressureError::MissingInput(Focus::Barcode.to_string()))?;
            Some(barcode)
        } else {
            None
        };

        let clearance = match &barcode {
            Some(barcode) => Some(self.check_sequence(barcode).await?),
            None => None,
        };

        // Two-code starts share the first code's duration.
        let duration_seconds = self.config.duration_for(&first);
        let mut codes = vec![first.clone()];
        codes.extend(second.clone());

        let mut timers = Vec::with_capacity(codes.len());
        for code in &codes {
            let timer = self
                .registry
                .rearm(code, duration_seconds, barcode.clone())
                .ok_or_else(|| {
                    PressureError::ConfigurationInvalid(format!(
                        "could not register a timer for {code}"
                    ))
                })?;
            timers.push(timer.id());
        }

        info!(
            codes = %codes.join(" + "),
            barcode = barcode.as_deref().unwrap_or("-"),
            duration_seconds,
            "Timer started"
        );
        self.notify(Notice::Status(format!(
            "{} started ({})",
            codes.join(" + "),
            format_remaining(duration_seconds, duration_seconds)
        )));

        let persisted = match barcode {
            Some(barcode) => {
                let record =
                    TimerRecord::new(barcode, first, second, duration_seconds, request.mode);
                self.persist(record).await
            }
            None => Persisted::Skipped,
        };

        Ok(StartReport {
            codes,
            timers,
            duration_seconds,
            clearance,
            persisted,
        })
    }

    /// `Ok(None)` when the slot has no timer.
    pub fn pause(&self, code: &str) -> Result<Option<TimerSnapshot>, PressureError> {
        self.with_slot(code, |timer| {
            timer.pause();
        })
    }

    /// Continues a paused slot; a stopped or finished slot starts over.
    pub fn resume(&self, code: &str) -> Result<Option<TimerSnapshot>, PressureError> {
        self.with_slot(code, |timer| {
            timer.start();
        })
    }

    pub fn stop(&self, code: &str) -> Result<Option<TimerSnapshot>, PressureError> {
        self.with_slot(code, |timer| timer.stop())
    }

    fn with_slot(
        &self,
        code: &str,
        f: impl FnOnce(&CountdownTimer),
    ) -> Result<Option<TimerSnapshot>, PressureError> {
        let code = self.resolve(code)?;
        Ok(self.registry.get_by_code(&code).map(|timer| {
            f(&timer);
            timer.snapshot()
        }))
    }

    fn resolve(&self, code: &str) -> Result<String, PressureError> {
        self.mapper
            .resolve(code)
            .map(|position| position.code())
            .ok_or_else(|| PressureError::InvalidCode(normalize_code(code)))
    }

    async fn check_sequence(&self, barcode: &str) -> Result<Clearance, PressureError> {
        let store = Arc::clone(&self.store);
        let validator = self.validator.clone();
        let barcode = barcode.to_string();
        tokio::task::spawn_blocking(move || validator.validate(store.as_ref(), &barcode))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    async fn persist(&self, record: TimerRecord) -> Persisted {
        let retry = self.config.retry();
        let station = self.validator.sequence().current.clone();
        let mut attempt = 0;
        loop {
            match self.insert(record.clone(), station.clone()).await {
                Ok(()) => {
                    info!(barcode = %record.barcode, codes = %record.codes(), %station, "Record saved");
                    self.notify(Notice::Saved(record));
                    return Persisted::Saved;
                }
                Err(err) if attempt < retry.max_retries => {
                    attempt += 1;
                    let delay_ms = retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max = retry.max_retries,
                        delay_ms,
                        error = %err,
                        "Record insert failed, retrying"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(err) => {
                    warn!(barcode = %record.barcode, error = %err, "Record not saved, timer keeps running");
                    self.notify(Notice::Warning(format!(
                        "Record for {} not saved: {err}",
                        record.barcode
                    )));
                    return Persisted::Failed(err.to_string());
                }
            }
        }
    }

    async fn insert(&self, record: TimerRecord, station: String) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.insert_record(&record, &station))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    fn reset_fields(&mut self) {
        self.pending = PendingInput::default();
        self.focus = self.mode.first_focus();
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("Notice dropped, no consumer");
        }
    }
}

fn alert_title(err: &PressureError) -> &'static str {
    match err {
        PressureError::InvalidCode(_) => "Invalid code",
        PressureError::MissingInput(_) => "Missing input",
        PressureError::MissingUpstreamRecord { .. } | PressureError::DwellNotSatisfied { .. } => {
            "Sequence check failed"
        }
        PressureError::StoreUnavailable(_) => "Store unavailable",
        _ => "Error",
    }
}
