use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::session::InputMode;

/// One admitted start, written to the store exactly once.
///
/// In two-code mode a single record carries both slot codes, which is what
/// the next station looks up as "the" dwell event for the barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub barcode: String,
    pub first_code: String,
    pub second_code: Option<String>,
    pub duration_seconds: u32,
    /// Local wall-clock time of the start, kept for operators only; dwell
    /// checks use the store's own `recorded_at`.
    pub started_at: DateTime<Local>,
    pub input_mode: InputMode,
}

impl TimerRecord {
    pub fn new(
        barcode: impl Into<String>,
        first_code: impl Into<String>,
        second_code: Option<String>,
        duration_seconds: u32,
        input_mode: InputMode,
    ) -> Self {
        Self {
            barcode: barcode.into(),
            first_code: first_code.into(),
            second_code,
            duration_seconds,
            started_at: Local::now(),
            input_mode,
        }
    }

    /// Codes covered by this record, joined for status lines.
    pub fn codes(&self) -> String {
        match &self.second_code {
            Some(second) => format!("{} + {second}", self.first_code),
            None => self.first_code.clone(),
        }
    }
}

/// Canonical form of a scanned barcode; stations compare barcodes in this form.
pub fn normalize_barcode(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// The most recent event recorded for a barcode at the previous station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousStationRecord {
    pub barcode: String,
    pub station: String,
    /// Dwell the part had to complete there.
    pub dwell_seconds: i64,
    /// Store-side clock reading when the event was written.
    pub recorded_at: DateTime<Utc>,
}

/// This workstation and, if any, the station a part must pass through first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkstationSequence {
    pub current: String,
    pub previous: Option<String>,
}

impl WorkstationSequence {
    pub fn new(current: impl Into<String>, previous: Option<String>) -> Self {
        Self {
            current: current.into(),
            previous,
        }
    }

    pub fn has_previous_station(&self) -> bool {
        self.previous_station().is_some()
    }

    /// The previous station id, when present and non-empty.
    pub fn previous_station(&self) -> Option<&str> {
        self.previous
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

impl fmt::Display for WorkstationSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.previous_station() {
            Some(previous) => write!(f, "{previous} → {}", self.current),
            None => write!(f, "{} (initial station)", self.current),
        }
    }
}
