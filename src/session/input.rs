use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How many fields the operator fills per start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    /// Slot code only; no barcode, no sequence check, nothing persisted.
    #[default]
    #[serde(alias = "general")]
    General,
    /// Barcode, then one slot code.
    #[serde(alias = "double")]
    DoubleInput,
    /// Barcode, then two slot codes sharing one record.
    #[serde(alias = "triple")]
    TripleInput,
}

impl InputMode {
    pub fn requires_barcode(self) -> bool {
        !matches!(self, InputMode::General)
    }

    pub fn first_focus(self) -> Focus {
        match self {
            InputMode::General => Focus::FirstCode,
            InputMode::DoubleInput | InputMode::TripleInput => Focus::Barcode,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InputMode::General => "single code",
            InputMode::DoubleInput => "barcode + code",
            InputMode::TripleInput => "barcode + two codes",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::General => write!(f, "General"),
            InputMode::DoubleInput => write!(f, "DoubleInput"),
            InputMode::TripleInput => write!(f, "TripleInput"),
        }
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "single" | "1" => Ok(InputMode::General),
            "double" | "doubleinput" | "2" => Ok(InputMode::DoubleInput),
            "triple" | "tripleinput" | "3" => Ok(InputMode::TripleInput),
            other => Err(format!("unknown input mode: {other}")),
        }
    }
}

/// The field the next scanned line goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Barcode,
    FirstCode,
    SecondCode,
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Focus::Barcode => write!(f, "barcode"),
            Focus::FirstCode => write!(f, "timer code"),
            Focus::SecondCode => write!(f, "second timer code"),
        }
    }
}

/// Field values collected so far for the current start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInput {
    pub barcode: Option<String>,
    pub first_code: Option<String>,
}
