use std::fmt;

use serde::{Deserialize, Serialize};

/// One addressable slot of the timer grid, e.g. `C-07`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerPosition {
    /// Row letter, `A` through `Z`.
    pub row: char,
    /// Slot number inside the row, starting at 1.
    pub number: u32,
    /// Zero-based column index (`number - 1`).
    pub column: u32,
    /// Odd-numbered slots sit on the upper line of a letter row.
    pub is_odd_row: bool,
    pub is_valid: bool,
}

impl TimerPosition {
    pub fn new(row: char, number: u32) -> Self {
        Self {
            row,
            number,
            column: number.saturating_sub(1),
            is_odd_row: number % 2 == 1,
            is_valid: true,
        }
    }

    /// Normalized operator-facing code, `{Letter}-{Number:02}`.
    pub fn code(&self) -> String {
        format_code(self.row, self.number)
    }
}

impl fmt::Display for TimerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = if self.is_odd_row { "odd" } else { "even" };
        write!(f, "{} ({parity}, column {})", self.code(), self.column)
    }
}

pub(crate) fn format_code(row: char, number: u32) -> String {
    format!("{row}-{number:02}")
}
