use std::collections::HashMap;

use super::position::{TimerPosition, format_code};

/// Row letters of the grid, in display order.
pub const ROW_LETTERS: std::ops::RangeInclusive<char> = 'A'..='Z';

/// Largest column count whose slot numbers still fit the two-digit code shape.
pub const MAX_COLUMNS: u32 = 49;

/// Maps operator-entered slot codes to grid positions.
///
/// The code space is small and fully enumerable, so every valid code is
/// generated up front and lookups are a table probe. Anything not in the
/// table (a mis-scan, an out-of-range number, a doubled letter) is rejected.
#[derive(Debug, Clone)]
pub struct PositionMapper {
    columns: u32,
    // Row-major: letters ascending, numbers ascending within a letter.
    positions: Vec<TimerPosition>,
    index: HashMap<String, usize>,
}

impl PositionMapper {
    /// Builds every position for `columns` columns; each letter row holds
    /// `2 * columns` slots (odd and even lines). Counts above
    /// [`MAX_COLUMNS`] are clamped.
    pub fn new(columns: u32) -> Self {
        let columns = columns.min(MAX_COLUMNS);
        let per_row = columns.saturating_mul(2);
        let mut positions = Vec::with_capacity(ROW_LETTERS.count() * per_row as usize);
        let mut index = HashMap::with_capacity(positions.capacity());

        for row in ROW_LETTERS {
            for number in 1..=per_row {
                index.insert(format_code(row, number), positions.len());
                positions.push(TimerPosition::new(row, number));
            }
        }

        Self {
            columns,
            positions,
            index,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn slots_per_row(&self) -> u32 {
        self.columns * 2
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Looks up a code after trimming and upper-casing it.
    pub fn resolve(&self, code: &str) -> Option<&TimerPosition> {
        self.index
            .get(&normalize_code(code))
            .map(|&i| &self.positions[i])
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        self.resolve(code).is_some()
    }

    /// Every `(code, position)` pair, grouped by row letter ascending.
    pub fn all_positions(&self) -> impl Iterator<Item = (String, &TimerPosition)> + '_ {
        self.positions.iter().map(|p| (p.code(), p))
    }

    /// Positions split into letter rows, for laying out the grid.
    pub fn rows(&self) -> impl Iterator<Item = (char, &[TimerPosition])> + '_ {
        let per_row = self.slots_per_row().max(1) as usize;
        self.positions
            .chunks(per_row)
            .filter_map(|chunk| chunk.first().map(|p| (p.row, chunk)))
    }
}

/// Canonical form of an operator-entered code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
