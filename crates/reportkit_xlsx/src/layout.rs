//! Per-sheet row cursor.

/// Next free row of one sheet (0-based worksheet row index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorLayout {
    row_start: usize,
    row_cursor: usize,
}

impl CursorLayout {
    /// Create a cursor positioned at `row_start`.
    pub fn new(row_start: usize) -> Self {
        Self {
            row_start,
            row_cursor: row_start,
        }
    }

    /// Current row.
    pub fn row(&self) -> usize {
        self.row_cursor
    }

    /// Move down by `n` rows.
    pub fn advance(&mut self, n: usize) {
        self.row_cursor += n;
    }

    /// Record content placed at a fixed row; the cursor never moves backwards.
    pub fn place_at(&mut self, row_explicit: usize) {
        self.row_cursor = usize::max(self.row_cursor, row_explicit + 1);
    }

    /// Jump to `row` unconditionally (explicit "move cursor" request).
    pub fn set(&mut self, row: usize) {
        self.row_cursor = row;
    }

    /// Return to the configured start row.
    pub fn reset(&mut self) {
        self.row_cursor = self.row_start;
    }
}

#[cfg(test)]
mod tests {
    use super::CursorLayout;

    #[test]
    fn place_at_is_monotonic() {
        let mut cursor = CursorLayout::new(1);
        cursor.advance(5);
        assert_eq!(cursor.row(), 6);

        cursor.place_at(2);
        assert_eq!(cursor.row(), 6);

        cursor.place_at(10);
        assert_eq!(cursor.row(), 11);

        cursor.reset();
        assert_eq!(cursor.row(), 1);
    }
}
