//! Block segmentation, classification and theme detection.
//!
//! A sheet is split into axis-aligned rectangles of contiguous populated
//! cells. Cells that only partially fit a rectangle are left for a later
//! block, so an L-shaped region becomes two blocks.

use std::collections::BTreeSet;

use reportkit_xlsx::conf::C_THEME_COLOR_DEFAULT;

use crate::reader::{EnumGridValue, SpecCellStyle, SpecSheetGrid, SpecWorkbookGrid};

/// Rows scanned per sheet.
pub const N_SCAN_ROWS_MAX: usize = 1000;
/// Columns scanned per sheet.
pub const N_SCAN_COLS_MAX: usize = 50;
/// Rows inspected when guessing the theme color.
pub const N_THEME_ROWS_MAX: usize = 20;
/// Fill colors never taken as a theme.
const TUP_THEME_IGNORED: [&str; 2] = ["#FFFFFF", "#000000"];

////////////////////////////////////////////////////////////////////////////////
// #region Blocks

/// Inclusive 0-based rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecBlockRect {
    pub row_first: usize,
    pub col_first: usize,
    pub row_last: usize,
    pub col_last: usize,
}

impl SpecBlockRect {
    pub fn height(&self) -> usize {
        self.row_last - self.row_first + 1
    }

    pub fn width(&self) -> usize {
        self.col_last - self.col_first + 1
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_first..=self.row_last).contains(&row)
            && (self.col_first..=self.col_last).contains(&col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumBlockKind {
    /// Single-row, narrow block: a title or text line.
    Text {
        value: EnumGridValue,
        style: SpecCellStyle,
        if_merged: bool,
    },
    /// Multi-row block: a table whose first row is the header.
    DataFrame {
        headers: Vec<String>,
        /// Height including the header row.
        n_rows: usize,
        header_style: SpecCellStyle,
        /// Last row starts with `Total`.
        if_has_totals: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecContentBlock {
    pub rect: SpecBlockRect,
    pub kind: EnumBlockKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumScanState {
    Scanning,
    Tracing { row: usize, col: usize },
}

/// Boolean grid sized to the scan bounds.
struct VisitedGrid {
    n_cols: usize,
    l_cells: Vec<bool>,
}

impl VisitedGrid {
    fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            l_cells: vec![false; n_rows * n_cols],
        }
    }

    fn get(&self, row: usize, col: usize) -> bool {
        self.l_cells[row * self.n_cols + col]
    }

    fn mark(&mut self, rect: &SpecBlockRect) {
        for n_row in rect.row_first..=rect.row_last {
            for n_col in rect.col_first..=rect.col_last {
                self.l_cells[n_row * self.n_cols + n_col] = true;
            }
        }
    }
}

/// Split a sheet into disjoint rectangles, in row-major order of their origin.
///
/// Every populated cell inside the scan bounds lands in exactly one rectangle.
pub fn segment_sheet(grid: &SpecSheetGrid) -> Vec<SpecBlockRect> {
    let n_rows = grid.n_rows.min(N_SCAN_ROWS_MAX);
    let n_cols = grid.n_cols.min(N_SCAN_COLS_MAX);
    let mut visited = VisitedGrid::new(n_rows, n_cols);
    let mut l_rects = Vec::new();
    let if_open = |visited: &VisitedGrid, row: usize, col: usize| {
        grid.if_has_value(row, col) && !visited.get(row, col)
    };

    let mut state = EnumScanState::Scanning;
    for n_row in 0..n_rows {
        for n_col in 0..n_cols {
            if let EnumScanState::Scanning = state
                && if_open(&visited, n_row, n_col)
            {
                state = EnumScanState::Tracing {
                    row: n_row,
                    col: n_col,
                };
            }
            let EnumScanState::Tracing { row, col } = state else {
                continue;
            };

            let mut n_col_last = col;
            while n_col_last + 1 < n_cols && if_open(&visited, row, n_col_last + 1) {
                n_col_last += 1;
            }
            let mut n_row_last = row;
            while n_row_last + 1 < n_rows
                && (col..=n_col_last).all(|c| if_open(&visited, n_row_last + 1, c))
            {
                n_row_last += 1;
            }
            let rect = SpecBlockRect {
                row_first: row,
                col_first: col,
                row_last: n_row_last,
                col_last: n_col_last,
            };
            visited.mark(&rect);
            log::debug!(
                "sheet {:?}: block at ({}, {}) size {}x{}",
                grid.name,
                rect.row_first,
                rect.col_first,
                rect.height(),
                rect.width()
            );
            l_rects.push(rect);
            state = EnumScanState::Scanning;
        }
    }
    l_rects
}

/// Classify one rectangle; wide single-row blocks are left unclassified.
pub fn classify_block(grid: &SpecSheetGrid, rect: SpecBlockRect) -> Option<SpecContentBlock> {
    let start = grid.cell(rect.row_first, rect.col_first)?;
    if rect.height() == 1 && rect.width() < 3 {
        return Some(SpecContentBlock {
            rect,
            kind: EnumBlockKind::Text {
                value: start.value.clone(),
                style: start.style.clone(),
                if_merged: grid.if_merged(rect.row_first, rect.col_first),
            },
        });
    }
    if rect.height() > 1 {
        let headers = (rect.col_first..=rect.col_last)
            .map(|n_col| match grid.value(rect.row_first, n_col) {
                Some(value) => value.to_display_text(),
                None => format!("Col_{}", n_col + 1),
            })
            .collect();
        let if_has_totals = matches!(
            grid.value(rect.row_last, rect.col_first),
            Some(EnumGridValue::Text(text)) if text.trim().eq_ignore_ascii_case("total")
        );
        return Some(SpecContentBlock {
            rect,
            kind: EnumBlockKind::DataFrame {
                headers,
                n_rows: rect.height(),
                header_style: start.style.clone(),
                if_has_totals,
            },
        });
    }
    None
}

/// Segment and classify a sheet, dropping unclassified blocks.
pub fn scan_sheet(grid: &SpecSheetGrid) -> Vec<SpecContentBlock> {
    segment_sheet(grid)
        .into_iter()
        .filter_map(|rect| {
            let block = classify_block(grid, rect);
            if block.is_none() {
                log::debug!(
                    "sheet {:?}: ignoring unclassified block at ({}, {})",
                    grid.name,
                    rect.row_first,
                    rect.col_first
                );
            }
            block
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Theme

/// Most frequent fill color in the first rows of the first eligible sheet.
///
/// Ties go to the color seen first; falls back to the default theme color.
pub fn detect_theme(workbook: &SpecWorkbookGrid, ignored: &BTreeSet<String>) -> String {
    for grid in &workbook.sheets {
        if grid.if_hidden || ignored.contains(&grid.name) {
            continue;
        }
        let mut l_counts: Vec<(String, usize)> = Vec::new();
        for ((n_row, _), cell) in grid.iter_cells() {
            if n_row >= N_THEME_ROWS_MAX {
                break;
            }
            let Some(c_color) = cell.style.fill_color.as_deref() else {
                continue;
            };
            if TUP_THEME_IGNORED.contains(&c_color) {
                continue;
            }
            match l_counts.iter_mut().find(|(c_seen, _)| c_seen == c_color) {
                Some((_, n_count)) => *n_count += 1,
                None => l_counts.push((c_color.to_string(), 1)),
            }
        }
        let mut best: Option<&(String, usize)> = None;
        for entry in &l_counts {
            if best.is_none_or(|(_, n_best)| entry.1 > *n_best) {
                best = Some(entry);
            }
        }
        if let Some((c_color, _)) = best {
            return c_color.clone();
        }
    }
    C_THEME_COLOR_DEFAULT.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tests


// #endregion
