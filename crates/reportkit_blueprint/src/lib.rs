//! `reportkit_blueprint` v1:
//! workbook decompiler that turns an existing XLSX into report build actions.
//!
//! Modules:
//! - `reader` : zip + XML reader producing sparse per-sheet grids
//! - `scan`   : rectangle segmentation, block classification, theme detection
//! - `script` : hints, blueprint extraction and action script generation
pub mod error;
pub mod reader;
pub mod scan;
pub mod script;

pub use error::{BlueprintError, BlueprintResult};
pub use reader::{
    EnumGridValue, SpecCellStyle, SpecGridCell, SpecMergeRange, SpecSheetGrid, SpecWorkbookGrid,
    read_workbook, read_workbook_bytes, read_workbook_file,
};
pub use scan::{
    EnumBlockKind, N_SCAN_COLS_MAX, N_SCAN_ROWS_MAX, SpecBlockRect, SpecContentBlock,
    classify_block, detect_theme, scan_sheet, segment_sheet,
};
pub use script::{
    BlueprintExtractor, EnumHintKind, SpecBlueprint, SpecBlueprintHints, SpecBlueprintScript,
    SpecComponentHint, SpecSheetBlueprint, SpecSheetHints,
};
