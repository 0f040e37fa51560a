//! `reportkit_xlsx` v1:
//! declarative builder for styled, multi-sheet XLSX reports.
//!
//! Modules:
//! - `conf`       : constants, heuristic tables and default format presets
//! - `config`     : component/key configuration and the derived theme
//! - `spec`       : specs/models/options shared across modules
//! - `style`      : layered format resolution and format caching
//! - `dictionary` : column key -> display name / number format lookup
//! - `rule`       : style-rule expressions evaluated into a cell style map
//! - `layout`     : per-sheet row cursor
//! - `util`       : pure helper functions (values, addressing, sheet names)
//! - `writer`     : stateful report writer
//! - `action`     : serializable build actions and the report driver
pub mod action;
pub mod conf;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod layout;
pub mod rule;
pub mod spec;
pub mod style;
pub mod util;
pub mod writer;

pub use action::{
    ActionQueue, DatasetRegistry, SpecBuildAction, derive_aggregate, generate_report,
    run_actions,
};
pub use conf::{
    C_SHEET_CHART_DATA, C_SHEET_TOC, N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use config::{SpecReportConfig, SpecStyleProfile, SpecTheme};
pub use dictionary::{ColumnDictionary, SpecColumnEntry};
pub use error::{ReportError, ReportResult};
pub use rule::{SpecStyleRule, create_style_map, evaluate_expression, parse_expression};
pub use spec::{
    EnumCellValue, EnumChartKind, EnumConditionCriteria, EnumConditionValue, EnumSparklineSource,
    SpecBannerOptions, SpecCellFormat, SpecChartOptions, SpecConditionalFormat,
    SpecDefinitionListOptions, SpecKpi, SpecReportLog, SpecRichSegment, SpecTableInfo,
    SpecTableStyleOverrides, SpecTableWriteOptions, SpecTextOptions, StyleMap,
};
pub use style::{StyleResolver, normalize_hex_color, resolve_layers};
pub use util::{
    derive_column_letter, derive_range_formula, derive_unique_sheet_name, parse_rich_segments,
    sanitize_sheet_name,
};
pub use writer::{ReportWriter, SpecSheetState};
