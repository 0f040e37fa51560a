//! Shared report specification models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Partial cell format. `None` fields are "not set by this layer".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Single underline.
    pub underline: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    #[serde(alias = "bg_colour")]
    pub bg_color: Option<String>,
    /// Font color.
    #[serde(alias = "font_colour")]
    pub font_color: Option<String>,
    /// Border color for all sides.
    #[serde(alias = "border_colour")]
    pub border_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underline: other.underline.or(self.underline),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            border_color: other
                .border_color
                .clone()
                .or_else(|| self.border_color.clone()),
        }
    }

    /// True when no attribute is set.
    pub fn is_empty(&self) -> bool {
        *self == SpecCellFormat::default()
    }
}

/// One styled fragment of a rich-text cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecRichSegment {
    /// Fragment text.
    pub text: String,
    /// Bold fragment.
    pub bold: bool,
    /// Italic fragment.
    pub italic: bool,
    /// Fragment font color.
    #[serde(alias = "colour", alias = "font_color", alias = "font_colour")]
    pub color: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValues

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Date/datetime as an Excel serial number (days since 1899-12-30).
    DateTime(f64),
}

impl EnumCellValue {
    /// Numeric view used by totals and KPI aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EnumCellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Display text used for width estimation and KPI labels.
    pub fn to_display_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(s) => s.clone(),
            EnumCellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            EnumCellValue::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
            EnumCellValue::DateTime(n) => n.to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableSpecification

/// Metadata of the most recently written table on a sheet.
///
/// Row/column indices are 0-based worksheet coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableInfo {
    /// Owning sheet name.
    pub sheet_name: String,
    /// Header row index.
    pub row_header: usize,
    /// First data row index.
    pub row_data_first: usize,
    /// Last data row index. Equals `row_header` when the table has no rows.
    pub row_data_last: usize,
    /// First column index.
    pub col_start: usize,
    /// Column key → absolute column index, in write order.
    pub columns: Vec<(String, usize)>,
}

impl SpecTableInfo {
    /// Number of data rows covered by this table.
    pub fn height_data(&self) -> usize {
        if self.row_data_last < self.row_data_first {
            0
        } else {
            self.row_data_last - self.row_data_first + 1
        }
    }

    /// Absolute column index of `column`, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(c_name, _)| c_name == column)
            .map(|(_, n_idx)| *n_idx)
    }

    /// Right-most column index of the table.
    pub fn col_end(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, n_idx)| *n_idx)
            .max()
            .unwrap_or(self.col_start)
    }
}

/// Call-site table style overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecTableStyleOverrides {
    /// Header background color.
    #[serde(alias = "header_bg_colour")]
    pub header_bg: Option<String>,
    /// Header font color.
    #[serde(alias = "header_font_colour", alias = "header_font_color")]
    pub header_font: Option<String>,
    /// Border color for header and body cells.
    #[serde(alias = "border_colour")]
    pub border_color: Option<String>,
    /// Font size for header and body cells.
    pub font_size: Option<i64>,
}

/// Options for [`crate::writer::ReportWriter::write_table`].
#[derive(Debug, Clone, Default)]
pub struct SpecTableWriteOptions {
    /// Start column; defaults to the configured global start column.
    pub start_col: Option<usize>,
    /// Append a totals row.
    pub add_totals: bool,
    /// Register an auto filter over header and data rows.
    pub auto_filter: bool,
    /// Call-site style overrides.
    pub style_overrides: SpecTableStyleOverrides,
    /// Column key → horizontal alignment.
    pub column_alignments: BTreeMap<String, String>,
    /// Signed column position → format; negative counts from the end.
    pub column_style_overrides: BTreeMap<i64, SpecCellFormat>,
    /// Per-cell formats keyed by (row index, column key).
    pub cell_style_map: StyleMap,
}

/// Sparse per-cell style map keyed by (row index, column key).
pub type StyleMap = BTreeMap<(usize, String), SpecCellFormat>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region VisualSpecification

/// Conditional-format comparison criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnumConditionCriteria {
    /// Greater than.
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Less than.
    #[serde(rename = "<")]
    LessThan,
    /// Less than or equal.
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// Equal.
    #[serde(rename = "==")]
    EqualTo,
    /// Not equal.
    #[serde(rename = "!=")]
    NotEqualTo,
    /// Inclusive range between `value` and `value_upper`.
    #[serde(rename = "between")]
    Between,
}

/// Comparison operand for conditional formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumConditionValue {
    /// Numeric threshold.
    Number(f64),
    /// Text threshold.
    Text(String),
}

/// Cell-value conditional format request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecConditionalFormat {
    /// Target column key in the last written table.
    pub column: String,
    /// Comparison criteria.
    pub criteria: EnumConditionCriteria,
    /// Comparison value (lower bound for `between`).
    pub value: EnumConditionValue,
    /// Upper bound for `between`.
    #[serde(default)]
    pub value_upper: Option<EnumConditionValue>,
    /// Highlight background color.
    #[serde(default = "default_condition_bg", alias = "colour")]
    pub bg_color: String,
    /// Highlight font color.
    #[serde(default = "default_condition_font", alias = "font_colour")]
    pub font_color: String,
}

fn default_condition_bg() -> String {
    "#FF9999".to_string()
}

fn default_condition_font() -> String {
    "#9C0006".to_string()
}

/// Source of sparkline values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSparklineSource {
    /// One value list per table row, stored in a helper block on the sheet.
    Values(Vec<Vec<f64>>),
    /// Named columns of the last written table.
    Columns(Vec<String>),
}

/// Native chart kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumChartKind {
    /// Vertical bars.
    #[default]
    Column,
    /// Horizontal bars.
    Bar,
    /// Line.
    Line,
    /// Pie.
    Pie,
    /// Scatter.
    Scatter,
}

/// Native chart request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecChartOptions {
    /// Chart title.
    pub title: String,
    /// Chart kind.
    pub kind: EnumChartKind,
    /// Category column key.
    pub x_col: Option<String>,
    /// Value column keys, one series each.
    pub y_cols: Vec<String>,
    /// Explicit anchor row; cursor is left untouched when set.
    pub row: Option<usize>,
    /// Explicit anchor column.
    pub col: Option<usize>,
}

/// KPI label/value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecKpi {
    /// Column key or free label; resolved through the column dictionary.
    pub label: String,
    /// KPI value.
    pub value: EnumCellValue,
    /// Explicit number format; wins over dictionary and heuristic formats.
    pub num_format: Option<String>,
}

impl SpecKpi {
    pub fn new(label: impl Into<String>, value: EnumCellValue) -> Self {
        Self {
            label: label.into(),
            value,
            num_format: None,
        }
    }
}

/// Options for styled free text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecTextOptions {
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Font color.
    #[serde(alias = "font_colour")]
    pub font_color: Option<String>,
    /// Background color.
    #[serde(alias = "bg_colour")]
    pub bg_color: Option<String>,
    /// Bold text.
    pub bold: Option<bool>,
    /// Italic text.
    pub italic: Option<bool>,
    /// Start column; defaults to the global start column.
    pub col: Option<usize>,
}

/// Options for full-width banners.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecBannerOptions {
    /// Style profile name (config component).
    pub style_profile: Option<String>,
    /// Number of merged columns; defaults to 10.
    pub merge_cols: Option<usize>,
    /// Wrap text inside the banner.
    pub text_wrap: bool,
    /// Grow the row height with the text length.
    pub auto_height: bool,
}

/// Options for definition lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecDefinitionListOptions {
    /// Start column; defaults to the global start column.
    pub start_col: Option<usize>,
    /// Wrap definitions inside their merged cell.
    pub text_wrap: bool,
    /// Grow row heights with definition length.
    pub auto_height: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportLog

/// Per-writer run log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecReportLog {
    /// Sheet names in creation order.
    pub sheets: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecReportLog {
    /// Add a warning message and forward it to the log facade.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        log::warn!("{}", msg.as_ref());
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
