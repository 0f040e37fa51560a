//! Report constants, heuristic lookup tables and default preset factories.

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text maximum length.
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Fallback primary color when neither config nor caller sets one.
pub const C_THEME_COLOR_DEFAULT: &str = "#003366";
/// Font family used by every engine default.
pub const C_FONT_NAME_DEFAULT: &str = "Arial";
/// Name of the hidden sheet holding chart source data.
pub const C_SHEET_CHART_DATA: &str = "Chart_Data";
/// Name of the generated contents sheet.
pub const C_SHEET_TOC: &str = "Table of Contents";
/// Placeholder text for empty tables.
pub const C_TABLE_EMPTY_TEXT: &str = "No Data Available";

/// Column width padding added to the widest value.
pub const N_WIDTH_COL_PADDING: usize = 2;
/// Column width cap.
pub const N_WIDTH_COL_MAX: usize = 50;
/// Columns spanned by the empty-table placeholder.
pub const N_WIDTH_EMPTY_PLACEHOLDER: usize = 4;
/// Rows consumed by the empty-table placeholder.
pub const N_HEIGHT_EMPTY_PLACEHOLDER: usize = 3;
/// Column stride between KPI blocks.
pub const N_STRIDE_KPI: usize = 3;
/// Rows consumed by a KPI row.
pub const N_HEIGHT_KPI: usize = 4;
/// Rows consumed by a chart anchored at the cursor.
pub const N_HEIGHT_CHART: usize = 22;
/// Chart size in pixels.
pub const TUP_CHART_SIZE: (u32, u32) = (700, 400);
/// First helper column used for sparkline source values.
pub const N_COL_SPARKLINE_DATA: usize = 50;
/// Default banner width in merged columns.
pub const N_WIDTH_BANNER_DEFAULT: usize = 10;

/// Column-name substrings mapped to a currency number format, checked in order.
pub const TUP_HEURISTIC_CURRENCY: [&str; 9] = [
    "price", "cost", "revenue", "amount", "budget", "actual", "variance", "sales", "spend",
];
/// Column-name substrings mapped to a percentage number format, checked in order.
pub const TUP_HEURISTIC_PERCENT: [&str; 5] = ["percent", "pct", "rate", "ratio", "efficiency"];
/// Column-name substrings exempted from totals (summing them is meaningless).
pub const TUP_TOTALS_EXEMPT: [&str; 7] = [
    "percent", "pct", "rate", "ratio", "efficiency", "eff", "%",
];
/// URL schemes written as hyperlinks.
pub const TUP_URL_SCHEMES: [&str; 4] = ["http://", "https://", "ftp://", "mailto:"];

/// Default currency number format.
pub const C_NUM_FORMAT_CURRENCY: &str = "£#,##0.00";
/// Default percentage number format.
pub const C_NUM_FORMAT_PERCENT: &str = "0.0%";
/// Default integer grouping format.
pub const C_NUM_FORMAT_INTEGER: &str = "#,##0";
/// Default decimal grouping format.
pub const C_NUM_FORMAT_DECIMAL: &str = "#,##0.00";
/// Default date format.
pub const C_NUM_FORMAT_DATE: &str = "dd/mm/yyyy";

/// Heuristic number-format class derived from a column key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFmtKey {
    /// Currency-like column.
    Currency,
    /// Percentage-like column.
    Percent,
    /// Integer values.
    Integer,
    /// Decimal values.
    Decimal,
    /// Date/datetime values.
    Date,
    /// Non-numeric text.
    Text,
}

/// Body cell format shared by every table.
pub fn derive_default_body_format() -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(10),
        border: Some(1),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}

/// Header cell format before theme/config layers.
pub fn derive_default_header_format(theme_color: &str) -> SpecCellFormat {
    derive_default_body_format().with_(SpecCellFormat {
        bold: Some(true),
        font_color: Some("#FFFFFF".to_string()),
        bg_color: Some(theme_color.to_string()),
        align: Some("center".to_string()),
        ..Default::default()
    })
}

/// Totals row format before column number formats.
pub fn derive_default_totals_format() -> SpecCellFormat {
    derive_default_body_format().with_(SpecCellFormat {
        bold: Some(true),
        bg_color: Some("#E0E0E0".to_string()),
        num_format: Some(C_NUM_FORMAT_INTEGER.to_string()),
        ..Default::default()
    })
}

/// Title format before `Header` config.
pub fn derive_default_title_format(theme_color: &str) -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(18),
        bold: Some(true),
        font_color: Some(theme_color.to_string()),
        ..Default::default()
    }
}

/// Hyperlink format.
pub fn derive_default_link_format() -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(11),
        font_color: Some("#0000FF".to_string()),
        underline: Some(true),
        ..Default::default()
    }
}

/// KPI label format.
pub fn derive_default_kpi_label_format() -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(9),
        font_color: Some("#666666".to_string()),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        border: Some(1),
        top: Some(2),
        left: Some(2),
        right: Some(2),
        bottom: Some(0),
        ..Default::default()
    }
}

/// KPI value format.
pub fn derive_default_kpi_value_format(theme_color: &str) -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(14),
        bold: Some(true),
        font_color: Some(theme_color.to_string()),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        border: Some(1),
        top: Some(0),
        left: Some(2),
        right: Some(2),
        bottom: Some(2),
        ..Default::default()
    }
}
