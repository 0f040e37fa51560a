//! Stateless helper utilities used by the report writer.

use std::collections::BTreeSet;

use polars::prelude::{AnyValue, DataType, TimeUnit};

use crate::conf::{
    C_NUM_FORMAT_DECIMAL, C_NUM_FORMAT_INTEGER, C_NUM_FORMAT_PERCENT, EnumFmtKey,
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
    TUP_HEURISTIC_CURRENCY, TUP_HEURISTIC_PERCENT, TUP_TOTALS_EXEMPT, TUP_URL_SCHEMES,
};
use crate::config::SpecTheme;
use crate::error::{ReportError, ReportResult};
use crate::spec::{EnumCellValue, SpecRichSegment};

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const N_DAYS_EXCEL_UNIX_OFFSET: f64 = 25_569.0;

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert one dataset value to a writable cell value.
///
/// Dates and datetimes become Excel serial numbers; non-finite floats become blanks.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::Date(n_days) => EnumCellValue::DateTime(n_days as f64 + N_DAYS_EXCEL_UNIX_OFFSET),
        AnyValue::Datetime(val, time_unit, _) => {
            EnumCellValue::DateTime(derive_excel_serial_from_timestamp(val, time_unit))
        }
        AnyValue::DatetimeOwned(val, time_unit, _) => {
            EnumCellValue::DateTime(derive_excel_serial_from_timestamp(val, time_unit))
        }
        other => match derive_f64_from_any_value(&other) {
            Some(n) if n.is_finite() => EnumCellValue::Number(n),
            Some(_) => EnumCellValue::None,
            None => EnumCellValue::String(other.to_string()),
        },
    }
}

/// Numeric view of a dataset value; text is not parsed.
pub fn derive_f64_from_any_value(value: &AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::UInt8(val) => Some(*val as f64),
        AnyValue::UInt16(val) => Some(*val as f64),
        AnyValue::UInt32(val) => Some(*val as f64),
        AnyValue::UInt64(val) => Some(*val as f64),
        AnyValue::Int8(val) => Some(*val as f64),
        AnyValue::Int16(val) => Some(*val as f64),
        AnyValue::Int32(val) => Some(*val as f64),
        AnyValue::Int64(val) => Some(*val as f64),
        AnyValue::Int128(val) => Some(*val as f64),
        AnyValue::Float32(val) => Some(*val as f64),
        AnyValue::Float64(val) => Some(*val),
        _ => None,
    }
}

fn derive_excel_serial_from_timestamp(value: i64, time_unit: TimeUnit) -> f64 {
    let n_per_day = match time_unit {
        TimeUnit::Nanoseconds => 86_400_000_000_000.0,
        TimeUnit::Microseconds => 86_400_000_000.0,
        TimeUnit::Milliseconds => 86_400_000.0,
    };
    value as f64 / n_per_day + N_DAYS_EXCEL_UNIX_OFFSET
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatHeuristics

/// Classify a column for number formatting from its key and dtype.
///
/// Substring tables are checked in order: currency first, then percentage.
pub fn derive_fmt_key(column: &str, dtype: &DataType) -> EnumFmtKey {
    if matches!(dtype, DataType::Date | DataType::Datetime(..)) {
        return EnumFmtKey::Date;
    }
    if !dtype.is_numeric() {
        return EnumFmtKey::Text;
    }
    let c_key = column.to_lowercase();
    if TUP_HEURISTIC_CURRENCY.iter().any(|c_sub| c_key.contains(c_sub)) {
        EnumFmtKey::Currency
    } else if TUP_HEURISTIC_PERCENT.iter().any(|c_sub| c_key.contains(c_sub)) {
        EnumFmtKey::Percent
    } else if dtype.is_integer() {
        EnumFmtKey::Integer
    } else {
        EnumFmtKey::Decimal
    }
}

/// Classify a single scalar (KPI values) by name and value type.
pub fn derive_fmt_key_for_value(column: &str, value: &EnumCellValue) -> EnumFmtKey {
    match value {
        EnumCellValue::DateTime(_) => EnumFmtKey::Date,
        EnumCellValue::Number(n) => {
            let dtype = if n.fract() == 0.0 {
                DataType::Int64
            } else {
                DataType::Float64
            };
            derive_fmt_key(column, &dtype)
        }
        _ => EnumFmtKey::Text,
    }
}

/// Number format for a heuristic class; text has none.
pub fn derive_heuristic_num_format(fmt_key: EnumFmtKey, theme: &SpecTheme) -> Option<String> {
    match fmt_key {
        EnumFmtKey::Currency => Some(theme.currency_format.clone()),
        EnumFmtKey::Percent => Some(C_NUM_FORMAT_PERCENT.to_string()),
        EnumFmtKey::Integer => Some(C_NUM_FORMAT_INTEGER.to_string()),
        EnumFmtKey::Decimal => Some(C_NUM_FORMAT_DECIMAL.to_string()),
        EnumFmtKey::Date => Some(theme.date_format.clone()),
        EnumFmtKey::Text => None,
    }
}

/// Whether summing `column` is meaningless (rates, percentages, efficiencies).
pub fn if_is_totals_exempt(column: &str) -> bool {
    let c_key = column.to_lowercase();
    TUP_TOTALS_EXEMPT.iter().any(|c_sub| c_key.contains(c_sub))
}

/// Whether `text` should be written as a hyperlink.
pub fn if_is_url(text: &str) -> bool {
    let c_text = text.trim_start().to_ascii_lowercase();
    TUP_URL_SCHEMES
        .iter()
        .any(|c_scheme| c_text.starts_with(c_scheme))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::DateTime(_) => 10,
        other => estimate_unicode_string_width(&other.to_display_text()),
    }
}

/// Count non-ASCII characters as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Addressing

/// 0-based column index to letters (`0 -> A`, `27 -> AB`).
pub fn derive_column_letter(col: usize) -> String {
    let mut n_rest = col + 1;
    let mut l_chars = Vec::new();
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// 0-based cell to absolute A1 reference (`(2, 2) -> $C$3`).
pub fn derive_cell_ref_absolute(row: usize, col: usize) -> String {
    format!("${}${}", derive_column_letter(col), row + 1)
}

/// 0-based cell to relative A1 reference (`(2, 2) -> C3`).
pub fn derive_cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", derive_column_letter(col), row + 1)
}

/// Quoted sheet prefix for formulas and internal links.
pub fn derive_sheet_ref(sheet_name: &str) -> String {
    format!("'{}'", sheet_name.replace('\'', "''"))
}

/// Column range formula from 0-based engine rows, e.g. `='Sheet'!$C$3:$C$6`.
pub fn derive_range_formula(sheet_name: &str, col: usize, row_first: usize, row_last: usize) -> String {
    format!(
        "={}!{}:{}",
        derive_sheet_ref(sheet_name),
        derive_cell_ref_absolute(row_first, col),
        derive_cell_ref_absolute(row_last, col)
    )
}

/// Convert an engine row index into the writer's row type.
pub fn cast_row_num(value: usize) -> ReportResult<u32> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(ReportError::Validation(format!(
            "row index overflow: {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| ReportError::Validation(format!("row index overflow: {value}")))
}

/// Convert an engine column index into the writer's column type.
pub fn cast_col_num(value: usize) -> ReportResult<u16> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(ReportError::Validation(format!(
            "column index overflow: {value}"
        )));
    }
    u16::try_from(value)
        .map_err(|_| ReportError::Validation(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Return `name` or a suffixed variant (`name__2`, ...) not in `existing`.
///
/// Comparison is case-insensitive, matching Excel.
pub fn derive_unique_sheet_name(name: &str, existing: &BTreeSet<String>) -> String {
    let if_taken = |candidate: &str| existing.contains(&candidate.to_lowercase());
    if !if_taken(name) {
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !if_taken(&candidate) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RichText

/// Parse rich-text input: a JSON list of segments and plain strings, or the
/// same list loosely quoted (`["Status: ", {'text': 'CRITICAL', 'bold': True}]`).
///
/// Returns `None` when the text is not a segment list; callers then write it
/// as plain text.
pub fn parse_rich_segments(text: &str) -> Option<Vec<SpecRichSegment>> {
    let c_trimmed = text.trim();
    if !c_trimmed.starts_with('[') {
        return None;
    }
    let l_items = match serde_json::from_str::<Vec<serde_json::Value>>(c_trimmed) {
        Ok(l_items) => l_items,
        Err(_) => {
            serde_json::from_str::<Vec<serde_json::Value>>(&normalize_loose_literal(c_trimmed))
                .ok()?
        }
    };
    l_items.into_iter().map(derive_rich_segment).collect()
}

fn derive_rich_segment(item: serde_json::Value) -> Option<SpecRichSegment> {
    match item {
        serde_json::Value::String(text) => Some(SpecRichSegment {
            text,
            ..Default::default()
        }),
        serde_json::Value::Object(_) => serde_json::from_value(item).ok(),
        _ => None,
    }
}

/// Rewrite single-quoted strings and `True`/`False`/`None` into JSON.
fn normalize_loose_literal(text: &str) -> String {
    let mut c_out = String::with_capacity(text.len());
    let mut chr_quote: Option<char> = None;
    let mut l_chars = text.chars().peekable();
    let mut c_word = String::new();

    let flush_word = |c_word: &mut String, c_out: &mut String| {
        match c_word.as_str() {
            "True" => c_out.push_str("true"),
            "False" => c_out.push_str("false"),
            "None" => c_out.push_str("null"),
            _ => c_out.push_str(c_word),
        }
        c_word.clear();
    };

    while let Some(chr) = l_chars.next() {
        match chr_quote {
            Some(q) => {
                if chr == '\\' {
                    if let Some(chr_escaped) = l_chars.next() {
                        if chr_escaped == '\'' {
                            c_out.push('\'');
                        } else {
                            c_out.push('\\');
                            c_out.push(chr_escaped);
                        }
                    }
                } else if chr == q {
                    c_out.push('"');
                    chr_quote = None;
                } else if chr == '"' {
                    c_out.push_str("\\\"");
                } else {
                    c_out.push(chr);
                }
            }
            None => {
                if chr.is_alphanumeric() || chr == '_' {
                    c_word.push(chr);
                    continue;
                }
                flush_word(&mut c_word, &mut c_out);
                if chr == '\'' || chr == '"' {
                    chr_quote = Some(chr);
                    c_out.push('"');
                } else {
                    c_out.push(chr);
                }
            }
        }
    }
    flush_word(&mut c_word, &mut c_out);
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecReportConfig;

    #[test]
    fn range_formula_converts_to_one_based_absolute_refs() {
        assert_eq!(derive_column_letter(0), "A");
        assert_eq!(derive_column_letter(25), "Z");
        assert_eq!(derive_column_letter(26), "AA");
        assert_eq!(derive_column_letter(701), "ZZ");
        assert_eq!(derive_column_letter(702), "AAA");
        assert_eq!(derive_range_formula("Sales", 2, 2, 5), "='Sales'!$C$3:$C$6");
        assert_eq!(
            derive_range_formula("Bob's Data", 0, 1, 1),
            "='Bob''s Data'!$A$2:$A$2"
        );
    }

    #[test]
    fn heuristics_follow_lookup_order() {
        let theme = SpecTheme::from_config(&SpecReportConfig::default(), None);
        assert_eq!(derive_fmt_key("total_revenue", &DataType::Int64), EnumFmtKey::Currency);
        // currency wins over percent when both substrings appear
        assert_eq!(derive_fmt_key("price_rate", &DataType::Float64), EnumFmtKey::Currency);
        assert_eq!(derive_fmt_key("efficiency_rate", &DataType::Float64), EnumFmtKey::Percent);
        assert_eq!(derive_fmt_key("units", &DataType::Int32), EnumFmtKey::Integer);
        assert_eq!(derive_fmt_key("score", &DataType::Float64), EnumFmtKey::Decimal);
        assert_eq!(derive_fmt_key("revenue", &DataType::String), EnumFmtKey::Text);
        assert_eq!(derive_fmt_key("when", &DataType::Date), EnumFmtKey::Date);
        assert_eq!(
            derive_heuristic_num_format(EnumFmtKey::Currency, &theme).as_deref(),
            Some("£#,##0.00")
        );
        assert_eq!(derive_heuristic_num_format(EnumFmtKey::Text, &theme), None);

        assert!(if_is_totals_exempt("efficiency_rate"));
        assert!(if_is_totals_exempt("margin_%"));
        assert!(!if_is_totals_exempt("revenue"));
    }

    #[test]
    fn url_detection() {
        assert!(if_is_url("https://example.com"));
        assert!(if_is_url("mailto:someone@example.com"));
        assert!(if_is_url("FTP://files"));
        assert!(!if_is_url("www.example.com"));
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]", "_"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");

        let existing: BTreeSet<String> = ["summary".to_string(), "summary__2".to_string()]
            .into_iter()
            .collect();
        assert_eq!(derive_unique_sheet_name("Summary", &existing), "Summary__3");
        assert_eq!(derive_unique_sheet_name("Detail", &existing), "Detail");
    }

    #[test]
    fn rich_segments_parse_or_fall_back() {
        let l_segments =
            parse_rich_segments(r#"[{"text": "Bold", "bold": true}, {"text": " plain"}]"#)
                .expect("json");
        assert_eq!(l_segments.len(), 2);
        assert!(l_segments[0].bold);

        let l_segments = parse_rich_segments(
            "['Status: ', {'text': \"It's red\", 'colour': 'red', 'italic': True}]",
        )
        .expect("loose literal");
        assert_eq!(l_segments[0].text, "Status: ");
        assert!(!l_segments[0].bold);
        assert_eq!(l_segments[1].text, "It's red");
        assert_eq!(l_segments[1].color.as_deref(), Some("red"));
        assert!(l_segments[1].italic);

        assert_eq!(parse_rich_segments("just text"), None);
        assert_eq!(parse_rich_segments("[{'text': broken"), None);
    }

    #[test]
    fn dates_become_excel_serials() {
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Date(0)),
            EnumCellValue::DateTime(25_569.0)
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Float64(f64::NAN)),
            EnumCellValue::None
        );
        assert_eq!(estimate_width_len(&EnumCellValue::DateTime(45_000.0)), 10);
    }
}
