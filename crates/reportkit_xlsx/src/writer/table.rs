//! Tables and the visuals that attach to them.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, DataType};
use rust_xlsxwriter::{
    ConditionalFormatCell, ConditionalFormatCellRule, ConditionalFormatValue, Format, Formula,
    Sparkline, SparklineType, Url,
};

use super::{ReportWriter, validate_text_len, write_cell_with_format};
use crate::conf::{
    C_FONT_NAME_DEFAULT, C_NUM_FORMAT_INTEGER, C_TABLE_EMPTY_TEXT, EnumFmtKey,
    N_COL_SPARKLINE_DATA, N_HEIGHT_EMPTY_PLACEHOLDER,
    N_WIDTH_COL_MAX, N_WIDTH_COL_PADDING, N_WIDTH_EMPTY_PLACEHOLDER,
    derive_default_body_format, derive_default_header_format, derive_default_totals_format,
};
use crate::error::{ReportError, ReportResult};
use crate::spec::{
    EnumCellValue, EnumConditionCriteria, EnumConditionValue, EnumSparklineSource,
    SpecCellFormat, SpecConditionalFormat, SpecTableInfo, SpecTableStyleOverrides,
    SpecTableWriteOptions,
};
use crate::style::{derive_color, resolve_layers};
use crate::util::{
    cast_col_num, cast_row_num, derive_cell_ref, derive_cell_value_from_any_value,
    derive_fmt_key, derive_heuristic_num_format, estimate_unicode_string_width,
    estimate_width_len, if_is_totals_exempt, if_is_url, parse_rich_segments,
};

const N_HEIGHT_HEADER_ROW: f64 = 20.0;
const N_WIDTH_SPARKLINE_COL: f64 = 15.0;

impl ReportWriter {
    ////////////////////////////////////////////////////////////////////////////
    // #region Table

    /// Write `df` as a styled table at the cursor.
    ///
    /// Cell formats resolve, per attribute, from: body defaults, `DataFrame`
    /// config, call-site overrides, heuristic number format, dictionary number
    /// format, column alignment, signed column override, then `cell_style_map`.
    /// Returns the placement that later "last table" calls refer to.
    pub fn write_table(
        &mut self,
        df: &DataFrame,
        options: &SpecTableWriteOptions,
    ) -> ReportResult<SpecTableInfo> {
        let n_col_start = options.start_col.unwrap_or(self.n_col_start);
        let info = self.begin_table(df, n_col_start);

        if info.height_data() == 0 || info.columns.is_empty() {
            self.write_empty_placeholder(info.row_header, n_col_start)?;
            self.sheet.cursor.advance(N_HEIGHT_EMPTY_PLACEHOLDER);
            return Ok(info);
        }

        let l_values_by_col = derive_values_by_col(df)?;
        validate_table_text_limits(&info, &l_values_by_col)?;
        let l_dtypes: Vec<DataType> = df.dtypes();

        let spec_body = resolve_layers([
            &derive_default_body_format(),
            &self.config.derive_table_body_format(),
            &derive_body_override(&options.style_overrides),
        ]);
        self.write_table_header(&info, &options.style_overrides)?;

        let l_specs_override =
            derive_column_overrides(&options.column_style_overrides, info.columns.len())?;
        let spec_link = SpecCellFormat {
            font_color: Some("#0000FF".to_string()),
            underline: Some(true),
            ..Default::default()
        };
        let spec_empty = SpecCellFormat::default();

        for (n_idx_col, ((c_name, n_col), l_values)) in
            info.columns.iter().zip(&l_values_by_col).enumerate()
        {
            let spec_heuristic = SpecCellFormat {
                num_format: derive_heuristic_num_format(
                    derive_fmt_key(c_name, &l_dtypes[n_idx_col]),
                    &self.theme,
                ),
                ..Default::default()
            };
            let spec_dictionary = SpecCellFormat {
                num_format: self.dictionary.num_format(c_name).map(ToString::to_string),
                ..Default::default()
            };
            let spec_align = SpecCellFormat {
                align: options.column_alignments.get(c_name).cloned(),
                ..Default::default()
            };
            let spec_col = resolve_layers([
                &spec_body,
                &spec_heuristic,
                &spec_dictionary,
                &spec_align,
                l_specs_override[n_idx_col].as_ref().unwrap_or(&spec_empty),
            ]);
            let format_col = self.resolver.format_for(&spec_col);

            for (n_idx_row, value) in l_values.iter().enumerate() {
                let n_row = info.row_data_first + n_idx_row;
                let spec_cell = options.cell_style_map.get(&(n_idx_row, c_name.clone()));

                if let EnumCellValue::String(c_text) = value
                    && if_is_url(c_text)
                {
                    let format_link = self.resolver.resolve([
                        &spec_col,
                        &spec_link,
                        spec_cell.unwrap_or(&spec_empty),
                    ]);
                    self.sheet.worksheet.write_url_with_format(
                        cast_row_num(n_row)?,
                        cast_col_num(*n_col)?,
                        Url::new(c_text.as_str()),
                        &format_link,
                    )?;
                    continue;
                }

                let format = match spec_cell {
                    Some(spec_cell) => self.resolver.resolve([&spec_col, spec_cell]),
                    None => format_col.clone(),
                };
                write_cell_with_format(&mut self.sheet.worksheet, n_row, *n_col, value, &format)?;
            }

            let n_width_header = estimate_unicode_string_width(self.dictionary.display_name(c_name));
            let n_width_data = l_values.iter().map(estimate_width_len).max().unwrap_or(0);
            let n_width = usize::min(
                usize::max(n_width_header, n_width_data) + N_WIDTH_COL_PADDING,
                N_WIDTH_COL_MAX,
            );
            self.sheet
                .worksheet
                .set_column_width(cast_col_num(*n_col)?, n_width as f64)?;
        }

        if options.auto_filter {
            self.sheet.worksheet.autofilter(
                cast_row_num(info.row_header)?,
                cast_col_num(n_col_start)?,
                cast_row_num(info.row_data_last)?,
                cast_col_num(info.col_end())?,
            )?;
        }

        if options.add_totals {
            self.write_totals_row(&info, &l_dtypes, &l_values_by_col, &options.style_overrides)?;
        }

        self.sheet
            .cursor
            .advance(info.height_data() + 2 + usize::from(options.add_totals));
        log::debug!(
            "table on {:?}: rows {}..={} cols {}..={}",
            info.sheet_name,
            info.row_header,
            info.row_data_last,
            info.col_start,
            info.col_end()
        );
        Ok(info)
    }

    /// Write `df` like [`Self::write_table`], rendering rich-text cells.
    ///
    /// String cells holding a segment list (`[{"text": ..., "bold": true}, ...]`)
    /// become multi-format runs; anything else is written as plain text.
    pub fn write_rich_table(
        &mut self,
        df: &DataFrame,
        start_col: Option<usize>,
    ) -> ReportResult<SpecTableInfo> {
        let n_col_start = start_col.unwrap_or(self.n_col_start);
        let info = self.begin_table(df, n_col_start);
        if info.height_data() == 0 || info.columns.is_empty() {
            self.write_empty_placeholder(info.row_header, n_col_start)?;
            self.sheet.cursor.advance(N_HEIGHT_EMPTY_PLACEHOLDER);
            return Ok(info);
        }

        let l_values_by_col = derive_values_by_col(df)?;
        validate_table_text_limits(&info, &l_values_by_col)?;
        self.write_table_header(&info, &SpecTableStyleOverrides::default())?;

        let spec_body = resolve_layers([
            &derive_default_body_format(),
            &self.config.derive_table_body_format(),
        ]);
        let format_body = self.resolver.format_for(&spec_body);

        for ((c_name, n_col), l_values) in info.columns.iter().zip(&l_values_by_col) {
            let mut n_width_data = 0usize;
            for (n_idx_row, value) in l_values.iter().enumerate() {
                let n_row = info.row_data_first + n_idx_row;
                let l_segments = match value {
                    EnumCellValue::String(c_text) => parse_rich_segments(c_text),
                    _ => None,
                };
                let Some(l_segments) = l_segments else {
                    n_width_data = n_width_data.max(estimate_width_len(value));
                    write_cell_with_format(&mut self.sheet.worksheet, n_row, *n_col, value, &format_body)?;
                    continue;
                };

                let l_segments: Vec<_> = l_segments
                    .into_iter()
                    .filter(|segment| !segment.text.is_empty())
                    .collect();
                let c_plain: String = l_segments.iter().map(|s| s.text.as_str()).collect();
                n_width_data = n_width_data.max(estimate_unicode_string_width(&c_plain));

                let l_formats: Vec<Format> = l_segments
                    .iter()
                    .map(|segment| {
                        self.resolver.resolve([
                            &spec_body,
                            &SpecCellFormat {
                                bold: Some(segment.bold),
                                italic: Some(segment.italic),
                                font_color: segment.color.clone(),
                                ..Default::default()
                            },
                        ])
                    })
                    .collect();

                if l_segments.len() < 2 {
                    let format = l_formats.first().unwrap_or(&format_body);
                    self.sheet.worksheet.write_string_with_format(
                        cast_row_num(n_row)?,
                        cast_col_num(*n_col)?,
                        &c_plain,
                        format,
                    )?;
                    continue;
                }
                let l_runs: Vec<(&Format, &str)> = l_formats
                    .iter()
                    .zip(&l_segments)
                    .map(|(format, segment)| (format, segment.text.as_str()))
                    .collect();
                self.sheet.worksheet.write_rich_string_with_format(
                    cast_row_num(n_row)?,
                    cast_col_num(*n_col)?,
                    &l_runs,
                    &format_body,
                )?;
            }

            let n_width_header = estimate_unicode_string_width(self.dictionary.display_name(c_name));
            let n_width = usize::min(
                usize::max(n_width_header, n_width_data) + N_WIDTH_COL_PADDING,
                N_WIDTH_COL_MAX,
            );
            self.sheet
                .worksheet
                .set_column_width(cast_col_num(*n_col)?, n_width as f64)?;
        }

        self.sheet.cursor.advance(info.height_data() + 2);
        Ok(info)
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region ConditionalFormat

    /// Highlight cells of one column of the last table by a value comparison.
    pub fn add_conditional_format(&mut self, rule: &SpecConditionalFormat) -> ReportResult<()> {
        let info = self.require_last_table()?;
        let n_col = info.column_index(&rule.column).ok_or_else(|| {
            ReportError::Reference(format!(
                "column {:?} is not part of the last table on sheet {:?}",
                rule.column, info.sheet_name
            ))
        })?;
        if info.height_data() == 0 {
            return Err(ReportError::Reference(format!(
                "last table on sheet {:?} has no data rows",
                info.sheet_name
            )));
        }

        let format = self.resolver.format_for(&SpecCellFormat {
            bg_color: Some(rule.bg_color.clone()),
            font_color: Some(rule.font_color.clone()),
            ..Default::default()
        });
        let conditional_format = ConditionalFormatCell::new()
            .set_rule(derive_conditional_rule(rule)?)
            .set_format(format);
        self.sheet.worksheet.add_conditional_format(
            cast_row_num(info.row_data_first)?,
            cast_col_num(n_col)?,
            cast_row_num(info.row_data_last)?,
            cast_col_num(n_col)?,
            &conditional_format,
        )?;
        self.sheet.cursor.place_at(info.row_data_last);
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Sparklines

    /// One line sparkline per data row of the last table, right of its last column.
    ///
    /// `Values` are parked in a helper block far to the right of the table;
    /// `Columns` must name adjacent table columns.
    pub fn add_sparklines(
        &mut self,
        source: &EnumSparklineSource,
        title: &str,
    ) -> ReportResult<()> {
        let info = self.require_last_table_rows()?;
        let n_col_spark = info.col_end() + 1;

        let format_header = self
            .resolver
            .format_for(&derive_default_header_format(&self.theme.primary_color));
        self.sheet.worksheet.write_string_with_format(
            cast_row_num(info.row_header)?,
            cast_col_num(n_col_spark)?,
            title,
            &format_header,
        )?;
        self.sheet
            .worksheet
            .set_column_width(cast_col_num(n_col_spark)?, N_WIDTH_SPARKLINE_COL)?;

        let l_ranges: Vec<(usize, usize, usize)> = match source {
            EnumSparklineSource::Values(l_rows) => {
                if l_rows.len() != info.height_data() {
                    self.report.warn(format!(
                        "sparkline rows ({}) do not match table rows ({}) on sheet {:?}",
                        l_rows.len(),
                        info.height_data(),
                        info.sheet_name
                    ));
                }
                let n_col_helper = usize::max(N_COL_SPARKLINE_DATA, n_col_spark + 2);
                let mut l_ranges = Vec::new();
                for (n_idx_row, l_points) in l_rows.iter().take(info.height_data()).enumerate() {
                    if l_points.is_empty() {
                        continue;
                    }
                    let n_row = info.row_data_first + n_idx_row;
                    for (n_idx_point, n_point) in l_points.iter().enumerate() {
                        self.sheet.worksheet.write_number(
                            cast_row_num(n_row)?,
                            cast_col_num(n_col_helper + n_idx_point)?,
                            *n_point,
                        )?;
                    }
                    l_ranges.push((n_row, n_col_helper, n_col_helper + l_points.len() - 1));
                }
                l_ranges
            }
            EnumSparklineSource::Columns(l_cols) => {
                let (n_col_first, n_col_last) = derive_contiguous_span(&info, l_cols)?;
                (info.row_data_first..=info.row_data_last)
                    .map(|n_row| (n_row, n_col_first, n_col_last))
                    .collect()
            }
        };

        let color = derive_color(&self.theme.primary_color);
        for (n_row, n_col_first, n_col_last) in l_ranges {
            let mut sparkline = Sparkline::new()
                .set_range((
                    info.sheet_name.as_str(),
                    cast_row_num(n_row)?,
                    cast_col_num(n_col_first)?,
                    cast_row_num(n_row)?,
                    cast_col_num(n_col_last)?,
                ))
                .set_type(SparklineType::Line)
                .show_markers(true);
            if let Some(color) = color {
                sparkline = sparkline.set_sparkline_color(color);
            }
            self.sheet.worksheet.add_sparkline(
                cast_row_num(n_row)?,
                cast_col_num(n_col_spark)?,
                &sparkline,
            )?;
        }
        self.sheet.cursor.place_at(info.row_data_last);
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region TableInternals

    fn begin_table(&mut self, df: &DataFrame, n_col_start: usize) -> SpecTableInfo {
        let n_row_header = self.sheet.cursor.row();
        let info = SpecTableInfo {
            sheet_name: self.sheet.name.clone(),
            row_header: n_row_header,
            row_data_first: n_row_header + 1,
            row_data_last: n_row_header + df.height(),
            col_start: n_col_start,
            columns: df
                .get_column_names_str()
                .into_iter()
                .enumerate()
                .map(|(n_idx, c_name)| (c_name.to_string(), n_col_start + n_idx))
                .collect(),
        };
        self.sheet.last_table = Some(info.clone());
        self.sheet.if_has_content = true;
        info
    }

    fn write_empty_placeholder(&mut self, n_row: usize, n_col: usize) -> ReportResult<()> {
        let format = self.resolver.format_for(&SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(10),
            italic: Some(true),
            font_color: Some("#808080".to_string()),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            ..Default::default()
        });
        self.sheet.worksheet.merge_range(
            cast_row_num(n_row)?,
            cast_col_num(n_col)?,
            cast_row_num(n_row)?,
            cast_col_num(n_col + N_WIDTH_EMPTY_PLACEHOLDER - 1)?,
            C_TABLE_EMPTY_TEXT,
            &format,
        )?;
        Ok(())
    }

    fn write_table_header(
        &mut self,
        info: &SpecTableInfo,
        overrides: &SpecTableStyleOverrides,
    ) -> ReportResult<()> {
        let format_header = self.resolver.resolve([
            &derive_default_header_format(&self.theme.primary_color),
            &self.config.derive_table_header_format(),
            &derive_header_override(overrides),
        ]);
        self.sheet
            .worksheet
            .set_row_height(cast_row_num(info.row_header)?, N_HEIGHT_HEADER_ROW)?;
        for (c_name, n_col) in &info.columns {
            self.sheet.worksheet.write_string_with_format(
                cast_row_num(info.row_header)?,
                cast_col_num(*n_col)?,
                self.dictionary.display_name(c_name),
                &format_header,
            )?;
        }
        Ok(())
    }

    fn write_totals_row(
        &mut self,
        info: &SpecTableInfo,
        l_dtypes: &[DataType],
        l_values_by_col: &[Vec<EnumCellValue>],
        overrides: &SpecTableStyleOverrides,
    ) -> ReportResult<()> {
        let n_row_totals = info.row_data_last + 1;
        let spec_totals = resolve_layers([
            &derive_default_totals_format(),
            &self.config.derive_table_body_format(),
            &derive_body_override(overrides),
        ]);
        let format_totals = self.resolver.format_for(&spec_totals);

        for (n_idx_col, (c_name, n_col)) in info.columns.iter().enumerate() {
            let n_row = cast_row_num(n_row_totals)?;
            let n_col_xlsx = cast_col_num(*n_col)?;
            if n_idx_col == 0 {
                self.sheet
                    .worksheet
                    .write_string_with_format(n_row, n_col_xlsx, "Total", &format_totals)?;
                continue;
            }
            let dtype = &l_dtypes[n_idx_col];
            if !dtype.is_numeric() || if_is_totals_exempt(c_name) {
                self.sheet
                    .worksheet
                    .write_blank(n_row, n_col_xlsx, &format_totals)?;
                continue;
            }

            let num_format = match self.dictionary.num_format(c_name) {
                Some(c_format) => c_format.to_string(),
                None => match derive_fmt_key(c_name, dtype) {
                    key @ (EnumFmtKey::Currency | EnumFmtKey::Decimal | EnumFmtKey::Integer) => {
                        derive_heuristic_num_format(key, &self.theme)
                            .unwrap_or_else(|| C_NUM_FORMAT_INTEGER.to_string())
                    }
                    _ => C_NUM_FORMAT_INTEGER.to_string(),
                },
            };
            let format = self.resolver.resolve([
                &spec_totals,
                &SpecCellFormat {
                    num_format: Some(num_format),
                    ..Default::default()
                },
            ]);
            let n_sum: f64 = l_values_by_col[n_idx_col]
                .iter()
                .filter_map(EnumCellValue::as_f64)
                .sum();
            let formula = Formula::new(format!(
                "=SUM({}:{})",
                derive_cell_ref(info.row_data_first, *n_col),
                derive_cell_ref(info.row_data_last, *n_col)
            ))
            .set_result(EnumCellValue::Number(n_sum).to_display_text());
            self.sheet
                .worksheet
                .write_formula_with_format(n_row, n_col_xlsx, formula, &format)?;
        }
        Ok(())
    }

    // #endregion
}

////////////////////////////////////////////////////////////////////////////////
// #region Helpers

fn derive_values_by_col(df: &DataFrame) -> ReportResult<Vec<Vec<EnumCellValue>>> {
    let mut l_values_by_col = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let mut l_values = Vec::with_capacity(df.height());
        for n_idx_row in 0..df.height() {
            l_values.push(derive_cell_value_from_any_value(col.get(n_idx_row)?));
        }
        l_values_by_col.push(l_values);
    }
    Ok(l_values_by_col)
}

/// Fail before writing anything when a text cell cannot be stored.
fn validate_table_text_limits(
    info: &SpecTableInfo,
    l_values_by_col: &[Vec<EnumCellValue>],
) -> ReportResult<()> {
    for ((c_name, _), l_values) in info.columns.iter().zip(l_values_by_col) {
        for (n_idx_row, value) in l_values.iter().enumerate() {
            if let EnumCellValue::String(c_text) = value {
                validate_text_len(c_text, c_name, n_idx_row)?;
            }
        }
    }
    Ok(())
}

fn derive_header_override(overrides: &SpecTableStyleOverrides) -> SpecCellFormat {
    SpecCellFormat {
        bg_color: overrides.header_bg.clone(),
        font_color: overrides.header_font.clone(),
        border_color: overrides.border_color.clone(),
        font_size: overrides.font_size,
        ..Default::default()
    }
}

fn derive_body_override(overrides: &SpecTableStyleOverrides) -> SpecCellFormat {
    SpecCellFormat {
        border_color: overrides.border_color.clone(),
        font_size: overrides.font_size,
        ..Default::default()
    }
}

/// Map signed column positions onto table columns; negatives count from the end.
fn derive_column_overrides(
    dict_overrides: &BTreeMap<i64, SpecCellFormat>,
    n_width: usize,
) -> ReportResult<Vec<Option<SpecCellFormat>>> {
    let mut l_specs: Vec<Option<SpecCellFormat>> = vec![None; n_width];
    for (n_pos, spec) in dict_overrides {
        let n_idx = if *n_pos < 0 {
            n_width as i64 + *n_pos
        } else {
            *n_pos
        };
        if n_idx < 0 || n_idx >= n_width as i64 {
            return Err(ReportError::Validation(format!(
                "column override position {n_pos} is outside a table of {n_width} columns"
            )));
        }
        let slot = &mut l_specs[n_idx as usize];
        *slot = Some(match slot.take() {
            Some(spec_prev) => spec_prev.merge(spec),
            None => spec.clone(),
        });
    }
    Ok(l_specs)
}

fn derive_condition_value(value: &EnumConditionValue) -> ConditionalFormatValue {
    match value {
        EnumConditionValue::Number(n_val) => ConditionalFormatValue::from(*n_val),
        EnumConditionValue::Text(c_val) => {
            let c_quoted = format!("\"{}\"", c_val.replace('"', "\"\""));
            ConditionalFormatValue::from(c_quoted.as_str())
        }
    }
}

fn derive_conditional_rule(
    rule: &SpecConditionalFormat,
) -> ReportResult<ConditionalFormatCellRule<ConditionalFormatValue>> {
    let value = derive_condition_value(&rule.value);
    let rule_xlsx = match rule.criteria {
        EnumConditionCriteria::GreaterThan => ConditionalFormatCellRule::GreaterThan(value),
        EnumConditionCriteria::GreaterThanOrEqual => {
            ConditionalFormatCellRule::GreaterThanOrEqualTo(value)
        }
        EnumConditionCriteria::LessThan => ConditionalFormatCellRule::LessThan(value),
        EnumConditionCriteria::LessThanOrEqual => {
            ConditionalFormatCellRule::LessThanOrEqualTo(value)
        }
        EnumConditionCriteria::EqualTo => ConditionalFormatCellRule::EqualTo(value),
        EnumConditionCriteria::NotEqualTo => ConditionalFormatCellRule::NotEqualTo(value),
        EnumConditionCriteria::Between => {
            let Some(value_upper) = &rule.value_upper else {
                return Err(ReportError::Validation(format!(
                    "`between` rule on column {:?} needs an upper value",
                    rule.column
                )));
            };
            ConditionalFormatCellRule::Between(value, derive_condition_value(value_upper))
        }
    };
    Ok(rule_xlsx)
}

/// Resolve sparkline source columns to one adjacent span.
fn derive_contiguous_span(info: &SpecTableInfo, l_cols: &[String]) -> ReportResult<(usize, usize)> {
    let mut l_idx = Vec::with_capacity(l_cols.len());
    for c_name in l_cols {
        let n_idx = info.column_index(c_name).ok_or_else(|| {
            ReportError::Reference(format!(
                "sparkline column {c_name:?} is not part of the last table on sheet {:?}",
                info.sheet_name
            ))
        })?;
        l_idx.push(n_idx);
    }
    l_idx.sort_unstable();
    l_idx.dedup();
    let (Some(&n_first), Some(&n_last)) = (l_idx.first(), l_idx.last()) else {
        return Err(ReportError::Validation(
            "sparklines need at least one source column".to_string(),
        ));
    };
    if n_last - n_first + 1 != l_idx.len() {
        return Err(ReportError::Validation(format!(
            "sparkline columns {l_cols:?} are not adjacent"
        )));
    }
    Ok((n_first, n_last))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::df;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::conf::N_LEN_EXCEL_CELL_TEXT_MAX;
    use crate::config::SpecReportConfig;
    use crate::dictionary::ColumnDictionary;
    use crate::spec::StyleMap;

    fn derive_writer() -> ReportWriter {
        ReportWriter::new(SpecReportConfig::default()).expect("writer")
    }

    fn derive_sales() -> DataFrame {
        df!(
            "region" => ["North", "South", "East", "West"],
            "revenue" => [100.0, 250.5, 80.0, 120.0],
            "units" => [10i64, 20, 8, 12],
            "q1" => [1.0, 2.0, 3.0, 4.0],
            "q2" => [2.0, 3.0, 4.0, 5.0],
        )
        .expect("df")
    }

    #[test]
    fn table_records_placement_and_advances_cursor() {
        let mut writer = derive_writer();
        let info = writer
            .write_table(&derive_sales(), &SpecTableWriteOptions::default())
            .expect("table");
        assert_eq!(info.sheet_name, "Summary");
        assert_eq!(info.row_header, 1);
        assert_eq!((info.row_data_first, info.row_data_last), (2, 5));
        assert_eq!(info.column_index("revenue"), Some(2));
        assert_eq!(info.col_end(), 5);
        assert_eq!(writer.cursor_row(), 1 + 4 + 2);
        assert_eq!(writer.last_table(), Some(&info));
    }

    #[test]
    fn totals_row_adds_one_more_row() {
        let mut writer = derive_writer();
        writer
            .write_table(
                &derive_sales(),
                &SpecTableWriteOptions {
                    add_totals: true,
                    auto_filter: true,
                    ..Default::default()
                },
            )
            .expect("table");
        assert_eq!(writer.cursor_row(), 1 + 4 + 3);
    }

    #[test]
    fn empty_table_writes_placeholder_and_blocks_references() {
        let mut writer = derive_writer();
        let df = derive_sales().head(Some(0));
        let info = writer
            .write_table(&df, &SpecTableWriteOptions::default())
            .expect("table");
        assert_eq!(info.height_data(), 0);
        assert_eq!(writer.cursor_row(), 1 + N_HEIGHT_EMPTY_PLACEHOLDER);

        let rule = SpecConditionalFormat {
            column: "revenue".to_string(),
            criteria: EnumConditionCriteria::GreaterThan,
            value: EnumConditionValue::Number(100.0),
            value_upper: None,
            bg_color: "#FF9999".to_string(),
            font_color: "#9C0006".to_string(),
        };
        assert!(matches!(
            writer.add_conditional_format(&rule),
            Err(ReportError::Reference(_))
        ));
    }

    #[test]
    fn oversized_text_fails_before_anything_is_written() {
        let mut writer = derive_writer();
        let c_long = "x".repeat(N_LEN_EXCEL_CELL_TEXT_MAX + 1);
        let df = df!("note" => ["ok", c_long.as_str()]).expect("df");
        let err = writer
            .write_table(&df, &SpecTableWriteOptions::default())
            .expect_err("limit");
        match err {
            ReportError::CellLimit { column, row, length, .. } => {
                assert_eq!(column, "note");
                assert_eq!(row, 1);
                assert_eq!(length, N_LEN_EXCEL_CELL_TEXT_MAX + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(writer.cursor_row(), 1);
    }

    #[test]
    fn cell_styles_and_overrides_are_accepted() {
        let mut writer = derive_writer();
        writer.set_column_dictionary(
            ColumnDictionary::new().with_entry("revenue", "Revenue (£)", Some("£#,##0")),
        );
        let mut cell_style_map = StyleMap::new();
        cell_style_map.insert(
            (1, "revenue".to_string()),
            SpecCellFormat {
                bg_color: Some("#FFC7CE".to_string()),
                ..Default::default()
            },
        );
        let mut column_style_overrides = BTreeMap::new();
        column_style_overrides.insert(
            -1,
            SpecCellFormat {
                bold: Some(true),
                ..Default::default()
            },
        );
        let options = SpecTableWriteOptions {
            column_style_overrides,
            cell_style_map,
            ..Default::default()
        };
        writer.write_table(&derive_sales(), &options).expect("table");

        let mut options_bad = options.clone();
        options_bad.column_style_overrides.insert(9, SpecCellFormat::default());
        assert!(matches!(
            writer.write_table(&derive_sales(), &options_bad),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn negative_column_overrides_merge_with_positive_ones() {
        let bold = SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        };
        let red = SpecCellFormat {
            font_color: Some("#FF0000".to_string()),
            ..Default::default()
        };
        let dict_overrides = BTreeMap::from([(-1, bold), (2, red)]);
        let l_specs = derive_column_overrides(&dict_overrides, 3).expect("overrides");
        assert_eq!(l_specs[0], None);
        let spec_last = l_specs[2].clone().expect("last column");
        assert_eq!(spec_last.bold, Some(true));
        assert_eq!(spec_last.font_color.as_deref(), Some("#FF0000"));
    }

    #[test]
    fn conditional_format_needs_known_column() {
        let mut writer = derive_writer();
        writer
            .write_table(&derive_sales(), &SpecTableWriteOptions::default())
            .expect("table");
        let mut rule = SpecConditionalFormat {
            column: "revenue".to_string(),
            criteria: EnumConditionCriteria::Between,
            value: EnumConditionValue::Number(50.0),
            value_upper: Some(EnumConditionValue::Number(150.0)),
            bg_color: "#FF9999".to_string(),
            font_color: "#9C0006".to_string(),
        };
        writer.add_conditional_format(&rule).expect("cf");

        rule.value_upper = None;
        assert!(matches!(
            writer.add_conditional_format(&rule),
            Err(ReportError::Validation(_))
        ));
        rule.column = "missing".to_string();
        assert!(matches!(
            writer.add_conditional_format(&rule),
            Err(ReportError::Reference(_))
        ));
    }

    #[test]
    fn sparklines_from_columns_require_adjacency() {
        let mut writer = derive_writer();
        writer
            .write_table(&derive_sales(), &SpecTableWriteOptions::default())
            .expect("table");
        let row_before = writer.cursor_row();
        writer
            .add_sparklines(
                &EnumSparklineSource::Columns(vec!["q1".to_string(), "q2".to_string()]),
                "Trend",
            )
            .expect("sparklines");
        assert_eq!(writer.cursor_row(), row_before);

        assert!(matches!(
            writer.add_sparklines(
                &EnumSparklineSource::Columns(vec!["revenue".to_string(), "q2".to_string()]),
                "Trend",
            ),
            Err(ReportError::Validation(_))
        ));
        assert!(matches!(
            writer.add_sparklines(
                &EnumSparklineSource::Columns(vec!["nope".to_string()]),
                "Trend",
            ),
            Err(ReportError::Reference(_))
        ));
    }

    #[test]
    fn sparkline_value_mismatch_is_a_warning() {
        let mut writer = derive_writer();
        writer
            .write_table(&derive_sales(), &SpecTableWriteOptions::default())
            .expect("table");
        writer
            .add_sparklines(
                &EnumSparklineSource::Values(vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0]]),
                "Trend",
            )
            .expect("sparklines");
        assert_eq!(writer.report().warnings.len(), 1);
    }

    #[test]
    fn sparklines_without_table_are_reference_errors() {
        let mut writer = derive_writer();
        assert!(matches!(
            writer.add_sparklines(&EnumSparklineSource::Values(vec![vec![1.0]]), "Trend"),
            Err(ReportError::Reference(_))
        ));
    }

    #[test]
    fn rich_table_accepts_segments_and_plain_text() {
        let mut writer = derive_writer();
        let df = df!(
            "item" => ["Server", "Backup"],
            "status" => [
                r#"["Status: ", {"text": "CRITICAL", "bold": true, "colour": "red"}]"#,
                "All good",
            ],
        )
        .expect("df");
        let info = writer.write_rich_table(&df, None).expect("rich table");
        assert_eq!(info.height_data(), 2);
        assert_eq!(writer.cursor_row(), 1 + 2 + 2);
    }
}
