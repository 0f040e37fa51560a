//! Reference sections: data dictionary, definition list and table of contents.

use polars::prelude::{Column, DataFrame};
use rust_xlsxwriter::{Url, Worksheet};

use super::{ReportWriter, validate_text_len};
use crate::conf::{
    C_FONT_NAME_DEFAULT, C_SHEET_TOC, derive_default_body_format, derive_default_header_format,
    derive_default_link_format,
};
use crate::config::C_COMPONENT_DATA_DICT;
use crate::dictionary::{C_COL_DICT_DESCRIPTION, C_COL_DICT_DISPLAY, C_COL_DICT_KEY};
use crate::error::{ReportError, ReportResult};
use crate::spec::{EnumCellValue, SpecCellFormat, SpecDefinitionListOptions};
use crate::util::{cast_col_num, cast_row_num, derive_cell_value_from_any_value, derive_sheet_ref};

const L_DICT_HEADERS: [&str; 3] = ["Technical Name", "Business Name", "Definition"];
const L_DICT_WIDTHS: [f64; 4] = [25.0, 25.0, 40.0, 40.0];
const N_DEFINITION_MERGE_COLS: usize = 4;
const N_CHARS_PER_DEFINITION_LINE: usize = 80;

impl ReportWriter {
    ////////////////////////////////////////////////////////////////////////////
    // #region DataDictionary

    /// Data dictionary appendix from a `(technical, business, definition)` dataset.
    ///
    /// Columns are picked by name (`column_name`, `display_name`, `description`)
    /// and otherwise by position.
    pub fn add_data_dictionary(
        &mut self,
        df: &DataFrame,
        start_col: Option<usize>,
    ) -> ReportResult<()> {
        let l_columns = df.get_columns();
        if l_columns.len() < 3 {
            return Err(ReportError::Validation(format!(
                "data dictionary needs 3 columns, got {}",
                l_columns.len()
            )));
        }
        let col_key = df.column(C_COL_DICT_KEY).unwrap_or(&l_columns[0]);
        let col_display = df.column(C_COL_DICT_DISPLAY).unwrap_or(&l_columns[1]);
        let col_description = df.column(C_COL_DICT_DESCRIPTION).unwrap_or(&l_columns[2]);

        let mut l_rows = Vec::with_capacity(df.height());
        for n_idx_row in 0..df.height() {
            l_rows.push((
                derive_text(col_key, n_idx_row)?,
                derive_text(col_display, n_idx_row)?,
                derive_text(col_description, n_idx_row)?,
            ));
        }
        self.write_dictionary_rows(&l_rows, start_col)
    }

    /// Data dictionary appendix from the loaded column dictionary.
    pub fn add_data_dictionary_from_columns(&mut self, start_col: Option<usize>) -> ReportResult<()> {
        let l_rows: Vec<(String, String, String)> = self
            .dictionary
            .entries()
            .map(|(c_key, entry)| {
                (
                    c_key.to_string(),
                    entry.display_name.clone(),
                    entry.description.clone().unwrap_or_default(),
                )
            })
            .collect();
        self.write_dictionary_rows(&l_rows, start_col)
    }

    fn write_dictionary_rows(
        &mut self,
        l_rows: &[(String, String, String)],
        start_col: Option<usize>,
    ) -> ReportResult<()> {
        for (n_idx_row, (c_key, c_display, c_description)) in l_rows.iter().enumerate() {
            validate_text_len(c_key, L_DICT_HEADERS[0], n_idx_row)?;
            validate_text_len(c_display, L_DICT_HEADERS[1], n_idx_row)?;
            validate_text_len(c_description, L_DICT_HEADERS[2], n_idx_row)?;
        }
        let n_col = start_col.unwrap_or(self.n_col_start);
        let n_row_header = self.sheet.cursor.row();

        let spec_header = derive_default_header_format(&self.theme.primary_color).with_(
            SpecCellFormat {
                bg_color: self
                    .config
                    .get_str_any(C_COMPONENT_DATA_DICT, &["header_bg_colour", "header_bg_color"]),
                ..Default::default()
            },
        );
        let format_header = self.resolver.format_for(&spec_header);
        let spec_body = derive_default_body_format();
        let format_body = self.resolver.format_for(&spec_body);
        let format_definition = self.resolver.resolve([
            &spec_body,
            &SpecCellFormat {
                font_size: Some(9),
                text_wrap: Some(true),
                valign: Some("top".to_string()),
                ..Default::default()
            },
        ]);

        let worksheet = &mut self.sheet.worksheet;
        for (n_offset, n_width) in L_DICT_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(cast_col_num(n_col + n_offset)?, *n_width)?;
        }
        let n_row = cast_row_num(n_row_header)?;
        worksheet.write_string_with_format(n_row, cast_col_num(n_col)?, L_DICT_HEADERS[0], &format_header)?;
        worksheet.write_string_with_format(n_row, cast_col_num(n_col + 1)?, L_DICT_HEADERS[1], &format_header)?;
        worksheet.merge_range(
            n_row,
            cast_col_num(n_col + 2)?,
            n_row,
            cast_col_num(n_col + 3)?,
            L_DICT_HEADERS[2],
            &format_header,
        )?;

        for (n_idx, (c_key, c_display, c_description)) in l_rows.iter().enumerate() {
            let n_row = cast_row_num(n_row_header + 1 + n_idx)?;
            worksheet.write_string_with_format(n_row, cast_col_num(n_col)?, c_key, &format_body)?;
            worksheet.write_string_with_format(n_row, cast_col_num(n_col + 1)?, c_display, &format_body)?;
            worksheet.merge_range(
                n_row,
                cast_col_num(n_col + 2)?,
                n_row,
                cast_col_num(n_col + 3)?,
                c_description,
                &format_definition,
            )?;
        }
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(l_rows.len() + 2);
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region DefinitionList

    /// Glossary-style list: bold term, definition merged over four columns.
    pub fn add_definition_list(
        &mut self,
        df: &DataFrame,
        options: &SpecDefinitionListOptions,
    ) -> ReportResult<()> {
        let l_columns = df.get_columns();
        if l_columns.len() < 2 {
            return Err(ReportError::Validation(format!(
                "definition list needs 2 columns, got {}",
                l_columns.len()
            )));
        }
        let mut l_rows = Vec::with_capacity(df.height());
        for n_idx_row in 0..df.height() {
            l_rows.push((
                derive_text(&l_columns[0], n_idx_row)?,
                derive_text(&l_columns[1], n_idx_row)?,
            ));
        }
        self.write_definition_rows(&l_rows, options)
    }

    /// Definition list built from dictionary display names and descriptions.
    pub fn add_definition_list_from_columns(
        &mut self,
        options: &SpecDefinitionListOptions,
    ) -> ReportResult<()> {
        let l_rows: Vec<(String, String)> = self
            .dictionary
            .entries()
            .filter_map(|(_, entry)| {
                let c_description = entry.description.clone()?;
                Some((entry.display_name.clone(), c_description))
            })
            .collect();
        self.write_definition_rows(&l_rows, options)
    }

    fn write_definition_rows(
        &mut self,
        l_rows: &[(String, String)],
        options: &SpecDefinitionListOptions,
    ) -> ReportResult<()> {
        if l_rows.is_empty() {
            log::debug!("definition list skipped: no rows");
            return Ok(());
        }
        for (n_idx_row, (c_term, c_definition)) in l_rows.iter().enumerate() {
            validate_text_len(c_term, "term", n_idx_row)?;
            validate_text_len(c_definition, "definition", n_idx_row)?;
        }
        let n_col = options.start_col.unwrap_or(self.n_col_start);
        let spec_term = SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(10),
            bold: Some(true),
            valign: Some("top".to_string()),
            ..Default::default()
        };
        let format_term = self.resolver.format_for(&spec_term);
        let format_definition = self.resolver.format_for(&SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(10),
            valign: Some("top".to_string()),
            text_wrap: Some(options.text_wrap),
            ..Default::default()
        });

        let n_row_first = self.sheet.cursor.row();
        let worksheet = &mut self.sheet.worksheet;
        worksheet.set_column_width(cast_col_num(n_col)?, 25.0)?;
        for (n_idx, (c_term, c_definition)) in l_rows.iter().enumerate() {
            let n_row = cast_row_num(n_row_first + n_idx)?;
            worksheet.write_string_with_format(n_row, cast_col_num(n_col)?, c_term, &format_term)?;
            worksheet.merge_range(
                n_row,
                cast_col_num(n_col + 1)?,
                n_row,
                cast_col_num(n_col + N_DEFINITION_MERGE_COLS)?,
                c_definition,
                &format_definition,
            )?;
            if options.auto_height {
                let n_lines = c_definition
                    .chars()
                    .count()
                    .div_ceil(N_CHARS_PER_DEFINITION_LINE)
                    .max(1);
                worksheet.set_row_height(n_row, 15.0 * n_lines as f64)?;
            }
        }
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(l_rows.len() + 1);
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region TableOfContents

    /// Build the leading "Table of Contents" sheet linking every user sheet.
    ///
    /// Runs once; later calls (including the one made by close) are no-ops.
    /// The sheet list is captured at that first call, so sheets created
    /// afterwards are not listed.
    pub fn generate_toc(&mut self) -> ReportResult<()> {
        if self.toc.is_some() {
            log::debug!("table of contents already generated");
            return Ok(());
        }
        let format_title = self.resolver.format_for(&SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(16),
            bold: Some(true),
            font_color: Some(self.theme.primary_color.clone()),
            ..Default::default()
        });
        let format_link = self.resolver.format_for(&derive_default_link_format());
        let format_text = self.resolver.format_for(&SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(11),
            ..Default::default()
        });

        let mut worksheet = Worksheet::new();
        worksheet.set_name(C_SHEET_TOC)?;
        worksheet.set_screen_gridlines(false);
        worksheet.set_column_width(1, 30.0)?;
        worksheet.set_column_width(2, 60.0)?;
        worksheet.set_row_height(1, 30.0)?;
        worksheet.write_string_with_format(1, 1, "Report Contents", &format_title)?;

        let mut n_row = 3usize;
        for sheet in self.sheets() {
            let n_row_xlsx = cast_row_num(n_row)?;
            let url = Url::new(format!("internal:{}!A1", derive_sheet_ref(sheet.name())))
                .set_text(sheet.name());
            worksheet.write_url_with_format(n_row_xlsx, 1, url, &format_link)?;
            if sheet.description().is_empty() {
                worksheet.write_blank(n_row_xlsx, 2, &format_text)?;
            } else {
                worksheet.write_string_with_format(n_row_xlsx, 2, sheet.description(), &format_text)?;
            }
            n_row += 1;
        }
        self.toc = Some(worksheet);
        Ok(())
    }

    // #endregion
}

fn derive_text(col: &Column, n_idx_row: usize) -> ReportResult<String> {
    Ok(match derive_cell_value_from_any_value(col.get(n_idx_row)?) {
        EnumCellValue::None => String::new(),
        value => value.to_display_text(),
    })
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::conf::N_LEN_EXCEL_CELL_TEXT_MAX;
    use crate::config::SpecReportConfig;
    use crate::dictionary::{ColumnDictionary, SpecColumnEntry};

    fn derive_writer() -> ReportWriter {
        ReportWriter::new(SpecReportConfig::default()).expect("writer")
    }

    #[test]
    fn data_dictionary_advances_past_rows() {
        let mut writer = derive_writer();
        let df = df!(
            "column_name" => ["revenue", "units"],
            "display_name" => ["Revenue", "Units Sold"],
            "excel_format" => ["£#,##0", "#,##0"],
            "description" => ["Net revenue", "Units shipped"],
        )
        .expect("df");
        writer.add_data_dictionary(&df, None).expect("dictionary");
        assert_eq!(writer.cursor_row(), 1 + 2 + 2);

        let df_narrow = df!("a" => ["x"], "b" => ["y"]).expect("df");
        assert!(matches!(
            writer.add_data_dictionary(&df_narrow, None),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn dictionary_backed_appendices() {
        let mut writer = derive_writer();
        let mut dictionary = ColumnDictionary::new();
        dictionary.insert(
            "revenue",
            SpecColumnEntry {
                display_name: "Revenue".to_string(),
                num_format: None,
                description: Some("Net revenue after refunds".to_string()),
            },
        );
        dictionary.insert(
            "region",
            SpecColumnEntry {
                display_name: "Region".to_string(),
                ..Default::default()
            },
        );
        writer.set_column_dictionary(dictionary);

        writer.add_data_dictionary_from_columns(None).expect("dictionary");
        assert_eq!(writer.cursor_row(), 1 + 2 + 2);
        writer
            .add_definition_list_from_columns(&SpecDefinitionListOptions::default())
            .expect("definitions");
        assert_eq!(writer.cursor_row(), 5 + 1 + 1);
    }

    #[test]
    fn definition_list_wraps_and_grows() {
        let mut writer = derive_writer();
        let df = df!(
            "term" => ["ARR", "Churn"],
            "definition" => ["Annual recurring revenue".to_string(), "x".repeat(200)],
        )
        .expect("df");
        writer
            .add_definition_list(
                &df,
                &SpecDefinitionListOptions {
                    text_wrap: true,
                    auto_height: true,
                    ..Default::default()
                },
            )
            .expect("definitions");
        assert_eq!(writer.cursor_row(), 1 + 2 + 1);
    }

    #[test]
    fn oversized_descriptions_fail_before_writing() {
        let mut writer = derive_writer();
        let c_long = "d".repeat(N_LEN_EXCEL_CELL_TEXT_MAX + 1);
        let df = df!(
            "column_name" => ["revenue", "units"],
            "display_name" => ["Revenue", "Units"],
            "description" => ["Net revenue", c_long.as_str()],
        )
        .expect("df");
        match writer.add_data_dictionary(&df, None) {
            Err(ReportError::CellLimit { column, row, length, .. }) => {
                assert_eq!(column, "Definition");
                assert_eq!(row, 1);
                assert_eq!(length, N_LEN_EXCEL_CELL_TEXT_MAX + 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(writer.cursor_row(), 1);
        assert!(!writer.active_sheet().if_has_content);

        let df_terms = df!(
            "term" => ["ARR"],
            "definition" => [c_long.as_str()],
        )
        .expect("df");
        assert!(matches!(
            writer.add_definition_list(&df_terms, &SpecDefinitionListOptions::default()),
            Err(ReportError::CellLimit { .. })
        ));
        assert_eq!(writer.cursor_row(), 1);
    }

    #[test]
    fn toc_is_generated_once() {
        let mut writer = derive_writer();
        writer.new_sheet("Data", "Raw rows").expect("sheet");
        writer.generate_toc().expect("toc");
        writer.generate_toc().expect("toc");
        let (v_buffer, report) = writer.close_to_buffer().expect("close");
        assert!(!v_buffer.is_empty());
        assert_eq!(report.sheets, vec!["Summary", "Data"]);
    }
}
