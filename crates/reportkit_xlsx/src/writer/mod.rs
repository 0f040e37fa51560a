//! Stateful report writer.
//!
//! One [`ReportWriter`] owns one workbook. Content is laid out top-down on the
//! active sheet through a per-sheet row cursor; every write-producing call
//! advances the cursor past what it wrote. Tables remember where they landed so
//! that later calls (conditional formats, sparklines, charts) can refer back to
//! "the last table" without coordinates.
//!
//! Worksheets are owned by the writer until [`ReportWriter::close`], which
//! pushes them into the workbook in their final order: table of contents,
//! user sheets, then the hidden chart data sheet.

mod appendix;
mod table;
mod visual;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Image, Workbook, Worksheet};

use crate::conf::{
    C_FONT_NAME_DEFAULT, C_SHEET_CHART_DATA, C_SHEET_TOC, N_LEN_EXCEL_CELL_TEXT_MAX,
    N_WIDTH_BANNER_DEFAULT, derive_default_title_format,
};
use crate::config::{
    C_COMPONENT_GLOBAL, C_COMPONENT_HEADER, C_COMPONENT_LOGO, SpecReportConfig, SpecTheme,
};
use crate::dictionary::ColumnDictionary;
use crate::error::{ReportError, ReportResult};
use crate::layout::CursorLayout;
use crate::spec::{
    EnumCellValue, SpecBannerOptions, SpecCellFormat, SpecReportLog, SpecTableInfo,
    SpecTextOptions,
};
use crate::style::{StyleResolver, resolve_layers};
use crate::util::{cast_col_num, cast_row_num, derive_unique_sheet_name, sanitize_sheet_name};

const C_SHEET_NAME_DEFAULT: &str = "Summary";
const C_SHEET_DESCRIPTION_DEFAULT: &str = "Report Overview";
const N_HEIGHT_ROW_DEFAULT: f64 = 15.0;
const N_CHARS_PER_BANNER_COL: usize = 10;

////////////////////////////////////////////////////////////////////////////////
// #region SheetState

/// One user sheet and its layout state.
pub struct SpecSheetState {
    name: String,
    description: String,
    worksheet: Worksheet,
    cursor: CursorLayout,
    last_table: Option<SpecTableInfo>,
    if_has_content: bool,
}

impl SpecSheetState {
    fn new(
        name: &str,
        description: &str,
        row_start: usize,
        if_hide_gridlines: bool,
    ) -> ReportResult<Self> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(name)?;
        if if_hide_gridlines {
            worksheet.set_screen_gridlines(false);
        }
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            worksheet,
            cursor: CursorLayout::new(row_start),
            last_table: None,
            if_has_content: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Next free row.
    pub fn cursor_row(&self) -> usize {
        self.cursor.row()
    }

    /// Most recently written table on this sheet.
    pub fn last_table(&self) -> Option<&SpecTableInfo> {
        self.last_table.as_ref()
    }
}

struct SpecChartDataState {
    worksheet: Worksheet,
    row_cursor: usize,
}

impl SpecChartDataState {
    fn new() -> ReportResult<Self> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(C_SHEET_CHART_DATA)?;
        worksheet.set_hidden(true);
        Ok(Self {
            worksheet,
            row_cursor: 0,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Writer

/// Declarative XLSX report builder.
pub struct ReportWriter {
    config: SpecReportConfig,
    theme: SpecTheme,
    dictionary: ColumnDictionary,
    resolver: StyleResolver,
    sheet: SpecSheetState,
    l_sheets_prev: Vec<SpecSheetState>,
    set_sheet_names: BTreeSet<String>,
    chart_data: Option<SpecChartDataState>,
    toc: Option<Worksheet>,
    report: SpecReportLog,
    n_row_start: usize,
    n_col_start: usize,
    if_hide_gridlines: bool,
}

impl ReportWriter {
    /// Create a writer with the default sheet already in place.
    pub fn new(config: SpecReportConfig) -> ReportResult<Self> {
        Self::with_primary_color(config, None)
    }

    /// Like [`Self::new`]; `primary_color` applies when config sets none.
    pub fn with_primary_color(
        config: SpecReportConfig,
        primary_color: Option<&str>,
    ) -> ReportResult<Self> {
        let theme = SpecTheme::from_config(&config, primary_color);
        let n_row_start = config.get_usize(C_COMPONENT_GLOBAL, "start_row").unwrap_or(1);
        let n_col_start = config.get_usize(C_COMPONENT_GLOBAL, "start_col").unwrap_or(1);
        let if_hide_gridlines = config
            .get_bool(C_COMPONENT_GLOBAL, "hide_gridlines")
            .unwrap_or(false);
        let c_sheet_default = sanitize_sheet_name(
            &config
                .get_str(C_COMPONENT_GLOBAL, "default_sheet_name")
                .unwrap_or_else(|| C_SHEET_NAME_DEFAULT.to_string()),
            "_",
        );
        let c_description_default = config
            .get_str(C_COMPONENT_GLOBAL, "default_sheet_description")
            .unwrap_or_else(|| C_SHEET_DESCRIPTION_DEFAULT.to_string());

        let mut set_sheet_names: BTreeSet<String> = [C_SHEET_TOC, C_SHEET_CHART_DATA]
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
        let c_sheet_default = derive_unique_sheet_name(&c_sheet_default, &set_sheet_names);
        set_sheet_names.insert(c_sheet_default.to_lowercase());

        let sheet = SpecSheetState::new(
            &c_sheet_default,
            &c_description_default,
            n_row_start,
            if_hide_gridlines,
        )?;
        log::info!(
            "report writer ready: sheet={:?} theme={}",
            c_sheet_default,
            theme.primary_color
        );

        Ok(Self {
            config,
            theme,
            dictionary: ColumnDictionary::new(),
            resolver: StyleResolver::new(),
            sheet,
            l_sheets_prev: Vec::new(),
            set_sheet_names,
            chart_data: None,
            toc: None,
            report: SpecReportLog {
                sheets: vec![c_sheet_default],
                warnings: Vec::new(),
            },
            n_row_start,
            n_col_start,
            if_hide_gridlines,
        })
    }

    /// Replace the column dictionary used for headers, labels and formats.
    pub fn set_column_dictionary(&mut self, dictionary: ColumnDictionary) {
        self.dictionary = dictionary;
    }

    pub fn dictionary(&self) -> &ColumnDictionary {
        &self.dictionary
    }

    pub fn theme(&self) -> &SpecTheme {
        &self.theme
    }

    pub fn config(&self) -> &SpecReportConfig {
        &self.config
    }

    /// Run log collected so far.
    pub fn report(&self) -> &SpecReportLog {
        &self.report
    }

    /// Sheet receiving new content.
    pub fn active_sheet(&self) -> &SpecSheetState {
        &self.sheet
    }

    /// User sheets in creation order.
    pub fn sheets(&self) -> impl Iterator<Item = &SpecSheetState> {
        self.l_sheets_prev.iter().chain(std::iter::once(&self.sheet))
    }

    /// Next free row of the active sheet.
    pub fn cursor_row(&self) -> usize {
        self.sheet.cursor.row()
    }

    /// Last table written on the active sheet.
    pub fn last_table(&self) -> Option<&SpecTableInfo> {
        self.sheet.last_table.as_ref()
    }

    /// Number of distinct cell formats created so far.
    pub fn format_count(&self) -> usize {
        self.resolver.cache_len()
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Sheets

    /// Start a new sheet and make it active; returns the final sheet name.
    ///
    /// Names are sanitized and made unique (`Name__2`, ...). A request for the
    /// untouched default sheet's own name reuses it instead of adding a twin.
    pub fn new_sheet(&mut self, name: &str, description: &str) -> ReportResult<String> {
        let c_name = sanitize_sheet_name(name, "_");
        if self.l_sheets_prev.is_empty()
            && !self.sheet.if_has_content
            && self.sheet.name.eq_ignore_ascii_case(&c_name)
        {
            if !description.is_empty() {
                self.sheet.description = description.to_string();
            }
            log::debug!("reusing default sheet {:?}", self.sheet.name);
            return Ok(self.sheet.name.clone());
        }

        let c_name_unique = derive_unique_sheet_name(&c_name, &self.set_sheet_names);
        if c_name_unique != name {
            self.report.warn(format!(
                "sheet name {name:?} written as {c_name_unique:?}"
            ));
        }
        let sheet = SpecSheetState::new(
            &c_name_unique,
            description,
            self.n_row_start,
            self.if_hide_gridlines,
        )?;
        self.set_sheet_names.insert(c_name_unique.to_lowercase());
        self.report.sheets.push(c_name_unique.clone());
        let sheet_prev = std::mem::replace(&mut self.sheet, sheet);
        self.l_sheets_prev.push(sheet_prev);
        log::debug!("new sheet {c_name_unique:?}");
        Ok(c_name_unique)
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Cursor

    /// Leave `n` empty rows.
    pub fn skip_rows(&mut self, n: usize) {
        self.sheet.cursor.advance(n);
    }

    /// Move the cursor to an explicit row.
    pub fn set_cursor(&mut self, row: usize) {
        self.sheet.cursor.set(row);
    }

    /// Freeze rows above `row` and columns left of `col`.
    pub fn freeze_panes(&mut self, row: usize, col: usize) -> ReportResult<()> {
        self.sheet
            .worksheet
            .set_freeze_panes(cast_row_num(row)?, cast_col_num(col)?)?;
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Text

    /// Sheet title at the cursor. `Header` config wins over the call's options.
    pub fn add_title(&mut self, text: &str, options: &SpecTextOptions) -> ReportResult<()> {
        validate_text_len(text, "title", 0)?;
        let spec_call = SpecCellFormat {
            font_size: options.font_size,
            font_color: options.font_color.clone(),
            bg_color: options.bg_color.clone(),
            bold: options.bold,
            italic: options.italic,
            ..Default::default()
        };
        let spec = resolve_layers([
            &derive_default_title_format(&self.theme.primary_color),
            &spec_call,
            &self.config.derive_component_format(C_COMPONENT_HEADER),
        ]);
        let format = self.resolver.format_for(&spec);
        let n_size = spec.font_size.unwrap_or(18);
        let n_row = self.sheet.cursor.row();
        let n_col = options.col.unwrap_or(self.n_col_start);

        let worksheet = &mut self.sheet.worksheet;
        worksheet.set_row_height(cast_row_num(n_row)?, n_size as f64 * 1.5)?;
        worksheet.write_string_with_format(cast_row_num(n_row)?, cast_col_num(n_col)?, text, &format)?;
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(2);
        Ok(())
    }

    /// One line of styled free text.
    pub fn add_text(&mut self, text: &str, options: &SpecTextOptions) -> ReportResult<()> {
        validate_text_len(text, "text", 0)?;
        let spec_base = SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(11),
            ..Default::default()
        };
        let spec_call = SpecCellFormat {
            font_size: options.font_size,
            font_color: options.font_color.clone(),
            bg_color: options.bg_color.clone(),
            bold: options.bold,
            italic: options.italic,
            ..Default::default()
        };
        let spec = resolve_layers([&spec_base, &spec_call]);
        let format = self.resolver.format_for(&spec);
        let n_row = self.sheet.cursor.row();
        let n_col = options.col.unwrap_or(self.n_col_start);

        let worksheet = &mut self.sheet.worksheet;
        if let Some(n_size) = spec.font_size
            && n_size > 15
        {
            worksheet.set_row_height(cast_row_num(n_row)?, n_size as f64 * 1.5)?;
        }
        worksheet.write_string_with_format(cast_row_num(n_row)?, cast_col_num(n_col)?, text, &format)?;
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(1);
        Ok(())
    }

    /// Full-width merged banner colored by a named style profile.
    pub fn add_banner(&mut self, text: &str, options: &SpecBannerOptions) -> ReportResult<()> {
        validate_text_len(text, "banner", 0)?;
        let profile = match &options.style_profile {
            Some(name) => self.theme.profile(name),
            None => self.theme.profile(""),
        };
        let spec_base = SpecCellFormat {
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(10),
            bold: Some(true),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            bg_color: profile.bg_color.clone(),
            font_color: profile.font_color.clone(),
            text_wrap: Some(options.text_wrap),
            ..Default::default()
        };
        let spec = resolve_layers([&spec_base, &profile.format]);
        let format = self.resolver.format_for(&spec);

        let n_merge_cols = options.merge_cols.unwrap_or(N_WIDTH_BANNER_DEFAULT).max(1);
        let n_row = self.sheet.cursor.row();
        let n_col = self.n_col_start;
        let worksheet = &mut self.sheet.worksheet;
        if n_merge_cols == 1 {
            worksheet.write_string_with_format(cast_row_num(n_row)?, cast_col_num(n_col)?, text, &format)?;
        } else {
            worksheet.merge_range(
                cast_row_num(n_row)?,
                cast_col_num(n_col)?,
                cast_row_num(n_row)?,
                cast_col_num(n_col + n_merge_cols - 1)?,
                text,
                &format,
            )?;
        }
        if options.auto_height {
            let n_lines = derive_wrapped_line_count(text, n_merge_cols * N_CHARS_PER_BANNER_COL);
            worksheet.set_row_height(cast_row_num(n_row)?, N_HEIGHT_ROW_DEFAULT * n_lines as f64)?;
        }
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(2);
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Images

    /// Insert the logo image; defaults come from the `Logo` config component.
    ///
    /// A logo anchored at A1 pushes the cursor to at least row 5; elsewhere
    /// the cursor moves past the anchor row. Unreadable images are recorded as
    /// warnings.
    pub fn add_logo(
        &mut self,
        path: Option<&Path>,
        row: Option<usize>,
        col: Option<usize>,
    ) -> ReportResult<()> {
        let path_logo = match path {
            Some(path) => path.to_path_buf(),
            None => match self.config.get_str(C_COMPONENT_LOGO, "path") {
                Some(c_path) => PathBuf::from(c_path),
                None => {
                    log::debug!("no logo configured");
                    return Ok(());
                }
            },
        };
        let n_scale = self
            .config
            .get_f64(C_COMPONENT_LOGO, "width_scale")
            .unwrap_or(0.5);
        let n_row = row.unwrap_or(0);
        let n_col = col.unwrap_or(0);

        let image = match Image::new(&path_logo) {
            Ok(image) => image.set_scale_width(n_scale).set_scale_height(n_scale),
            Err(err) => {
                self.report
                    .warn(format!("logo {} skipped: {err}", path_logo.display()));
                return Ok(());
            }
        };
        if let Err(err) =
            self.sheet
                .worksheet
                .insert_image(cast_row_num(n_row)?, cast_col_num(n_col)?, &image)
        {
            self.report
                .warn(format!("logo {} skipped: {err}", path_logo.display()));
            return Ok(());
        }
        self.sheet.if_has_content = true;
        if n_row == 0 && n_col == 0 {
            self.sheet.cursor.place_at(4);
        } else {
            self.sheet.cursor.place_at(n_row);
        }
        Ok(())
    }

    /// Tile an image behind the active sheet.
    ///
    /// The background is anchored at the top row, so the cursor is placed
    /// there without moving past existing content.
    pub fn add_watermark(&mut self, path: &Path) -> ReportResult<()> {
        match Image::new(path) {
            Ok(image) => {
                self.sheet.worksheet.insert_background_image(&image);
                self.sheet.if_has_content = true;
                self.sheet.cursor.place_at(0);
            }
            Err(err) => {
                self.report
                    .warn(format!("watermark {} skipped: {err}", path.display()));
            }
        }
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Close

    /// Finalize the workbook and write it to `path`.
    pub fn close(self, path: impl AsRef<Path>) -> ReportResult<SpecReportLog> {
        let path = path.as_ref().to_path_buf();
        let (mut workbook, report) = self.finish()?;
        workbook.save(&path)?;
        log::info!("report saved: {}", path.display());
        Ok(report)
    }

    /// Finalize the workbook into an in-memory XLSX buffer.
    pub fn close_to_buffer(self) -> ReportResult<(Vec<u8>, SpecReportLog)> {
        let (mut workbook, report) = self.finish()?;
        let v_buffer = workbook.save_to_buffer()?;
        Ok((v_buffer, report))
    }

    fn finish(mut self) -> ReportResult<(Workbook, SpecReportLog)> {
        self.generate_toc()?;

        let mut workbook = Workbook::new();
        if let Some(toc) = self.toc.take() {
            workbook.push_worksheet(toc);
        }
        self.l_sheets_prev.push(self.sheet);
        for sheet in self.l_sheets_prev {
            workbook.push_worksheet(sheet.worksheet);
        }
        if let Some(chart_data) = self.chart_data.take() {
            workbook.push_worksheet(chart_data.worksheet);
        }
        log::debug!(
            "workbook assembled: {} sheets, {} formats, {} warnings",
            self.report.sheets.len(),
            self.resolver.cache_len(),
            self.report.warnings.len()
        );
        Ok((workbook, self.report))
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Internals

    fn require_last_table(&self) -> ReportResult<SpecTableInfo> {
        self.sheet.last_table.clone().ok_or_else(|| {
            ReportError::Reference(format!(
                "no table has been written on sheet {:?}",
                self.sheet.name
            ))
        })
    }

    fn require_last_table_rows(&self) -> ReportResult<SpecTableInfo> {
        let info = self.require_last_table()?;
        if info.height_data() == 0 {
            return Err(ReportError::Reference(format!(
                "last table on sheet {:?} has no data rows",
                self.sheet.name
            )));
        }
        Ok(info)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Helpers

/// Reject text longer than one cell can hold; `row` is 0-based within the block.
pub(super) fn validate_text_len(text: &str, column: &str, row: usize) -> ReportResult<()> {
    let n_len = text.chars().count();
    if n_len > N_LEN_EXCEL_CELL_TEXT_MAX {
        return Err(ReportError::CellLimit {
            constraint: format!("cell text exceeds {N_LEN_EXCEL_CELL_TEXT_MAX} characters"),
            column: column.to_string(),
            row,
            length: n_len,
        });
    }
    Ok(())
}

fn derive_wrapped_line_count(text: &str, n_chars_per_line: usize) -> usize {
    let n_chars_per_line = n_chars_per_line.max(1);
    text.lines()
        .map(|line| line.chars().count().div_ceil(n_chars_per_line).max(1))
        .sum::<usize>()
        .max(1)
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> ReportResult<()> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) | EnumCellValue::DateTime(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_writer() -> ReportWriter {
        ReportWriter::new(SpecReportConfig::default()).expect("writer")
    }

    #[test]
    fn default_sheet_exists_and_is_reused_by_name() {
        let mut writer = derive_writer();
        assert_eq!(writer.active_sheet().name(), "Summary");
        assert_eq!(writer.cursor_row(), 1);

        let c_name = writer.new_sheet("summary", "Front page").expect("sheet");
        assert_eq!(c_name, "Summary");
        assert_eq!(writer.sheets().count(), 1);
        assert_eq!(writer.active_sheet().description(), "Front page");
    }

    #[test]
    fn duplicate_sheet_names_get_suffix_and_warning() {
        let mut writer = derive_writer();
        writer.add_title("Overview", &SpecTextOptions::default()).expect("title");
        assert_eq!(writer.new_sheet("Summary", "").expect("sheet"), "Summary__2");
        assert_eq!(writer.new_sheet("Data", "").expect("sheet"), "Data");
        assert_eq!(writer.new_sheet("Chart_Data", "").expect("sheet"), "Chart_Data__2");
        assert_eq!(writer.report().warnings.len(), 2);
        assert_eq!(
            writer.report().sheets,
            vec!["Summary", "Summary__2", "Data", "Chart_Data__2"]
        );
    }

    #[test]
    fn new_sheet_resets_cursor() {
        let mut writer = derive_writer();
        writer.add_title("Overview", &SpecTextOptions::default()).expect("title");
        assert_eq!(writer.cursor_row(), 3);
        writer.new_sheet("Data", "").expect("sheet");
        assert_eq!(writer.cursor_row(), 1);
    }

    #[test]
    fn text_blocks_advance_cursor() {
        let mut writer = derive_writer();
        writer
            .add_title(
                "Overview",
                &SpecTextOptions {
                    font_size: Some(20),
                    ..Default::default()
                },
            )
            .expect("title");
        writer
            .add_text("Generated nightly", &SpecTextOptions::default())
            .expect("text");
        writer
            .add_banner(
                "Figures are provisional",
                &SpecBannerOptions {
                    style_profile: Some("Warning".to_string()),
                    auto_height: true,
                    ..Default::default()
                },
            )
            .expect("banner");
        writer.skip_rows(2);
        assert_eq!(writer.cursor_row(), 1 + 2 + 1 + 2 + 2);
        writer.set_cursor(40);
        assert_eq!(writer.cursor_row(), 40);
    }

    #[test]
    fn oversized_title_is_a_cell_limit_error() {
        let mut writer = derive_writer();
        let c_text = "x".repeat(N_LEN_EXCEL_CELL_TEXT_MAX + 1);
        assert!(matches!(
            writer.add_title(&c_text, &SpecTextOptions::default()),
            Err(ReportError::CellLimit { .. })
        ));
        assert_eq!(writer.cursor_row(), 1);
    }

    #[test]
    fn missing_images_become_warnings() {
        let mut writer = derive_writer();
        writer
            .add_logo(Some(Path::new("/nonexistent/logo.png")), None, None)
            .expect("logo");
        writer
            .add_watermark(Path::new("/nonexistent/watermark.png"))
            .expect("watermark");
        assert_eq!(writer.report().warnings.len(), 2);
        assert_eq!(writer.cursor_row(), 1);
    }

    const V_PNG_1X1: [u8; 67] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn placed_images_keep_the_cursor_below_them() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path_png = dir.path().join("pixel.png");
        std::fs::write(&path_png, V_PNG_1X1).expect("png");

        let mut writer = derive_writer();
        writer
            .add_logo(Some(path_png.as_path()), Some(8), Some(3))
            .expect("logo");
        assert_eq!(writer.cursor_row(), 9);
        writer.add_watermark(&path_png).expect("watermark");
        assert_eq!(writer.cursor_row(), 9);
        assert!(writer.report().warnings.is_empty());

        writer.new_sheet("Clean", "").expect("sheet");
        writer.add_logo(Some(path_png.as_path()), None, None).expect("logo");
        assert_eq!(writer.cursor_row(), 5);
    }

    #[test]
    fn start_row_and_col_come_from_global_config() {
        let config = SpecReportConfig::from_rows([
            ("Global", "start_row", "3"),
            ("Global", "default_sheet_name", "Front"),
        ]);
        let writer = ReportWriter::new(config).expect("writer");
        assert_eq!(writer.active_sheet().name(), "Front");
        assert_eq!(writer.cursor_row(), 3);
    }

    #[test]
    fn banner_line_count_grows_with_text() {
        assert_eq!(derive_wrapped_line_count("", 100), 1);
        assert_eq!(derive_wrapped_line_count(&"a".repeat(250), 100), 3);
        assert_eq!(derive_wrapped_line_count("a\nb", 100), 2);
    }

    #[test]
    fn close_to_buffer_produces_zip() {
        let mut writer = derive_writer();
        writer.add_title("Overview", &SpecTextOptions::default()).expect("title");
        let (v_buffer, report) = writer.close_to_buffer().expect("close");
        assert_eq!(&v_buffer[..2], b"PK");
        assert_eq!(report.sheets, vec!["Summary"]);
    }

    #[test]
    fn repeated_styles_share_one_format() {
        let mut writer = derive_writer();
        writer.add_text("first", &SpecTextOptions::default()).expect("text");
        let n_formats = writer.format_count();
        writer.add_text("second", &SpecTextOptions::default()).expect("text");
        assert_eq!(writer.format_count(), n_formats);
        writer
            .add_text(
                "bold",
                &SpecTextOptions {
                    bold: Some(true),
                    ..Default::default()
                },
            )
            .expect("text");
        assert_eq!(writer.format_count(), n_formats + 1);
    }
}
