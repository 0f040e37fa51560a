//! Blueprint extraction and script generation.
//!
//! [`BlueprintExtractor`] turns a read workbook into a [`SpecBlueprint`]
//! (classified blocks per sheet plus the detected theme) and then into a
//! [`SpecBlueprintScript`]: a config and an action queue that rebuild the
//! workbook layout through the report writer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use reportkit_xlsx::conf::{C_SHEET_CHART_DATA, C_SHEET_TOC, N_HEIGHT_KPI};
use reportkit_xlsx::config::C_COMPONENT_GLOBAL;
use reportkit_xlsx::{ActionQueue, SpecBuildAction, SpecReportConfig};

use crate::error::BlueprintResult;
use crate::reader::{EnumGridValue, SpecCellStyle, SpecSheetGrid, SpecWorkbookGrid, read_workbook_file};
use crate::scan::{EnumBlockKind, SpecContentBlock, detect_theme, scan_sheet};

/// Lowercased sheet names recognized as a table of contents.
const TUP_TOC_NAMES: [&str; 5] = ["table of contents", "contents", "toc", "index", "agenda"];
/// Default size of text written by `add_text`.
const N_FONT_SIZE_TEXT: f64 = 11.0;
/// Default size of text written by `add_title`.
const N_FONT_SIZE_TITLE: f64 = 18.0;
/// Font size from which a single cell is read as a title.
const N_FONT_SIZE_TITLE_MIN: f64 = 14.0;

////////////////////////////////////////////////////////////////////////////////
// #region Hints

/// User guidance for the decompiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecBlueprintHints {
    /// 0-based column the rebuilt report starts in.
    #[serde(alias = "GlobalStartCol")]
    pub global_start_col: usize,
    /// Sheets excluded from the scan.
    #[serde(alias = "IgnoredSheets")]
    pub ignored_sheets: Vec<String>,
    /// Emit a `generate_toc` action.
    #[serde(alias = "GenerateTOC")]
    pub generate_toc: bool,
    #[serde(alias = "Sheets")]
    pub sheets: BTreeMap<String, SpecSheetHints>,
}

impl Default for SpecBlueprintHints {
    fn default() -> Self {
        Self {
            global_start_col: 1,
            ignored_sheets: Vec::new(),
            generate_toc: true,
            sheets: BTreeMap::new(),
        }
    }
}

impl SpecBlueprintHints {
    pub fn from_json_str(text: &str) -> BlueprintResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Hint for a 1-based row of `sheet`.
    pub fn component(&self, sheet: &str, row: usize) -> Option<&SpecComponentHint> {
        self.sheets.get(sheet)?.components.get(&row)
    }

    pub fn with_component(mut self, sheet: impl Into<String>, row: usize, hint: SpecComponentHint) -> Self {
        self.sheets
            .entry(sheet.into())
            .or_default()
            .components
            .insert(row, hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecSheetHints {
    /// Component hints keyed by 1-based start row.
    #[serde(alias = "Components")]
    pub components: BTreeMap<usize, SpecComponentHint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumHintKind {
    #[serde(alias = "table")]
    Dataframe,
    #[serde(alias = "kpi")]
    KpiRow,
    DefinitionList,
}

/// Forced classification for the block starting at a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecComponentHint {
    #[serde(rename = "type")]
    pub kind: EnumHintKind,
    /// Dataset name used by the emitted action.
    #[serde(default, alias = "var_name")]
    pub dataset: Option<String>,
    #[serde(default)]
    pub add_totals: bool,
    #[serde(default = "default_true")]
    pub auto_filter: bool,
    /// Rows covered by the component; defaults to the detected block height.
    #[serde(default)]
    pub skip_rows: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl SpecComponentHint {
    pub fn new(kind: EnumHintKind) -> Self {
        Self {
            kind,
            dataset: None,
            add_totals: false,
            auto_filter: true,
            skip_rows: None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Blueprint

#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetBlueprint {
    pub name: String,
    pub if_toc: bool,
    pub if_gridlines_hidden: bool,
    pub blocks: Vec<SpecContentBlock>,
}

/// Classified content of a workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecBlueprint {
    pub theme: String,
    pub sheets: Vec<SpecSheetBlueprint>,
}

/// Generated rebuild instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecBlueprintScript {
    pub theme: String,
    pub config: SpecReportConfig,
    pub actions: ActionQueue,
}

impl SpecBlueprintScript {
    pub fn to_json_string(&self) -> BlueprintResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(text: &str) -> BlueprintResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Human-readable listing, one call per line.
    pub fn render_script(&self) -> String {
        let mut l_lines = vec![
            "# Recreated report".to_string(),
            format!("# Theme: {}", self.theme),
            String::new(),
            "# 1. Configuration".to_string(),
        ];
        if let Ok(c_config) = serde_json::to_string(&self.config) {
            l_lines.push(format!("config = {c_config}"));
        }
        l_lines.push(String::new());
        l_lines.push("# 2. Report Generation".to_string());
        for action in self.actions.iter() {
            if action.verb == "new_sheet" {
                l_lines.push(String::new());
                if let Some(c_name) = action.params.get("name").and_then(Value::as_str) {
                    l_lines.push(format!("# --- Sheet: {c_name} ---"));
                }
            }
            if !action.description.is_empty() && action.verb != "new_sheet" {
                l_lines.push(format!("# {}", action.description));
            }
            l_lines.push(render_call(action));
        }
        l_lines.join("\n") + "\n"
    }
}

fn render_call(action: &SpecBuildAction) -> String {
    let l_args: Vec<String> = match &action.params {
        Value::Object(map) => map.iter().map(|(key, val)| format!("{key}={val}")).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    };
    format!("{}({})", action.verb, l_args.join(", "))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Extractor

/// Workbook decompiler.
pub struct BlueprintExtractor {
    workbook: SpecWorkbookGrid,
    hints: SpecBlueprintHints,
}

impl BlueprintExtractor {
    pub fn new(workbook: SpecWorkbookGrid, hints: SpecBlueprintHints) -> Self {
        Self { workbook, hints }
    }

    pub fn from_path(path: impl AsRef<Path>, hints: SpecBlueprintHints) -> BlueprintResult<Self> {
        Ok(Self::new(read_workbook_file(path)?, hints))
    }

    pub fn workbook(&self) -> &SpecWorkbookGrid {
        &self.workbook
    }

    pub fn hints(&self) -> &SpecBlueprintHints {
        &self.hints
    }

    fn derive_ignored(&self) -> BTreeSet<String> {
        self.hints.ignored_sheets.iter().cloned().collect()
    }

    fn if_skipped_sheet(&self, grid: &SpecSheetGrid, ignored: &BTreeSet<String>) -> bool {
        grid.if_hidden || grid.name == C_SHEET_CHART_DATA || ignored.contains(&grid.name)
    }

    pub fn extract_theme(&self) -> String {
        let mut set_ignored = self.derive_ignored();
        set_ignored.extend(
            self.workbook
                .sheets
                .iter()
                .filter(|grid| if_toc_name(&grid.name))
                .map(|grid| grid.name.clone()),
        );
        detect_theme(&self.workbook, &set_ignored)
    }

    /// Classify every scanned sheet.
    pub fn extract(&self) -> SpecBlueprint {
        let set_ignored = self.derive_ignored();
        let sheets = self
            .workbook
            .sheets
            .iter()
            .filter(|grid| !self.if_skipped_sheet(grid, &set_ignored))
            .map(|grid| SpecSheetBlueprint {
                name: grid.name.clone(),
                if_toc: if_toc_name(&grid.name),
                if_gridlines_hidden: grid.if_gridlines_hidden,
                blocks: scan_sheet(grid),
            })
            .collect();
        SpecBlueprint {
            theme: self.extract_theme(),
            sheets,
        }
    }

    /// Build the config and action queue that recreate the workbook.
    pub fn generate_script(&self) -> BlueprintResult<SpecBlueprintScript> {
        let blueprint = self.extract();
        let dict_descriptions = self.derive_toc_descriptions(&blueprint);

        let mut config = SpecReportConfig::default();
        config.set(C_COMPONENT_GLOBAL, "primary_colour", blueprint.theme.clone());
        config.set(C_COMPONENT_GLOBAL, "start_row", "0");
        config.set(
            C_COMPONENT_GLOBAL,
            "start_col",
            self.hints.global_start_col.to_string(),
        );
        let if_gridlines_hidden = blueprint
            .sheets
            .iter()
            .any(|sheet| !sheet.if_toc && sheet.if_gridlines_hidden);
        config.set(C_COMPONENT_GLOBAL, "hide_gridlines", if_gridlines_hidden.to_string());

        let mut actions = ActionQueue::new();
        let mut if_has_toc = false;
        for sheet in &blueprint.sheets {
            if sheet.if_toc {
                if_has_toc = true;
                continue;
            }
            let Some(grid) = self.workbook.sheet(&sheet.name) else {
                continue;
            };
            let c_description = dict_descriptions.get(&sheet.name).cloned().unwrap_or_default();
            let mut generator = SheetScriptGenerator::new(grid, &self.hints, &mut actions);
            generator.run(sheet, &c_description);
        }
        if self.hints.generate_toc || if_has_toc {
            actions.push(SpecBuildAction::new("generate_toc", "", json!({})));
        }
        actions.push(SpecBuildAction::new("close", "", json!({})));

        log::info!(
            "decompiled {} sheet(s) into {} action(s), theme {}",
            blueprint.sheets.iter().filter(|sheet| !sheet.if_toc).count(),
            actions.len(),
            blueprint.theme
        );
        Ok(SpecBlueprintScript {
            theme: blueprint.theme,
            config,
            actions,
        })
    }

    /// Sheet descriptions recovered from a contents sheet (name, description) rows.
    fn derive_toc_descriptions(&self, blueprint: &SpecBlueprint) -> BTreeMap<String, String> {
        let set_names: BTreeSet<&str> = blueprint
            .sheets
            .iter()
            .filter(|sheet| !sheet.if_toc)
            .map(|sheet| sheet.name.as_str())
            .collect();
        let mut dict_descriptions = BTreeMap::new();
        for sheet in blueprint.sheets.iter().filter(|sheet| sheet.if_toc) {
            let Some(grid) = self.workbook.sheet(&sheet.name) else {
                continue;
            };
            for ((n_row, n_col), cell) in grid.iter_cells() {
                let EnumGridValue::Text(c_name) = &cell.value else {
                    continue;
                };
                if !set_names.contains(c_name.as_str()) {
                    continue;
                }
                if let Some(EnumGridValue::Text(c_desc)) = grid.value(n_row, n_col + 1) {
                    dict_descriptions.insert(c_name.clone(), c_desc.clone());
                }
            }
        }
        dict_descriptions
    }
}

pub fn if_toc_name(name: &str) -> bool {
    let c_clean = name.trim().to_lowercase();
    c_clean == C_SHEET_TOC.to_lowercase() || TUP_TOC_NAMES.contains(&c_clean.as_str())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetScript

/// Walks one sheet's blocks in row order, tracking where the writer's cursor
/// would be so that `skip_rows` only covers real gaps.
struct SheetScriptGenerator<'a> {
    grid: &'a SpecSheetGrid,
    hints: &'a SpecBlueprintHints,
    actions: &'a mut ActionQueue,
    n_row_cursor: usize,
    n_tables: usize,
}

impl<'a> SheetScriptGenerator<'a> {
    fn new(grid: &'a SpecSheetGrid, hints: &'a SpecBlueprintHints, actions: &'a mut ActionQueue) -> Self {
        Self {
            grid,
            hints,
            actions,
            n_row_cursor: 0,
            n_tables: 0,
        }
    }

    fn run(&mut self, sheet: &SpecSheetBlueprint, description: &str) {
        self.actions.push(SpecBuildAction::new(
            "new_sheet",
            format!("Sheet: {}", sheet.name),
            json!({"name": sheet.name, "description": description}),
        ));
        if sheet.if_gridlines_hidden {
            log::debug!("sheet {:?}: gridlines hidden in source", sheet.name);
        }

        let hints = self.hints;
        // A hint inside a block applies from that block's first row.
        let mut dict_hints: BTreeMap<usize, &SpecComponentHint> = BTreeMap::new();
        if let Some(sheet_hints) = hints.sheets.get(&sheet.name) {
            for (&n_row_hint, hint) in &sheet_hints.components {
                let Some(n_row) = n_row_hint.checked_sub(1) else {
                    continue;
                };
                let n_row_clamped = sheet
                    .blocks
                    .iter()
                    .find(|b| (b.rect.row_first..=b.rect.row_last).contains(&n_row))
                    .map_or(n_row, |b| b.rect.row_first);
                dict_hints.entry(n_row_clamped).or_insert(hint);
            }
        }
        let mut n_row_covered = 0usize;
        let mut iter_hints = dict_hints.iter().peekable();

        for block in &sheet.blocks {
            // Hints that start at or above this block take precedence.
            while let Some(&(&n_row_hint, hint)) = iter_hints.peek()
                && n_row_hint <= block.rect.row_first
            {
                let n_span = hint.skip_rows.unwrap_or_else(|| {
                    sheet
                        .blocks
                        .iter()
                        .find(|b| b.rect.row_first == n_row_hint)
                        .map_or(1, |b| b.rect.height())
                });
                self.emit_hinted(n_row_hint, hint, n_span, sheet);
                n_row_covered = n_row_covered.max(n_row_hint + n_span);
                iter_hints.next();
            }
            if block.rect.row_first < n_row_covered {
                continue;
            }
            self.emit_block(block, &sheet.name);
        }
        for (&n_row_hint, hint) in iter_hints {
            let n_span = hint.skip_rows.unwrap_or(1);
            self.emit_hinted(n_row_hint, hint, n_span, sheet);
        }
    }

    /// Move the simulated cursor to `row`, emitting the needed action.
    fn seek(&mut self, row: usize) {
        if row > self.n_row_cursor {
            let n_gap = row - self.n_row_cursor;
            self.actions
                .push(SpecBuildAction::new("skip_rows", "", json!({ "n": n_gap })));
        } else if row < self.n_row_cursor {
            self.actions
                .push(SpecBuildAction::new("set_cursor", "", json!({ "row": row })));
        }
        self.n_row_cursor = row;
    }

    fn derive_dataset_name(&mut self, sheet_name: &str) -> String {
        self.n_tables += 1;
        let c_base = format!("df_{}", sheet_name.replace(' ', "_").to_lowercase());
        if self.n_tables == 1 {
            c_base
        } else {
            format!("{c_base}_{}", self.n_tables)
        }
    }

    fn emit_block(&mut self, block: &SpecContentBlock, sheet_name: &str) {
        let n_row = block.rect.row_first;
        match &block.kind {
            EnumBlockKind::Text {
                value,
                style,
                if_merged,
            } => {
                self.seek(n_row);
                let c_text = value.to_display_text();
                let n_size = style.font_size.unwrap_or(N_FONT_SIZE_TEXT);
                if *if_merged || n_size >= N_FONT_SIZE_TITLE_MIN {
                    let mut params = Map::new();
                    params.insert("text".to_string(), json!(c_text));
                    if n_size != N_FONT_SIZE_TITLE {
                        params.insert("font_size".to_string(), json!(n_size.round() as i64));
                    }
                    if let Some(c_fg) = &style.font_color {
                        params.insert("font_color".to_string(), json!(c_fg));
                    }
                    if let Some(c_bg) = &style.fill_color {
                        params.insert("bg_color".to_string(), json!(c_bg));
                    }
                    if block.rect.col_first != self.hints.global_start_col {
                        params.insert("col".to_string(), json!(block.rect.col_first));
                    }
                    self.actions
                        .push(SpecBuildAction::new("add_title", "", Value::Object(params)));
                    self.n_row_cursor += 2;
                } else {
                    let mut params = derive_text_style_params(style);
                    params.insert("text".to_string(), json!(c_text));
                    if block.rect.col_first != self.hints.global_start_col {
                        params.insert("col".to_string(), json!(block.rect.col_first));
                    }
                    self.actions
                        .push(SpecBuildAction::new("add_text", "", Value::Object(params)));
                    self.n_row_cursor += 1;
                }
            }
            EnumBlockKind::DataFrame {
                headers,
                n_rows,
                header_style,
                if_has_totals,
            } => {
                self.seek(n_row);
                let c_dataset = self.derive_dataset_name(sheet_name);
                let mut params = Map::new();
                params.insert("dataset".to_string(), json!(c_dataset));
                params.insert("start_col".to_string(), json!(block.rect.col_first));
                params.insert("add_totals".to_string(), json!(if_has_totals));
                params.insert("auto_filter".to_string(), json!(true));
                let mut overrides = Map::new();
                if let Some(c_bg) = &header_style.fill_color {
                    overrides.insert("header_bg".to_string(), json!(c_bg));
                }
                if let Some(c_font) = &header_style.font_color {
                    overrides.insert("header_font".to_string(), json!(c_font));
                }
                if !overrides.is_empty() {
                    params.insert("style_overrides".to_string(), Value::Object(overrides));
                }
                let n_rows_data = n_rows - 1 - usize::from(*if_has_totals);
                self.actions.push(SpecBuildAction::new(
                    "write_table",
                    format!(
                        "Table {c_dataset}: {} ({n_rows_data} data rows)",
                        headers.join(", ")
                    ),
                    Value::Object(params),
                ));
                self.n_row_cursor += n_rows + 1;
            }
        }
    }

    fn emit_hinted(&mut self, row: usize, hint: &SpecComponentHint, span: usize, sheet: &SpecSheetBlueprint) {
        self.seek(row);
        let n_col = self.hints.global_start_col;
        match hint.kind {
            EnumHintKind::Dataframe => {
                let c_dataset = match &hint.dataset {
                    Some(c_name) => c_name.clone(),
                    None => self.derive_dataset_name(&sheet.name),
                };
                self.actions.push(SpecBuildAction::new(
                    "write_table",
                    format!("Hinted table {c_dataset} ({span} rows)"),
                    json!({
                        "dataset": c_dataset,
                        "start_col": n_col,
                        "add_totals": hint.add_totals,
                        "auto_filter": hint.auto_filter,
                    }),
                ));
                self.n_row_cursor += span + 1;
            }
            EnumHintKind::KpiRow => {
                let l_kpis = self.derive_kpis(row);
                self.actions.push(SpecBuildAction::new(
                    "add_kpi_row",
                    format!("Hinted KPI row ({} KPIs)", l_kpis.len()),
                    json!({ "kpis": l_kpis }),
                ));
                self.n_row_cursor += N_HEIGHT_KPI.max(span);
            }
            EnumHintKind::DefinitionList => {
                let mut params = Map::new();
                if let Some(c_name) = &hint.dataset {
                    params.insert("dataset".to_string(), json!(c_name));
                }
                params.insert("start_col".to_string(), json!(n_col));
                self.actions.push(SpecBuildAction::new(
                    "add_definition_list",
                    format!("Hinted definition list ({span} rows)"),
                    Value::Object(params),
                ));
                self.n_row_cursor += span + 1;
            }
        }
    }

    /// Labels on `row`, values directly below.
    fn derive_kpis(&self, row: usize) -> Vec<Value> {
        (0..self.grid.n_cols)
            .filter_map(|n_col| {
                let label = self.grid.value(row, n_col)?;
                let value = match self.grid.value(row + 1, n_col) {
                    Some(EnumGridValue::Number(n_val)) => json!(n_val),
                    Some(EnumGridValue::Boolean(val)) => json!(val),
                    Some(other) => json!(other.to_display_text()),
                    None => Value::Null,
                };
                let mut kpi = Map::new();
                kpi.insert("label".to_string(), json!(label.to_display_text()));
                kpi.insert("value".to_string(), value);
                if let Some(c_fmt) = self
                    .grid
                    .cell(row + 1, n_col)
                    .and_then(|cell| cell.style.num_format.clone())
                {
                    kpi.insert("num_format".to_string(), json!(c_fmt));
                }
                Some(Value::Object(kpi))
            })
            .collect()
    }
}

fn derive_text_style_params(style: &SpecCellStyle) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(c_bg) = &style.fill_color {
        params.insert("bg_color".to_string(), json!(c_bg));
    }
    if let Some(c_fg) = &style.font_color {
        params.insert("font_color".to_string(), json!(c_fg));
    }
    if style.bold {
        params.insert("bold".to_string(), json!(true));
    }
    if style.italic {
        params.insert("italic".to_string(), json!(true));
    }
    if let Some(n_size) = style.font_size
        && n_size != N_FONT_SIZE_TEXT
    {
        params.insert("font_size".to_string(), json!(n_size.round() as i64));
    }
    params
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tests

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::reader::SpecGridCell;

    fn text(value: &str) -> EnumGridValue {
        EnumGridValue::Text(value.to_string())
    }

    fn styled(value: EnumGridValue, style: SpecCellStyle) -> SpecGridCell {
        SpecGridCell {
            value,
            style,
            formula: None,
        }
    }

    fn derive_verbs(script: &SpecBlueprintScript) -> Vec<&str> {
        script.actions.iter().map(|action| action.verb.as_str()).collect()
    }

    fn build_sales_grid() -> SpecSheetGrid {
        let mut grid = SpecSheetGrid::new("Sales");
        grid.set_cell(0, 1, styled(text("Quarterly Sales"), SpecCellStyle {
            font_size: Some(18.0),
            bold: true,
            ..Default::default()
        }));
        grid.set_cell(2, 1, styled(text("Figures in GBP"), SpecCellStyle {
            italic: true,
            font_color: Some("#666666".to_string()),
            ..Default::default()
        }));
        let header = SpecCellStyle {
            fill_color: Some("#003366".to_string()),
            font_color: Some("#FFFFFF".to_string()),
            bold: true,
            ..Default::default()
        };
        grid.set_cell(5, 1, styled(text("Region"), header.clone()));
        grid.set_cell(5, 2, styled(text("Revenue"), header));
        grid.set_value(6, 1, text("North"));
        grid.set_value(6, 2, EnumGridValue::Number(100.0));
        grid.set_value(7, 1, text("Total"));
        grid.set_value(7, 2, EnumGridValue::Number(100.0));
        grid
    }

    #[test]
    fn test_generate_script_tracks_gaps() {
        let workbook = SpecWorkbookGrid {
            sheets: vec![build_sales_grid()],
        };
        let extractor = BlueprintExtractor::new(workbook, SpecBlueprintHints::default());
        let script = extractor.generate_script().unwrap();

        assert_eq!(script.theme, "#003366");
        assert_eq!(derive_verbs(&script), vec![
            "new_sheet",
            "add_title",
            "add_text",
            "skip_rows",
            "write_table",
            "generate_toc",
            "close",
        ]);
        let l_actions = script.actions.as_slice();
        assert_eq!(l_actions[1].params, json!({"text": "Quarterly Sales"}));
        assert_eq!(
            l_actions[2].params,
            json!({"text": "Figures in GBP", "italic": true, "font_color": "#666666"})
        );
        // title ends at row 2, text at row 3, table starts at row 5
        assert_eq!(l_actions[3].params, json!({"n": 2}));
        assert_eq!(l_actions[4].params["dataset"], json!("df_sales"));
        assert_eq!(l_actions[4].params["add_totals"], json!(true));
        assert_eq!(l_actions[4].params["style_overrides"]["header_bg"], json!("#003366"));
    }

    #[test]
    fn test_hint_overrides_classification_and_covers_span() {
        let workbook = SpecWorkbookGrid {
            sheets: vec![build_sales_grid()],
        };
        let mut hint = SpecComponentHint::new(EnumHintKind::Dataframe);
        hint.dataset = Some("df_regions".to_string());
        hint.skip_rows = Some(1);
        let hints = SpecBlueprintHints {
            generate_toc: false,
            ..Default::default()
        }
        .with_component("Sales", 3, hint);
        let script = BlueprintExtractor::new(workbook, hints).generate_script().unwrap();

        // hint at row 3 replaces the text line; the detected table starts past
        // the hinted span and is still emitted
        assert_eq!(derive_verbs(&script), vec![
            "new_sheet",
            "add_title",
            "write_table",
            "skip_rows",
            "write_table",
            "close",
        ]);
        let l_actions = script.actions.as_slice();
        assert_eq!(l_actions[2].params["dataset"], json!("df_regions"));
        assert_eq!(l_actions[3].params, json!({"n": 1}));
        assert_eq!(l_actions[4].params["dataset"], json!("df_sales"));
    }

    #[test]
    fn test_hint_inside_block_starts_at_block_row() {
        let workbook = SpecWorkbookGrid {
            sheets: vec![build_sales_grid()],
        };
        let mut hint = SpecComponentHint::new(EnumHintKind::Dataframe);
        hint.dataset = Some("df_regions".to_string());
        // 1-based row 7 is the first data row of the table at 0-based row 5
        let hints = SpecBlueprintHints {
            generate_toc: false,
            ..Default::default()
        }
        .with_component("Sales", 7, hint);
        let script = BlueprintExtractor::new(workbook, hints).generate_script().unwrap();

        assert_eq!(derive_verbs(&script), vec![
            "new_sheet",
            "add_title",
            "add_text",
            "skip_rows",
            "write_table",
            "close",
        ]);
        let l_actions = script.actions.as_slice();
        assert_eq!(l_actions[3].params, json!({"n": 2}));
        assert_eq!(l_actions[4].params["dataset"], json!("df_regions"));
    }

    #[test]
    fn test_title_keeps_column_and_colours() {
        let mut grid = SpecSheetGrid::new("Cover");
        grid.set_cell(0, 3, styled(text("Annual Review"), SpecCellStyle {
            font_size: Some(24.0),
            font_color: Some("#FFFFFF".to_string()),
            fill_color: Some("#8B0000".to_string()),
            bold: true,
            ..Default::default()
        }));
        let script = BlueprintExtractor::new(SpecWorkbookGrid { sheets: vec![grid] }, SpecBlueprintHints::default())
            .generate_script()
            .unwrap();
        let title = &script.actions.as_slice()[1];
        assert_eq!(title.verb, "add_title");
        assert_eq!(
            title.params,
            json!({
                "text": "Annual Review",
                "font_size": 24,
                "font_color": "#FFFFFF",
                "bg_color": "#8B0000",
                "col": 3,
            })
        );
    }

    #[test]
    fn test_kpi_hint_reads_labels_and_values() {
        let mut grid = SpecSheetGrid::new("KPIs");
        grid.set_value(0, 1, text("Revenue"));
        grid.set_value(0, 4, text("Orders"));
        grid.set_cell(1, 1, styled(EnumGridValue::Number(1200.0), SpecCellStyle {
            num_format: Some("£#,##0".to_string()),
            ..Default::default()
        }));
        grid.set_value(1, 4, EnumGridValue::Number(42.0));
        let hints = SpecBlueprintHints::default()
            .with_component("KPIs", 1, SpecComponentHint::new(EnumHintKind::KpiRow));
        let script = BlueprintExtractor::new(SpecWorkbookGrid { sheets: vec![grid] }, hints)
            .generate_script()
            .unwrap();
        let kpi = &script.actions.as_slice()[1];
        assert_eq!(kpi.verb, "add_kpi_row");
        assert_eq!(
            kpi.params,
            json!({"kpis": [
                {"label": "Revenue", "value": 1200.0, "num_format": "£#,##0"},
                {"label": "Orders", "value": 42.0},
            ]})
        );
    }

    #[test]
    fn test_skips_hidden_and_toc_sheets_and_recovers_descriptions() {
        let mut toc = SpecSheetGrid::new("Table of Contents");
        toc.set_value(1, 1, text("Report Contents"));
        toc.set_value(3, 1, text("Sales"));
        toc.set_value(3, 2, text("Regional revenue"));
        let mut hidden = SpecSheetGrid::new("Chart_Data");
        hidden.if_hidden = true;
        hidden.set_value(0, 0, text("x"));
        let workbook = SpecWorkbookGrid {
            sheets: vec![toc, build_sales_grid(), hidden],
        };
        let hints = SpecBlueprintHints {
            generate_toc: false,
            ..Default::default()
        };
        let script = BlueprintExtractor::new(workbook, hints).generate_script().unwrap();
        let l_sheets: Vec<&Value> = script
            .actions
            .iter()
            .filter(|action| action.verb == "new_sheet")
            .map(|action| &action.params)
            .collect();
        assert_eq!(l_sheets, vec![&json!({"name": "Sales", "description": "Regional revenue"})]);
        assert!(derive_verbs(&script).contains(&"generate_toc"));
    }

    #[test]
    fn test_overlap_emits_set_cursor() {
        let mut grid = SpecSheetGrid::new("Dense");
        grid.set_value(0, 1, text("Heading"));
        grid.set_value(0, 2, text("x"));
        grid.set_value(1, 1, text("a"));
        grid.set_value(1, 2, text("b"));
        // table rows 0..1 then text directly below
        grid.set_value(2, 4, text("note"));
        let script = BlueprintExtractor::new(SpecWorkbookGrid { sheets: vec![grid] }, SpecBlueprintHints::default())
            .generate_script()
            .unwrap();
        let l_actions = script.actions.as_slice();
        assert_eq!(l_actions[1].verb, "write_table");
        assert_eq!(l_actions[2].verb, "set_cursor");
        assert_eq!(l_actions[2].params, json!({"row": 2}));
        assert_eq!(l_actions[3].params, json!({"text": "note", "col": 4}));
    }

    #[test]
    fn test_hints_accept_legacy_keys() {
        let hints = SpecBlueprintHints::from_json_str(
            r#"{"GlobalStartCol": 2, "IgnoredSheets": ["Raw"], "GenerateTOC": false,
                "Sheets": {"Sales": {"Components": {"6": {"type": "dataframe", "var_name": "df_x", "skip_rows": 4}}}}}"#,
        )
        .unwrap();
        assert_eq!(hints.global_start_col, 2);
        assert!(!hints.generate_toc);
        let hint = hints.component("Sales", 6).unwrap();
        assert_eq!(hint.kind, EnumHintKind::Dataframe);
        assert_eq!(hint.dataset.as_deref(), Some("df_x"));
        assert!(hint.auto_filter);
    }

    #[test]
    fn test_render_script_and_json_round_trip() {
        let workbook = SpecWorkbookGrid {
            sheets: vec![build_sales_grid()],
        };
        let script = BlueprintExtractor::new(workbook, SpecBlueprintHints::default())
            .generate_script()
            .unwrap();
        let c_text = script.render_script();
        assert!(c_text.contains("# --- Sheet: Sales ---"));
        assert!(c_text.contains("add_title(text=\"Quarterly Sales\")"));
        assert!(c_text.ends_with("close()\n"));

        let parsed = SpecBlueprintScript::from_json_str(&script.to_json_string().unwrap()).unwrap();
        assert_eq!(parsed, script);
    }
}

// #endregion
