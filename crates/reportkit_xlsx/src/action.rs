//! Serializable build actions and the driver that replays them onto a writer.
//!
//! An action is `{verb, description, params}`. The queue is ordered; replay
//! stops at the first failure and [`generate_report`] then flushes whatever was
//! written to `<name>.partial.xlsx` before returning the original error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use polars::prelude::{
    ChunkAgg, Column, DataFrame, DataType, IntoLazy, SortMultipleOptions, col,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::SpecReportConfig;
use crate::dictionary::ColumnDictionary;
use crate::error::{ReportError, ReportResult};
use crate::rule::{SpecStyleRule, create_style_map};
use crate::spec::{
    EnumCellValue, EnumSparklineSource, SpecBannerOptions, SpecCellFormat, SpecChartOptions,
    SpecConditionalFormat, SpecDefinitionListOptions, SpecKpi, SpecReportLog,
    SpecTableStyleOverrides, SpecTableWriteOptions, SpecTextOptions,
};
use crate::util::derive_cell_value_from_any_value;
use crate::writer::ReportWriter;

/// Named input datasets available to actions.
pub type DatasetRegistry = BTreeMap<String, DataFrame>;

////////////////////////////////////////////////////////////////////////////////
// #region Queue

/// One recorded build step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecBuildAction {
    /// Operation name, e.g. `write_table`.
    pub verb: String,
    /// Human-readable label shown in build logs.
    #[serde(default)]
    pub description: String,
    /// Operation parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl SpecBuildAction {
    pub fn new(verb: impl Into<String>, description: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            verb: verb.into(),
            description: description.into(),
            params,
        }
    }
}

/// Ordered, editable list of build actions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionQueue {
    l_actions: Vec<SpecBuildAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of actions.
    pub fn from_json_str(text: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn push(&mut self, action: SpecBuildAction) {
        self.l_actions.push(action);
    }

    /// Undo the most recent action.
    pub fn pop_last(&mut self) -> Option<SpecBuildAction> {
        self.l_actions.pop()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecBuildAction> {
        self.l_actions.iter()
    }

    pub fn as_slice(&self) -> &[SpecBuildAction] {
        &self.l_actions
    }

    pub fn len(&self) -> usize {
        self.l_actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_actions.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Params

#[derive(Debug, Deserialize)]
struct SpecNewSheetParams {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct SpecSkipRowsParams {
    #[serde(default = "default_one", alias = "rows")]
    n: usize,
}

fn default_one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct SpecRowParams {
    row: usize,
}

#[derive(Debug, Deserialize)]
struct SpecFreezeParams {
    row: usize,
    #[serde(default)]
    col: usize,
}

#[derive(Debug, Deserialize)]
struct SpecTextParams {
    text: String,
    #[serde(flatten)]
    options: SpecTextOptions,
}

#[derive(Debug, Deserialize)]
struct SpecBannerParams {
    text: String,
    #[serde(flatten)]
    options: SpecBannerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpecImageParams {
    path: Option<PathBuf>,
    row: Option<usize>,
    col: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SpecDatasetParams {
    dataset: String,
    #[serde(default)]
    start_col: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpecOptionalDatasetParams {
    dataset: Option<String>,
    start_col: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SpecWriteTableParams {
    dataset: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    start_col: Option<usize>,
    #[serde(default)]
    add_totals: bool,
    #[serde(default)]
    auto_filter: bool,
    #[serde(default)]
    style_overrides: SpecTableStyleOverrides,
    #[serde(default)]
    column_alignments: BTreeMap<String, String>,
    #[serde(default)]
    column_style_overrides: BTreeMap<String, SpecCellFormat>,
    #[serde(default)]
    style_rules: Vec<SpecStyleRule>,
}

#[derive(Debug, Deserialize)]
struct SpecSparklineParams {
    #[serde(default)]
    values: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default = "default_sparkline_title")]
    title: String,
}

fn default_sparkline_title() -> String {
    "Trend".to_string()
}

#[derive(Debug, Deserialize)]
struct SpecKpiParam {
    label: String,
    value: serde_json::Value,
    #[serde(default)]
    num_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpecDynamicKpiParams {
    label: String,
    dataset: String,
    column: String,
    #[serde(default = "default_agg_func")]
    func: String,
    #[serde(default, alias = "format")]
    num_format: Option<String>,
}

fn default_agg_func() -> String {
    "sum".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpecKpiRowParams {
    kpis: Vec<SpecKpiParam>,
    dataset: Option<String>,
    dynamic: Option<SpecDynamicKpiParams>,
}

#[derive(Debug, Deserialize)]
struct SpecAggregateParams {
    group_col: String,
    y_col: String,
    /// `D`, `M` or `Y` to bucket a date group column.
    #[serde(default)]
    freq: Option<String>,
    /// Bucket label layout: `YYYY-MM` (default) or `YYYYMM`.
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpecChartParams {
    #[serde(flatten)]
    options: SpecChartOptions,
    #[serde(default)]
    dataset: Option<String>,
    #[serde(default)]
    aggregate: Option<SpecAggregateParams>,
}

#[derive(Debug, Deserialize)]
struct SpecImageChartParams {
    path: PathBuf,
    #[serde(default)]
    row: Option<usize>,
    #[serde(default)]
    col: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpecDefinitionParams {
    dataset: Option<String>,
    #[serde(flatten)]
    options: SpecDefinitionListOptions,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Driver

enum EnumActionOutcome {
    Continue,
    Close,
}

/// Replay `actions` onto `writer` in order.
///
/// A `close` action ends the replay; any action after it fails with
/// [`ReportError::Closed`].
pub fn run_actions(
    writer: &mut ReportWriter,
    actions: &[SpecBuildAction],
    registry: &DatasetRegistry,
) -> ReportResult<()> {
    let mut if_closed = false;
    for (n_idx, action) in actions.iter().enumerate() {
        if if_closed {
            return Err(ReportError::Closed);
        }
        log::debug!(
            "action #{n_idx} {}: {}",
            action.verb,
            action.description
        );
        match apply_action(writer, action, registry)? {
            EnumActionOutcome::Continue => {}
            EnumActionOutcome::Close => if_closed = true,
        }
    }
    Ok(())
}

/// Build a complete report file from a config, dictionary, datasets and actions.
///
/// On failure the partial workbook is flushed to `<stem>.partial.xlsx` next to
/// `path` and the original error is returned.
pub fn generate_report(
    path: impl AsRef<Path>,
    config: SpecReportConfig,
    dictionary: Option<ColumnDictionary>,
    registry: &DatasetRegistry,
    actions: &[SpecBuildAction],
) -> ReportResult<SpecReportLog> {
    let path = path.as_ref();
    let mut writer = ReportWriter::new(config)?;
    if let Some(dictionary) = dictionary {
        writer.set_column_dictionary(dictionary);
    }
    match run_actions(&mut writer, actions, registry) {
        Ok(()) => writer.close(path),
        Err(err) => {
            let path_partial = derive_partial_path(path);
            match writer.close(&path_partial) {
                Ok(_) => log::warn!(
                    "build failed; partial workbook written to {}",
                    path_partial.display()
                ),
                Err(err_flush) => log::warn!("build failed; partial flush failed: {err_flush}"),
            }
            Err(err)
        }
    }
}

/// `report.xlsx` -> `report.partial.xlsx`.
pub fn derive_partial_path(path: &Path) -> PathBuf {
    path.with_extension("partial.xlsx")
}

fn apply_action(
    writer: &mut ReportWriter,
    action: &SpecBuildAction,
    registry: &DatasetRegistry,
) -> ReportResult<EnumActionOutcome> {
    match action.verb.as_str() {
        "new_sheet" => {
            let params: SpecNewSheetParams = derive_params(action)?;
            writer.new_sheet(&params.name, &params.description)?;
        }
        "skip_rows" => {
            let params: SpecSkipRowsParams = derive_params(action)?;
            writer.skip_rows(params.n);
        }
        "set_cursor" => {
            let params: SpecRowParams = derive_params(action)?;
            writer.set_cursor(params.row);
        }
        "freeze_panes" => {
            let params: SpecFreezeParams = derive_params(action)?;
            writer.freeze_panes(params.row, params.col)?;
        }
        "set_column_mapping" => {
            let params: SpecDatasetParams = derive_params(action)?;
            let df = derive_dataset(registry, &params.dataset)?;
            writer.set_column_dictionary(ColumnDictionary::from_dataframe(df)?);
        }
        "add_title" => {
            let params: SpecTextParams = derive_params(action)?;
            writer.add_title(&params.text, &params.options)?;
        }
        "add_text" => {
            let params: SpecTextParams = derive_params(action)?;
            writer.add_text(&params.text, &params.options)?;
        }
        "add_banner" => {
            let params: SpecBannerParams = derive_params(action)?;
            writer.add_banner(&params.text, &params.options)?;
        }
        "add_logo" => {
            let params: SpecImageParams = derive_params(action)?;
            writer.add_logo(params.path.as_deref(), params.row, params.col)?;
        }
        "add_watermark" => {
            let params: SpecImageParams = derive_params(action)?;
            let Some(path) = params.path else {
                return Err(ReportError::Validation(
                    "add_watermark needs a `path`".to_string(),
                ));
            };
            writer.add_watermark(&path)?;
        }
        "write_table" => {
            let params: SpecWriteTableParams = derive_params(action)?;
            apply_write_table(writer, params, registry)?;
        }
        "write_rich_table" => {
            let params: SpecDatasetParams = derive_params(action)?;
            let df = derive_dataset(registry, &params.dataset)?;
            writer.write_rich_table(df, params.start_col)?;
        }
        "add_conditional_format" => {
            let params: SpecConditionalFormat = derive_params(action)?;
            writer.add_conditional_format(&params)?;
        }
        "add_sparklines" => {
            let params: SpecSparklineParams = derive_params(action)?;
            let source = match (params.values, params.columns) {
                (Some(l_values), None) => EnumSparklineSource::Values(l_values),
                (None, Some(l_cols)) => EnumSparklineSource::Columns(l_cols),
                _ => {
                    return Err(ReportError::Validation(
                        "add_sparklines needs exactly one of `values` or `columns`".to_string(),
                    ));
                }
            };
            writer.add_sparklines(&source, &params.title)?;
        }
        "add_kpi_row" => {
            let params: SpecKpiRowParams = derive_params(action)?;
            apply_kpi_row(writer, params, registry)?;
        }
        "add_chart" => {
            let params: SpecChartParams = derive_params(action)?;
            apply_chart(writer, params, registry)?;
        }
        "add_image_chart" => {
            let params: SpecImageChartParams = derive_params(action)?;
            let v_png = std::fs::read(&params.path)?;
            writer.add_image_chart(&v_png, params.row, params.col)?;
        }
        "add_data_dictionary" => {
            let params: SpecOptionalDatasetParams = derive_params(action)?;
            match params.dataset {
                Some(c_name) => {
                    let df = derive_dataset(registry, &c_name)?;
                    writer.add_data_dictionary(df, params.start_col)?;
                }
                None => writer.add_data_dictionary_from_columns(params.start_col)?,
            }
        }
        "add_definition_list" => {
            let params: SpecDefinitionParams = derive_params(action)?;
            match params.dataset {
                Some(c_name) => {
                    let df = derive_dataset(registry, &c_name)?;
                    writer.add_definition_list(df, &params.options)?;
                }
                None => writer.add_definition_list_from_columns(&params.options)?,
            }
        }
        "generate_toc" => writer.generate_toc()?,
        "close" => return Ok(EnumActionOutcome::Close),
        c_verb => {
            log::debug!("ignoring unknown verb {c_verb:?}");
        }
    }
    Ok(EnumActionOutcome::Continue)
}

fn apply_write_table(
    writer: &mut ReportWriter,
    params: SpecWriteTableParams,
    registry: &DatasetRegistry,
) -> ReportResult<()> {
    let df_source = derive_dataset(registry, &params.dataset)?;
    let cell_style_map = create_style_map(df_source, &params.style_rules)?;
    let df_output = match &params.columns {
        Some(l_cols) => df_source.select(l_cols.iter().map(String::as_str))?,
        None => df_source.clone(),
    };

    let mut column_style_overrides = BTreeMap::new();
    for (c_key, spec) in params.column_style_overrides {
        let n_pos = c_key.trim().parse::<i64>().map_err(|_| {
            ReportError::Validation(format!("column override key {c_key:?} is not an integer"))
        })?;
        column_style_overrides.insert(n_pos, spec);
    }

    let options = SpecTableWriteOptions {
        start_col: params.start_col,
        add_totals: params.add_totals,
        auto_filter: params.auto_filter,
        style_overrides: params.style_overrides,
        column_alignments: params.column_alignments,
        column_style_overrides,
        cell_style_map,
    };
    writer.write_table(&df_output, &options)?;
    Ok(())
}

fn apply_kpi_row(
    writer: &mut ReportWriter,
    params: SpecKpiRowParams,
    registry: &DatasetRegistry,
) -> ReportResult<()> {
    if let Some(c_name) = &params.dataset {
        return writer.add_kpis_from_dataframe(derive_dataset(registry, c_name)?);
    }
    if let Some(dynamic) = params.dynamic {
        let df = derive_dataset(registry, &dynamic.dataset)?;
        let n_value = derive_aggregate(df, &dynamic.column, &dynamic.func)?;
        let mut kpi = SpecKpi::new(dynamic.label, EnumCellValue::Number(n_value));
        kpi.num_format = dynamic.num_format;
        return writer.add_kpi_row(&[kpi]);
    }
    let l_kpis: Vec<SpecKpi> = params
        .kpis
        .into_iter()
        .map(|param| SpecKpi {
            label: param.label,
            value: derive_cell_value_from_json(&param.value),
            num_format: param.num_format,
        })
        .collect();
    writer.add_kpi_row(&l_kpis)
}

fn apply_chart(
    writer: &mut ReportWriter,
    params: SpecChartParams,
    registry: &DatasetRegistry,
) -> ReportResult<()> {
    let mut options = params.options;
    let df = match (&params.dataset, params.aggregate) {
        (Some(c_name), Some(aggregate)) => {
            let df = derive_dataset(registry, c_name)?;
            if options.x_col.is_none() {
                options.x_col = Some(aggregate.group_col.clone());
            }
            if options.y_cols.is_empty() {
                options.y_cols = vec![aggregate.y_col.clone()];
            }
            Some(derive_group_sum(df, &aggregate)?)
        }
        (Some(c_name), None) => Some(derive_dataset(registry, c_name)?.clone()),
        (None, Some(_)) => {
            return Err(ReportError::Validation(
                "chart aggregation needs a `dataset`".to_string(),
            ));
        }
        (None, None) => None,
    };
    writer.add_chart(&options, df.as_ref())?;
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Helpers

fn derive_params<T: DeserializeOwned>(action: &SpecBuildAction) -> ReportResult<T> {
    let params = match &action.params {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|err| {
        ReportError::Validation(format!("invalid parameters for {:?}: {err}", action.verb))
    })
}

fn derive_dataset<'a>(registry: &'a DatasetRegistry, name: &str) -> ReportResult<&'a DataFrame> {
    registry
        .get(name)
        .ok_or_else(|| ReportError::Validation(format!("unknown dataset {name:?}")))
}

fn derive_cell_value_from_json(value: &serde_json::Value) -> EnumCellValue {
    match value {
        serde_json::Value::Null => EnumCellValue::None,
        serde_json::Value::Bool(val) => EnumCellValue::Boolean(*val),
        serde_json::Value::Number(val) => match val.as_f64() {
            Some(n_val) => EnumCellValue::Number(n_val),
            None => EnumCellValue::String(val.to_string()),
        },
        serde_json::Value::String(val) => EnumCellValue::String(val.clone()),
        other => EnumCellValue::String(other.to_string()),
    }
}

/// Aggregate one numeric column: `sum`, `mean`, `count`, `max` or `min`.
///
/// Nulls are ignored; `count` counts non-null cells.
pub fn derive_aggregate(df: &DataFrame, column: &str, func: &str) -> ReportResult<f64> {
    let col = df.column(column).map_err(|_| {
        ReportError::Validation(format!("KPI column {column:?} not found"))
    })?;
    if !col.dtype().is_numeric() {
        return Err(ReportError::Validation(format!(
            "KPI column {column:?} is not numeric"
        )));
    }
    let series = col.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    let n_result = match func.trim().to_lowercase().as_str() {
        "sum" => Some(ca.sum().unwrap_or(0.0)),
        "count" => Some((ca.len() - ca.null_count()) as f64),
        "mean" | "avg" | "average" => ca.mean(),
        "max" => ca.max(),
        "min" => ca.min(),
        other => {
            return Err(ReportError::Validation(format!(
                "unknown aggregation {other:?}"
            )));
        }
    };
    n_result.ok_or_else(|| {
        ReportError::Validation(format!(
            "cannot take {func} of column {column:?} without values"
        ))
    })
}

/// Sum `y_col` per group key, keys sorted; date keys may be bucketed by day,
/// month or year first.
fn derive_group_sum(df: &DataFrame, aggregate: &SpecAggregateParams) -> ReportResult<DataFrame> {
    let col_group = df.column(&aggregate.group_col).map_err(|_| {
        ReportError::Validation(format!("group column {:?} not found", aggregate.group_col))
    })?;
    let col_value = df.column(&aggregate.y_col).map_err(|_| {
        ReportError::Validation(format!("value column {:?} not found", aggregate.y_col))
    })?;
    if !col_value.dtype().is_numeric() {
        return Err(ReportError::Validation(format!(
            "value column {:?} is not numeric",
            aggregate.y_col
        )));
    }

    let mut l_keys: Vec<Option<String>> = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let value_group = derive_cell_value_from_any_value(col_group.get(n_idx_row)?);
        let key = match (&aggregate.freq, &value_group) {
            (_, EnumCellValue::None) => None,
            (Some(c_freq), EnumCellValue::DateTime(n_serial)) => Some(derive_date_bucket(
                *n_serial,
                c_freq,
                aggregate.format.as_deref(),
            )?),
            (Some(_), _) => {
                return Err(ReportError::Validation(format!(
                    "group column {:?} is not a date column",
                    aggregate.group_col
                )));
            }
            (None, value) => Some(value.to_display_text()),
        };
        l_keys.push(key);
    }

    let c_key = aggregate.group_col.as_str();
    let c_value = aggregate.y_col.as_str();
    let df_keyed = DataFrame::new(vec![
        Column::new(c_key.into(), l_keys),
        col_value.cast(&DataType::Float64)?.with_name(c_value.into()),
    ])?;
    Ok(df_keyed
        .lazy()
        .filter(col(c_key).is_not_null())
        .group_by([col(c_key)])
        .agg([col(c_value).sum()])
        .sort([c_key], SortMultipleOptions::default())
        .collect()?)
}

fn derive_date_bucket(n_serial: f64, freq: &str, format: Option<&str>) -> ReportResult<String> {
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)
        .zip(Duration::try_days(n_serial.floor() as i64))
        .and_then(|(date_epoch, duration)| date_epoch.checked_add_signed(duration))
        .ok_or_else(|| ReportError::Validation(format!("date serial {n_serial} is out of range")))?;
    let if_compact = format == Some("YYYYMM");
    let c_pattern = match freq {
        "D" if if_compact => "%Y%m%d",
        "D" => "%Y-%m-%d",
        "M" if if_compact => "%Y%m",
        "M" => "%Y-%m",
        "Y" => "%Y",
        other => {
            return Err(ReportError::Validation(format!(
                "unknown date bucket {other:?}; expected D, M or Y"
            )));
        }
    };
    Ok(date.format(c_pattern).to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::df;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn derive_registry() -> DatasetRegistry {
        let mut registry = DatasetRegistry::new();
        registry.insert(
            "sales".to_string(),
            df!(
                "region" => ["North", "South", "North", "East"],
                "revenue" => [100.0, 250.0, 50.0, 80.0],
                "units" => [1i64, 2, 3, 4],
            )
            .expect("df"),
        );
        registry
    }

    fn derive_writer() -> ReportWriter {
        ReportWriter::new(SpecReportConfig::default()).expect("writer")
    }

    #[test]
    fn queue_round_trips_through_json_and_undoes() {
        let mut queue = ActionQueue::new();
        queue.push(SpecBuildAction::new("add_title", "Title", json!({"text": "Sales"})));
        queue.push(SpecBuildAction::new("skip_rows", "Gap", json!({"n": 2})));
        let c_json = queue.to_json_string().expect("json");
        let mut queue_loaded = ActionQueue::from_json_str(&c_json).expect("queue");
        assert_eq!(queue_loaded, queue);

        let action = queue_loaded.pop_last().expect("last");
        assert_eq!(action.verb, "skip_rows");
        assert_eq!(queue_loaded.len(), 1);
    }

    #[test]
    fn actions_drive_the_writer() {
        let registry = derive_registry();
        let l_actions = vec![
            SpecBuildAction::new("add_title", "", json!({"text": "Sales"})),
            SpecBuildAction::new(
                "write_table",
                "",
                json!({
                    "dataset": "sales",
                    "columns": ["region", "revenue"],
                    "add_totals": true,
                    "column_style_overrides": {"-1": {"bold": true}},
                    "style_rules": [
                        {"target": "revenue", "condition": "units > 2", "style": {"bg_colour": "#FFC7CE"}}
                    ]
                }),
            ),
            SpecBuildAction::new(
                "add_conditional_format",
                "",
                json!({"column": "revenue", "criteria": ">", "value": 90}),
            ),
            SpecBuildAction::new("add_sparklines", "", json!({"columns": ["revenue"]})),
            SpecBuildAction::new("unknown_verb", "", serde_json::Value::Null),
        ];
        let mut writer = derive_writer();
        run_actions(&mut writer, &l_actions, &registry).expect("run");
        assert_eq!(writer.cursor_row(), 1 + 2 + 4 + 3);
        let info = writer.last_table().expect("table");
        assert_eq!(info.columns.len(), 2);
    }

    #[test]
    fn actions_after_close_fail() {
        let l_actions = vec![
            SpecBuildAction::new("close", "", json!({})),
            SpecBuildAction::new("add_title", "", json!({"text": "late"})),
        ];
        let mut writer = derive_writer();
        assert!(matches!(
            run_actions(&mut writer, &l_actions, &DatasetRegistry::new()),
            Err(ReportError::Closed)
        ));
    }

    #[test]
    fn bad_params_and_datasets_are_validation_errors() {
        let mut writer = derive_writer();
        let registry = derive_registry();
        for action in [
            SpecBuildAction::new("add_title", "", json!({"font_size": 12})),
            SpecBuildAction::new("write_table", "", json!({"dataset": "missing"})),
            SpecBuildAction::new("add_sparklines", "", json!({})),
        ] {
            assert!(matches!(
                run_actions(&mut writer, &[action], &registry),
                Err(ReportError::Validation(_))
            ));
        }
    }

    #[test]
    fn failing_build_flushes_partial_workbook() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.xlsx");
        let l_actions = vec![
            SpecBuildAction::new("add_title", "", json!({"text": "Sales"})),
            SpecBuildAction::new(
                "write_table",
                "",
                json!({"dataset": "sales", "style_rules": [{"column": "revenue", "expression": "revenue >"}]}),
            ),
        ];
        let err = generate_report(
            &path,
            SpecReportConfig::default(),
            None,
            &derive_registry(),
            &l_actions,
        )
        .expect_err("invalid rule");
        assert!(matches!(err, ReportError::InvalidExpression { rule_index: 0, .. }));
        assert!(!path.exists());
        assert!(dir.path().join("report.partial.xlsx").exists());
    }

    #[test]
    fn successful_build_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.xlsx");
        let l_actions = vec![
            SpecBuildAction::new("new_sheet", "", json!({"name": "Sales", "description": "By region"})),
            SpecBuildAction::new(
                "add_kpi_row",
                "",
                json!({"dynamic": {"label": "Revenue", "dataset": "sales", "column": "revenue", "func": "sum", "format": "£#,##0"}}),
            ),
            SpecBuildAction::new(
                "add_chart",
                "",
                json!({"title": "Revenue", "kind": "bar", "dataset": "sales", "aggregate": {"group_col": "region", "y_col": "revenue"}}),
            ),
        ];
        let report = generate_report(
            &path,
            SpecReportConfig::default(),
            None,
            &derive_registry(),
            &l_actions,
        )
        .expect("report");
        assert!(path.exists());
        assert_eq!(report.sheets, vec!["Summary", "Sales"]);
    }

    #[test]
    fn aggregates() {
        let registry = derive_registry();
        let df = &registry["sales"];
        assert_eq!(derive_aggregate(df, "revenue", "sum").expect("sum"), 480.0);
        assert_eq!(derive_aggregate(df, "revenue", "mean").expect("mean"), 120.0);
        assert_eq!(derive_aggregate(df, "units", "count").expect("count"), 4.0);
        assert_eq!(derive_aggregate(df, "units", "max").expect("max"), 4.0);
        assert_eq!(derive_aggregate(df, "units", "MIN").expect("min"), 1.0);
        assert!(derive_aggregate(df, "units", "median").is_err());
        assert!(derive_aggregate(df, "nope", "sum").is_err());
        assert!(derive_aggregate(df, "region", "sum").is_err());
    }

    #[test]
    fn group_sum_sorts_keys() {
        let registry = derive_registry();
        let df = derive_group_sum(
            &registry["sales"],
            &SpecAggregateParams {
                group_col: "region".to_string(),
                y_col: "revenue".to_string(),
                freq: None,
                format: None,
            },
        )
        .expect("group");
        assert_eq!(df.height(), 3);
        let l_keys: Vec<String> = (0..3)
            .map(|n_idx| {
                derive_cell_value_from_any_value(df.column("region").expect("col").get(n_idx).expect("get"))
                    .to_display_text()
            })
            .collect();
        assert_eq!(l_keys, vec!["East", "North", "South"]);
        assert_eq!(derive_aggregate(&df, "revenue", "max").expect("max"), 250.0);
    }

    #[test]
    fn date_buckets() {
        // 2024-03-15 is serial 45366.
        assert_eq!(derive_date_bucket(45_366.0, "D", None).expect("d"), "2024-03-15");
        assert_eq!(derive_date_bucket(45_366.5, "M", None).expect("m"), "2024-03");
        assert_eq!(derive_date_bucket(45_366.0, "M", Some("YYYYMM")).expect("m"), "202403");
        assert_eq!(derive_date_bucket(45_366.0, "Y", None).expect("y"), "2024");
        assert!(derive_date_bucket(45_366.0, "W", None).is_err());
        assert_eq!(derive_date_bucket(45_366.0, "D", Some("YYYYMM")).expect("d"), "20240315");
        // Unix epoch
        assert_eq!(derive_date_bucket(25_569.0, "D", None).expect("epoch"), "1970-01-01");
        assert!(derive_date_bucket(1e12, "D", None).is_err());
        assert!(derive_date_bucket(1e20, "D", None).is_err());
    }

    #[test]
    fn partial_path_keeps_directory() {
        assert_eq!(
            derive_partial_path(Path::new("/tmp/out/report.xlsx")),
            PathBuf::from("/tmp/out/report.partial.xlsx")
        );
    }
}
