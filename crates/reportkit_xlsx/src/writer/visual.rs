//! Charts, image charts and KPI cards.

use polars::prelude::DataFrame;
use rust_xlsxwriter::{Chart, ChartFormat, ChartSolidFill, ChartType, Image};

use super::{ReportWriter, SpecChartDataState, validate_text_len, write_cell_with_format};
use crate::conf::{
    C_SHEET_CHART_DATA, N_HEIGHT_CHART, N_HEIGHT_KPI, N_STRIDE_KPI, TUP_CHART_SIZE, derive_default_kpi_label_format,
    derive_default_kpi_value_format,
};
use crate::error::{ReportError, ReportResult};
use crate::spec::{
    EnumCellValue, EnumChartKind, SpecCellFormat, SpecChartOptions, SpecKpi, SpecTableInfo,
};
use crate::style::derive_color;
use crate::util::{
    cast_col_num, cast_row_num, derive_cell_value_from_any_value, derive_fmt_key_for_value,
    derive_heuristic_num_format, derive_range_formula,
};

const N_HEIGHT_KPI_LABEL: f64 = 20.0;
const N_HEIGHT_KPI_VALUE: f64 = 30.0;

impl ReportWriter {
    ////////////////////////////////////////////////////////////////////////////
    // #region Charts

    /// Insert a native chart over `df` or, when `None`, over the last table.
    ///
    /// A supplied dataset is first appended to the hidden `Chart_Data` sheet.
    /// Charts placed at the cursor advance it by a fixed block; charts with an
    /// explicit row only push the cursor below that row.
    pub fn add_chart(
        &mut self,
        options: &SpecChartOptions,
        df: Option<&DataFrame>,
    ) -> ReportResult<SpecTableInfo> {
        if options.y_cols.is_empty() {
            return Err(ReportError::Validation(format!(
                "chart {:?} needs at least one value column",
                options.title
            )));
        }
        let info = match df {
            Some(df) => self.append_chart_data(df)?,
            None => self.require_last_table_rows()?,
        };

        let n_col_x = match &options.x_col {
            Some(c_name) => Some(derive_source_column(&info, c_name)?),
            None => None,
        };
        let color = derive_color(&self.theme.primary_color);
        let n_row_first = cast_row_num(info.row_data_first)?;
        let n_row_last = cast_row_num(info.row_data_last)?;

        let mut chart = Chart::new(derive_chart_type(options.kind));
        for c_name in &options.y_cols {
            let n_col_y = derive_source_column(&info, c_name)?;
            let n_col_y_xlsx = cast_col_num(n_col_y)?;
            let series = chart.add_series();
            series
                .set_name(self.dictionary.display_name(c_name))
                .set_values((
                    info.sheet_name.as_str(),
                    n_row_first,
                    n_col_y_xlsx,
                    n_row_last,
                    n_col_y_xlsx,
                ));
            if let Some(n_col_x) = n_col_x {
                let n_col_x_xlsx = cast_col_num(n_col_x)?;
                series.set_categories((
                    info.sheet_name.as_str(),
                    n_row_first,
                    n_col_x_xlsx,
                    n_row_last,
                    n_col_x_xlsx,
                ));
            }
            if options.kind != EnumChartKind::Pie
                && let Some(color) = color
            {
                series.set_format(
                    ChartFormat::new().set_solid_fill(ChartSolidFill::new().set_color(color)),
                );
            }
            log::debug!(
                "chart {:?} series {c_name:?} <- {}",
                options.title,
                derive_range_formula(&info.sheet_name, n_col_y, info.row_data_first, info.row_data_last)
            );
        }
        chart.title().set_name(options.title.as_str());
        chart.set_width(TUP_CHART_SIZE.0).set_height(TUP_CHART_SIZE.1);

        let n_row_anchor = options.row.unwrap_or(self.sheet.cursor.row());
        let n_col_anchor = options.col.unwrap_or(self.n_col_start);
        self.sheet.worksheet.insert_chart(
            cast_row_num(n_row_anchor)?,
            cast_col_num(n_col_anchor)?,
            &chart,
        )?;
        self.sheet.if_has_content = true;
        match options.row {
            Some(n_row) => self.sheet.cursor.place_at(n_row),
            None => self.sheet.cursor.advance(N_HEIGHT_CHART),
        }
        Ok(info)
    }

    /// Append `df` to the hidden chart data sheet and return its placement.
    pub fn append_chart_data(&mut self, df: &DataFrame) -> ReportResult<SpecTableInfo> {
        if df.height() == 0 || df.width() == 0 {
            return Err(ReportError::Validation(
                "chart dataset is empty".to_string(),
            ));
        }
        if self.chart_data.is_none() {
            self.chart_data = Some(SpecChartDataState::new()?);
        }
        let Some(state) = self.chart_data.as_mut() else {
            return Err(ReportError::Validation(
                "chart data sheet is unavailable".to_string(),
            ));
        };

        let n_row_header = state.row_cursor;
        let info = SpecTableInfo {
            sheet_name: C_SHEET_CHART_DATA.to_string(),
            row_header: n_row_header,
            row_data_first: n_row_header + 1,
            row_data_last: n_row_header + df.height(),
            col_start: 0,
            columns: df
                .get_column_names_str()
                .into_iter()
                .enumerate()
                .map(|(n_idx, c_name)| (c_name.to_string(), n_idx))
                .collect(),
        };

        for (n_idx_col, col) in df.get_columns().iter().enumerate() {
            let n_col = cast_col_num(n_idx_col)?;
            state
                .worksheet
                .write_string(cast_row_num(n_row_header)?, n_col, col.name().as_str())?;
            for n_idx_row in 0..df.height() {
                let n_row = cast_row_num(info.row_data_first + n_idx_row)?;
                match derive_cell_value_from_any_value(col.get(n_idx_row)?) {
                    EnumCellValue::None => {}
                    EnumCellValue::String(val) => {
                        state.worksheet.write_string(n_row, n_col, val)?;
                    }
                    EnumCellValue::Number(val) | EnumCellValue::DateTime(val) => {
                        state.worksheet.write_number(n_row, n_col, val)?;
                    }
                    EnumCellValue::Boolean(val) => {
                        state.worksheet.write_boolean(n_row, n_col, val)?;
                    }
                }
            }
        }
        state.row_cursor += df.height() + 2;
        Ok(info)
    }

    /// Insert a pre-rendered PNG chart.
    pub fn add_image_chart(
        &mut self,
        v_png: &[u8],
        row: Option<usize>,
        col: Option<usize>,
    ) -> ReportResult<()> {
        let image = Image::new_from_buffer(v_png)?;
        let n_row_anchor = row.unwrap_or(self.sheet.cursor.row());
        let n_col_anchor = col.unwrap_or(self.n_col_start);
        self.sheet.worksheet.insert_image(
            cast_row_num(n_row_anchor)?,
            cast_col_num(n_col_anchor)?,
            &image,
        )?;
        self.sheet.if_has_content = true;
        match row {
            Some(n_row) => self.sheet.cursor.place_at(n_row),
            None => self.sheet.cursor.advance(N_HEIGHT_CHART),
        }
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Kpi

    /// One row of KPI cards: a label strip over a large value, 3 columns apart.
    pub fn add_kpi_row(&mut self, kpis: &[SpecKpi]) -> ReportResult<()> {
        if kpis.is_empty() {
            return Ok(());
        }
        for (n_idx, kpi) in kpis.iter().enumerate() {
            validate_text_len(self.dictionary.display_name(&kpi.label), "kpi label", n_idx)?;
            if let EnumCellValue::String(c_value) = &kpi.value {
                validate_text_len(c_value, "kpi value", n_idx)?;
            }
        }
        let n_row_label = self.sheet.cursor.row();
        let n_row_value = n_row_label + 1;
        let format_label = self
            .resolver
            .format_for(&derive_default_kpi_label_format());
        let spec_value_base = derive_default_kpi_value_format(&self.theme.primary_color);

        self.sheet
            .worksheet
            .set_row_height(cast_row_num(n_row_label)?, N_HEIGHT_KPI_LABEL)?;
        self.sheet
            .worksheet
            .set_row_height(cast_row_num(n_row_value)?, N_HEIGHT_KPI_VALUE)?;

        for (n_idx, kpi) in kpis.iter().enumerate() {
            let n_col_first = self.n_col_start + n_idx * N_STRIDE_KPI;
            let n_col_last = n_col_first + 1;
            let num_format = kpi
                .num_format
                .clone()
                .or_else(|| self.dictionary.num_format(&kpi.label).map(ToString::to_string))
                .or_else(|| {
                    derive_heuristic_num_format(
                        derive_fmt_key_for_value(&kpi.label, &kpi.value),
                        &self.theme,
                    )
                });
            let format_value = self.resolver.resolve([
                &spec_value_base,
                &SpecCellFormat {
                    num_format,
                    ..Default::default()
                },
            ]);

            self.sheet.worksheet.merge_range(
                cast_row_num(n_row_label)?,
                cast_col_num(n_col_first)?,
                cast_row_num(n_row_label)?,
                cast_col_num(n_col_last)?,
                self.dictionary.display_name(&kpi.label),
                &format_label,
            )?;
            self.sheet.worksheet.merge_range(
                cast_row_num(n_row_value)?,
                cast_col_num(n_col_first)?,
                cast_row_num(n_row_value)?,
                cast_col_num(n_col_last)?,
                "",
                &format_value,
            )?;
            write_cell_with_format(
                &mut self.sheet.worksheet,
                n_row_value,
                n_col_first,
                &kpi.value,
                &format_value,
            )?;
        }
        self.sheet.if_has_content = true;
        self.sheet.cursor.advance(N_HEIGHT_KPI);
        Ok(())
    }

    /// KPI row from the first row of `df`, one card per column.
    pub fn add_kpis_from_dataframe(&mut self, df: &DataFrame) -> ReportResult<()> {
        if df.height() == 0 {
            return Err(ReportError::Validation(
                "KPI dataset has no rows".to_string(),
            ));
        }
        let mut l_kpis = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            l_kpis.push(SpecKpi::new(
                col.name().as_str(),
                derive_cell_value_from_any_value(col.get(0)?),
            ));
        }
        self.add_kpi_row(&l_kpis)
    }

    // #endregion
}

fn derive_chart_type(kind: EnumChartKind) -> ChartType {
    match kind {
        EnumChartKind::Column => ChartType::Column,
        EnumChartKind::Bar => ChartType::Bar,
        EnumChartKind::Line => ChartType::Line,
        EnumChartKind::Pie => ChartType::Pie,
        EnumChartKind::Scatter => ChartType::Scatter,
    }
}

fn derive_source_column(info: &SpecTableInfo, c_name: &str) -> ReportResult<usize> {
    info.column_index(c_name).ok_or_else(|| {
        ReportError::Reference(format!(
            "chart column {c_name:?} is not part of the source table on sheet {:?}",
            info.sheet_name
        ))
    })
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::config::SpecReportConfig;
    use crate::spec::SpecTableWriteOptions;

    fn derive_writer() -> ReportWriter {
        ReportWriter::new(SpecReportConfig::default()).expect("writer")
    }

    fn derive_options(y_cols: &[&str]) -> SpecChartOptions {
        SpecChartOptions {
            title: "Revenue".to_string(),
            x_col: Some("region".to_string()),
            y_cols: y_cols.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn chart_over_dataset_uses_hidden_sheet() {
        let mut writer = derive_writer();
        let df = df!("region" => ["N", "S"], "revenue" => [1.0, 2.0]).expect("df");

        let info = writer
            .add_chart(&derive_options(&["revenue"]), Some(&df))
            .expect("chart");
        assert_eq!(info.sheet_name, "Chart_Data");
        assert_eq!((info.row_header, info.row_data_first, info.row_data_last), (0, 1, 2));
        assert_eq!(writer.cursor_row(), 1 + N_HEIGHT_CHART);

        let info = writer
            .add_chart(&derive_options(&["revenue"]), Some(&df))
            .expect("chart");
        assert_eq!(info.row_header, 4);
        assert_eq!(
            derive_range_formula(&info.sheet_name, 1, info.row_data_first, info.row_data_last),
            "='Chart_Data'!$B$6:$B$7"
        );
    }

    #[test]
    fn chart_over_last_table_and_explicit_row() {
        let mut writer = derive_writer();
        let df = df!("region" => ["N", "S", "E"], "revenue" => [1.0, 2.0, 3.0]).expect("df");
        writer
            .write_table(&df, &SpecTableWriteOptions::default())
            .expect("table");
        assert_eq!(writer.cursor_row(), 6);

        let mut options = derive_options(&["revenue"]);
        options.row = Some(2);
        options.col = Some(8);
        let info = writer.add_chart(&options, None).expect("chart");
        assert_eq!(info.sheet_name, "Summary");
        assert_eq!(writer.cursor_row(), 6);

        options.row = Some(30);
        writer.add_chart(&options, None).expect("chart");
        assert_eq!(writer.cursor_row(), 31);
    }

    #[test]
    fn chart_errors() {
        let mut writer = derive_writer();
        assert!(matches!(
            writer.add_chart(&derive_options(&[]), None),
            Err(ReportError::Validation(_))
        ));
        assert!(matches!(
            writer.add_chart(&derive_options(&["revenue"]), None),
            Err(ReportError::Reference(_))
        ));
        let df = df!("region" => ["N"], "revenue" => [1.0]).expect("df");
        assert!(matches!(
            writer.add_chart(&derive_options(&["profit"]), Some(&df)),
            Err(ReportError::Reference(_))
        ));
        let df_empty = df.head(Some(0));
        assert!(matches!(
            writer.add_chart(&derive_options(&["revenue"]), Some(&df_empty)),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn kpi_row_advances_four_rows() {
        let mut writer = derive_writer();
        writer
            .add_kpi_row(&[
                SpecKpi::new("total_revenue", EnumCellValue::Number(12_500.0)),
                SpecKpi::new("conversion_rate", EnumCellValue::Number(0.125)),
                SpecKpi::new("status", EnumCellValue::String("On track".to_string())),
            ])
            .expect("kpis");
        assert_eq!(writer.cursor_row(), 1 + N_HEIGHT_KPI);

        let df = df!("orders" => [10i64, 99], "margin_pct" => [0.2, 0.3]).expect("df");
        writer.add_kpis_from_dataframe(&df).expect("kpis");
        assert_eq!(writer.cursor_row(), 1 + 2 * N_HEIGHT_KPI);

        assert!(matches!(
            writer.add_kpis_from_dataframe(&df.head(Some(0))),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn oversized_kpi_text_fails_before_writing() {
        let mut writer = derive_writer();
        let c_long = "k".repeat(crate::conf::N_LEN_EXCEL_CELL_TEXT_MAX + 1);
        let result = writer.add_kpi_row(&[
            SpecKpi::new("orders", EnumCellValue::Number(3.0)),
            SpecKpi::new(c_long.as_str(), EnumCellValue::Number(1.0)),
        ]);
        match result {
            Err(ReportError::CellLimit { column, row, .. }) => {
                assert_eq!(column, "kpi label");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(writer.cursor_row(), 1);
    }

    #[test]
    fn image_chart_rejects_non_images() {
        let mut writer = derive_writer();
        assert!(writer.add_image_chart(b"not a png", None, None).is_err());
        assert_eq!(writer.cursor_row(), 1);
    }
}
