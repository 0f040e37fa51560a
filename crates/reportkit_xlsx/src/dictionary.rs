//! Column key → display name / number format / description lookup.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, DataFrame};

use crate::error::{ReportError, ReportResult};

/// Key column of a dictionary dataset.
pub const C_COL_DICT_KEY: &str = "column_name";
/// Display-name column of a dictionary dataset.
pub const C_COL_DICT_DISPLAY: &str = "display_name";
/// Optional number-format column of a dictionary dataset.
pub const C_COL_DICT_FORMAT: &str = "excel_format";
/// Optional description column of a dictionary dataset.
pub const C_COL_DICT_DESCRIPTION: &str = "description";

/// One dictionary row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnEntry {
    /// Display name shown in headers and KPI labels.
    pub display_name: String,
    /// Explicit number format.
    pub num_format: Option<String>,
    /// Business definition used by data dictionary appendices.
    pub description: Option<String>,
}

/// Total lookup from internal column keys to presentation metadata.
///
/// Missing keys resolve to themselves; nothing here ever fails after loading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnDictionary {
    dict_entries: BTreeMap<String, SpecColumnEntry>,
}

impl ColumnDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a dataset with `column_name`, `display_name` and optional
    /// `excel_format`/`description` columns.
    pub fn from_dataframe(df: &DataFrame) -> ReportResult<Self> {
        let l_colnames = df.get_column_names_str();
        for c_required in [C_COL_DICT_KEY, C_COL_DICT_DISPLAY] {
            if !l_colnames.contains(&c_required) {
                return Err(ReportError::Validation(format!(
                    "column dictionary is missing required column {c_required:?}"
                )));
            }
        }
        let col_key = df.column(C_COL_DICT_KEY)?;
        let col_display = df.column(C_COL_DICT_DISPLAY)?;
        let col_format = df.column(C_COL_DICT_FORMAT).ok();
        let col_description = df.column(C_COL_DICT_DESCRIPTION).ok();

        let mut dictionary = Self::new();
        for n_idx_row in 0..df.height() {
            let Some(c_key) = derive_optional_text(col_key.get(n_idx_row)?) else {
                continue;
            };
            let c_display =
                derive_optional_text(col_display.get(n_idx_row)?).unwrap_or_else(|| c_key.clone());
            let num_format = match col_format {
                Some(col) => derive_optional_text(col.get(n_idx_row)?),
                None => None,
            };
            let description = match col_description {
                Some(col) => derive_optional_text(col.get(n_idx_row)?),
                None => None,
            };
            dictionary.insert(
                c_key,
                SpecColumnEntry {
                    display_name: c_display,
                    num_format,
                    description,
                },
            );
        }
        log::debug!("loaded column dictionary with {} entries", dictionary.len());
        Ok(dictionary)
    }

    /// Register or replace one entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: SpecColumnEntry) {
        self.dict_entries.insert(key.into(), entry);
    }

    /// Builder-style variant of [`Self::insert`] for display name + format.
    pub fn with_entry(
        mut self,
        key: impl Into<String>,
        display_name: impl Into<String>,
        num_format: Option<&str>,
    ) -> Self {
        self.insert(
            key,
            SpecColumnEntry {
                display_name: display_name.into(),
                num_format: num_format.map(ToString::to_string),
                description: None,
            },
        );
        self
    }

    /// Display name for `key`; falls back to the key itself.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.dict_entries
            .get(key)
            .map(|entry| entry.display_name.as_str())
            .unwrap_or(key)
    }

    /// Registered number format for `key`.
    pub fn num_format(&self, key: &str) -> Option<&str> {
        self.dict_entries.get(key)?.num_format.as_deref()
    }

    /// Registered description for `key`.
    pub fn description(&self, key: &str) -> Option<&str> {
        self.dict_entries.get(key)?.description.as_deref()
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SpecColumnEntry)> {
        self.dict_entries
            .iter()
            .map(|(c_key, entry)| (c_key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.dict_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_entries.is_empty()
    }
}

fn derive_optional_text(value: AnyValue<'_>) -> Option<String> {
    let c_text = match value {
        AnyValue::Null => return None,
        AnyValue::String(val) => val.to_string(),
        AnyValue::StringOwned(val) => val.to_string(),
        other => other.to_string(),
    };
    let c_text = c_text.trim();
    if c_text.is_empty() {
        None
    } else {
        Some(c_text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn lookups_are_total() {
        let dictionary = ColumnDictionary::new().with_entry("revenue", "Revenue (£)", Some("£#,##0"));
        assert_eq!(dictionary.display_name("revenue"), "Revenue (£)");
        assert_eq!(dictionary.display_name("region"), "region");
        assert_eq!(dictionary.num_format("revenue"), Some("£#,##0"));
        assert_eq!(dictionary.num_format("region"), None);
        assert_eq!(dictionary.description("region"), None);
    }

    #[test]
    fn loads_from_dataframe_with_optional_columns() {
        let df = df!(
            "column_name" => ["region", "revenue", ""],
            "display_name" => [Some("Region"), None, Some("Ignored")],
            "excel_format" => [None, Some("£#,##0"), None],
        )
        .expect("df");

        let dictionary = ColumnDictionary::from_dataframe(&df).expect("dictionary");
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.display_name("region"), "Region");
        assert_eq!(dictionary.display_name("revenue"), "revenue");
        assert_eq!(dictionary.num_format("revenue"), Some("£#,##0"));
    }

    #[test]
    fn missing_key_column_is_a_validation_error() {
        let df = df!("name" => ["a"]).expect("df");
        assert!(matches!(
            ColumnDictionary::from_dataframe(&df),
            Err(ReportError::Validation(_))
        ));
    }
}
