//! Two-level report configuration and the theme derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conf::{C_NUM_FORMAT_CURRENCY, C_NUM_FORMAT_DATE, C_THEME_COLOR_DEFAULT};
use crate::error::ReportResult;
use crate::spec::SpecCellFormat;

/// Config component holding workbook-wide settings.
pub const C_COMPONENT_GLOBAL: &str = "Global";
/// Config component for titles.
pub const C_COMPONENT_HEADER: &str = "Header";
/// Config component for the logo image.
pub const C_COMPONENT_LOGO: &str = "Logo";
/// Config component for data dictionary appendices.
pub const C_COMPONENT_DATA_DICT: &str = "DataDict";
/// Config component for table rendering.
pub const C_COMPONENT_DATAFRAME: &str = "DataFrame";

/// Components that are not style profiles.
const TUP_COMPONENTS_RESERVED: [&str; 5] = [
    C_COMPONENT_GLOBAL,
    C_COMPONENT_HEADER,
    C_COMPONENT_LOGO,
    C_COMPONENT_DATA_DICT,
    C_COMPONENT_DATAFRAME,
];

////////////////////////////////////////////////////////////////////////////////
// #region ReportConfig

/// Nested `component -> key -> value` configuration.
///
/// Every accessor is total: absent components or keys yield `None`/defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecReportConfig {
    components: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl SpecReportConfig {
    /// Parse config from a JSON object of objects.
    pub fn from_json_str(text: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build config from flat `(component, key, value)` rows.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let mut config = SpecReportConfig::default();
        for (component, key, value) in rows {
            let c_value: String = value.into();
            config.set(component, key, c_value);
        }
        config
    }

    /// Insert or replace one setting.
    pub fn set(
        &mut self,
        component: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) {
        self.components
            .entry(component.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Component names in sorted order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Raw string view of a setting. Numbers and booleans are stringified.
    pub fn get_str(&self, component: &str, key: &str) -> Option<String> {
        let value = self.components.get(component)?.get(key)?;
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// First present setting among `keys`; used for `colour`/`color` spellings.
    pub fn get_str_any(&self, component: &str, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_str(component, key))
    }

    /// Numeric setting; unparsable values are treated as absent.
    pub fn get_f64(&self, component: &str, key: &str) -> Option<f64> {
        self.get_str(component, key)?.trim().parse::<f64>().ok()
    }

    /// Non-negative integer setting.
    pub fn get_usize(&self, component: &str, key: &str) -> Option<usize> {
        let n_val = self.get_f64(component, key)?;
        if n_val.is_finite() && n_val >= 0.0 {
            Some(n_val as usize)
        } else {
            None
        }
    }

    /// Boolean setting accepting `true/false`, `1/0`, `yes/no` and `2` (hide-all).
    pub fn get_bool(&self, component: &str, key: &str) -> Option<bool> {
        let c_val = self.get_str(component, key)?.trim().to_ascii_lowercase();
        match c_val.as_str() {
            "true" | "1" | "2" | "yes" | "y" => Some(true),
            "false" | "0" | "no" | "n" => Some(false),
            _ => None,
        }
    }

    /// Partial format described by one component's style keys.
    pub fn derive_component_format(&self, component: &str) -> SpecCellFormat {
        SpecCellFormat {
            font_name: self.get_str(component, "font_name"),
            font_size: self.get_f64(component, "font_size").map(|n| n.round() as i64),
            bold: self.get_bool(component, "bold"),
            italic: self.get_bool(component, "italic"),
            underline: self.get_bool(component, "underline"),
            align: self.get_str(component, "align"),
            valign: self.get_str(component, "valign"),
            border: self.get_f64(component, "border").map(|n| n as i64),
            text_wrap: self.get_bool(component, "text_wrap"),
            num_format: self.get_str(component, "num_format"),
            bg_color: self.get_str_any(component, &["bg_colour", "bg_color"]),
            font_color: self.get_str_any(component, &["font_colour", "font_color"]),
            border_color: self.get_str_any(component, &["border_colour", "border_color"]),
            ..Default::default()
        }
    }

    /// Header-cell layer of the `DataFrame` component.
    pub fn derive_table_header_format(&self) -> SpecCellFormat {
        SpecCellFormat {
            bg_color: self.get_str_any(
                C_COMPONENT_DATAFRAME,
                &["header_bg_colour", "header_bg_color"],
            ),
            font_color: self.get_str_any(
                C_COMPONENT_DATAFRAME,
                &["header_font_colour", "header_font_color"],
            ),
            border_color: self.get_str_any(
                C_COMPONENT_DATAFRAME,
                &["border_colour", "border_color"],
            ),
            font_size: self
                .get_f64(C_COMPONENT_DATAFRAME, "font_size")
                .map(|n| n.round() as i64),
            ..Default::default()
        }
    }

    /// Body-cell layer of the `DataFrame` component.
    pub fn derive_table_body_format(&self) -> SpecCellFormat {
        SpecCellFormat {
            border_color: self.get_str_any(
                C_COMPONENT_DATAFRAME,
                &["border_colour", "border_color"],
            ),
            font_size: self
                .get_f64(C_COMPONENT_DATAFRAME, "font_size")
                .map(|n| n.round() as i64),
            font_name: self.get_str(C_COMPONENT_DATAFRAME, "font_name"),
            ..Default::default()
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Theme

/// Background/foreground pair of a named style profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecStyleProfile {
    /// Background color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
    /// Full partial format of the profile component.
    pub format: SpecCellFormat,
}

/// Global theme. Immutable after writer construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTheme {
    /// Primary color used by headers, titles and KPI values.
    pub primary_color: String,
    /// Currency number format for heuristic formatting.
    pub currency_format: String,
    /// Date number format for date-typed values.
    pub date_format: String,
    /// Named style profiles (`Warning`, `Guidance`, ...).
    pub profiles: BTreeMap<String, SpecStyleProfile>,
}

impl SpecTheme {
    /// Derive theme from config; `primary_color` is used when config has none.
    pub fn from_config(config: &SpecReportConfig, primary_color: Option<&str>) -> Self {
        let primary_color = config
            .get_str_any(C_COMPONENT_GLOBAL, &["primary_colour", "primary_color"])
            .or_else(|| primary_color.map(ToString::to_string))
            .unwrap_or_else(|| C_THEME_COLOR_DEFAULT.to_string());

        let mut profiles = BTreeMap::new();
        for component in config.component_names() {
            if TUP_COMPONENTS_RESERVED.contains(&component) {
                continue;
            }
            let format = config.derive_component_format(component);
            profiles.insert(
                component.to_string(),
                SpecStyleProfile {
                    bg_color: format.bg_color.clone(),
                    font_color: format.font_color.clone(),
                    format,
                },
            );
        }

        SpecTheme {
            primary_color,
            currency_format: config
                .get_str(C_COMPONENT_GLOBAL, "currency_format")
                .unwrap_or_else(|| C_NUM_FORMAT_CURRENCY.to_string()),
            date_format: config
                .get_str(C_COMPONENT_GLOBAL, "default_date_format")
                .unwrap_or_else(|| C_NUM_FORMAT_DATE.to_string()),
            profiles,
        }
    }

    /// Resolve a style profile; unknown names fall back to the primary color on white text.
    pub fn profile(&self, name: &str) -> SpecStyleProfile {
        self.profiles
            .get(name)
            .cloned()
            .unwrap_or_else(|| SpecStyleProfile {
                bg_color: Some(self.primary_color.clone()),
                font_color: Some("#FFFFFF".to_string()),
                format: SpecCellFormat::default(),
            })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_components_and_keys_fall_back_silently() {
        let config = SpecReportConfig::default();
        assert_eq!(config.get_str("Header", "font_size"), None);
        assert_eq!(config.get_bool("Global", "hide_gridlines"), None);
        assert!(config.derive_component_format("Nope").is_empty());

        let theme = SpecTheme::from_config(&config, None);
        assert_eq!(theme.primary_color, C_THEME_COLOR_DEFAULT);
        assert_eq!(theme.date_format, C_NUM_FORMAT_DATE);
    }

    #[test]
    fn config_from_json_accepts_strings_and_primitives() {
        let config = SpecReportConfig::from_json_str(
            r##"{
                "Global": {"primary_colour": "#2C3E50", "hide_gridlines": "2", "start_row": 3},
                "Header": {"font_size": "20", "font_colour": "#2C3E50"},
                "Warning": {"bg_colour": "#E74C3C", "font_colour": "#FFFFFF", "bold": true}
            }"##,
        )
        .expect("config json");

        assert_eq!(config.get_bool("Global", "hide_gridlines"), Some(true));
        assert_eq!(config.get_usize("Global", "start_row"), Some(3));
        assert_eq!(config.derive_component_format("Header").font_size, Some(20));

        let theme = SpecTheme::from_config(&config, Some("#111111"));
        assert_eq!(theme.primary_color, "#2C3E50");
        let profile = theme.profile("Warning");
        assert_eq!(profile.bg_color.as_deref(), Some("#E74C3C"));
        assert_eq!(profile.format.bold, Some(true));
        assert!(!theme.profiles.contains_key("Header"));
    }

    #[test]
    fn config_from_rows_builds_nested_mapping() {
        let config = SpecReportConfig::from_rows(vec![
            ("Global", "primary_color", "#D30731"),
            ("Logo", "width_scale", "0.5"),
        ]);
        assert_eq!(config.get_f64("Logo", "width_scale"), Some(0.5));
        let theme = SpecTheme::from_config(&config, None);
        assert_eq!(theme.primary_color, "#D30731");
        assert_eq!(
            theme.profile("Unknown").bg_color.as_deref(),
            Some("#D30731")
        );
    }
}
