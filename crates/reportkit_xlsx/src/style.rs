//! Layered style resolution and `rust_xlsxwriter::Format` caching.

use std::collections::HashMap;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatUnderline};

use crate::spec::SpecCellFormat;

////////////////////////////////////////////////////////////////////////////////
// #region LayerFold

/// Fold partial formats left to right; later layers win per attribute.
///
/// Layer order is, by convention: engine defaults, component config,
/// call-site overrides, column override, per-cell rule style.
pub fn resolve_layers<'a, I>(layers: I) -> SpecCellFormat
where
    I: IntoIterator<Item = &'a SpecCellFormat>,
{
    layers
        .into_iter()
        .fold(SpecCellFormat::default(), |acc, layer| acc.merge(layer))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Resolver

/// Resolves layered formats and shares one `Format` per unique attribute set.
#[derive(Debug, Default)]
pub struct StyleResolver {
    dict_cache: HashMap<SpecCellFormat, Format>,
}

impl StyleResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `layers` and return the shared workbook format.
    pub fn resolve<'a, I>(&mut self, layers: I) -> Format
    where
        I: IntoIterator<Item = &'a SpecCellFormat>,
    {
        let spec = resolve_layers(layers);
        self.format_for(&spec)
    }

    /// Return the cached workbook format for an already-resolved spec.
    pub fn format_for(&mut self, spec: &SpecCellFormat) -> Format {
        if let Some(format) = self.dict_cache.get(spec) {
            return format.clone();
        }
        let format = derive_rust_xlsx_format(spec);
        self.dict_cache.insert(spec.clone(), format.clone());
        format
    }

    /// Number of distinct formats created so far.
    pub fn cache_len(&self) -> usize {
        self.dict_cache.len()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

/// Convert a resolved spec into a `rust_xlsxwriter` format.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if spec.underline.unwrap_or(false) {
        format = format.set_underline(FormatUnderline::Single);
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(color) = spec.bg_color.as_deref().and_then(derive_color) {
        format = format.set_background_color(color);
    }
    if let Some(color) = spec.font_color.as_deref().and_then(derive_color) {
        format = format.set_font_color(color);
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if let Some(val) = spec.left {
        format = format.set_border_left(derive_format_border(val));
    }
    if let Some(val) = spec.right {
        format = format.set_border_right(derive_format_border(val));
    }
    if let Some(color) = spec.border_color.as_deref().and_then(derive_color) {
        format = format.set_border_color(color);
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

/// Normalize `#RRGGBB`, `RRGGBB`, `AARRGGBB` or a basic color name to `#RRGGBB`.
pub fn normalize_hex_color(color: &str) -> Option<String> {
    let c_val = color.trim();
    let c_named = match c_val.to_ascii_lowercase().as_str() {
        "white" => Some("FFFFFF"),
        "black" => Some("000000"),
        "red" => Some("FF0000"),
        "green" => Some("008000"),
        "blue" => Some("0000FF"),
        "yellow" => Some("FFFF00"),
        "orange" => Some("FFA500"),
        "purple" => Some("800080"),
        "gray" | "grey" => Some("808080"),
        _ => None,
    };
    let c_hex = match c_named {
        Some(hex) => hex.to_string(),
        None => c_val.trim_start_matches('#').to_ascii_uppercase(),
    };
    let c_hex = if c_hex.len() == 8 && c_hex.is_ascii() {
        c_hex[2..].to_string()
    } else {
        c_hex
    };
    if c_hex.len() == 6 && c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        Some(format!("#{c_hex}"))
    } else {
        None
    }
}

/// Parse a color string into a workbook color; invalid input yields `None`.
pub fn derive_color(color: &str) -> Option<Color> {
    let c_hex = normalize_hex_color(color)?;
    u32::from_str_radix(&c_hex[1..], 16).ok().map(Color::RGB)
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        0 => FormatBorder::None,
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" | "centre" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
