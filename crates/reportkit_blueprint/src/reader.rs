//! Minimal XLSX grid reader.
//!
//! Reads only what the decompiler needs: sheet order and visibility, cell
//! values (cached formula results included), merged ranges, gridline state,
//! and the font/fill/number-format part of each cell style.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{BlueprintError, BlueprintResult};

////////////////////////////////////////////////////////////////////////////////
// #region Model

/// Decoded cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumGridValue {
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl EnumGridValue {
    /// Text shown for this value in generated scripts.
    pub fn to_display_text(&self) -> String {
        match self {
            EnumGridValue::Text(text) => text.clone(),
            EnumGridValue::Number(n_val) if n_val.fract() == 0.0 && n_val.abs() < 1e15 => {
                format!("{}", *n_val as i64)
            }
            EnumGridValue::Number(n_val) => n_val.to_string(),
            EnumGridValue::Boolean(val) => val.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EnumGridValue::Number(n_val) => Some(*n_val),
            _ => None,
        }
    }
}

/// Style attributes the decompiler reads back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellStyle {
    /// Font color as `#RRGGBB`.
    pub font_color: Option<String>,
    /// Solid fill color as `#RRGGBB`.
    pub fill_color: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    /// Custom number format code.
    pub num_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecGridCell {
    pub value: EnumGridValue,
    pub style: SpecCellStyle,
    /// Formula text without the leading `=`.
    pub formula: Option<String>,
}

/// Inclusive 0-based merged range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecMergeRange {
    pub row_first: usize,
    pub col_first: usize,
    pub row_last: usize,
    pub col_last: usize,
}

impl SpecMergeRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_first..=self.row_last).contains(&row)
            && (self.col_first..=self.col_last).contains(&col)
    }
}

/// One worksheet as a sparse 0-based grid.
#[derive(Debug, Clone, Default)]
pub struct SpecSheetGrid {
    pub name: String,
    pub if_hidden: bool,
    pub if_gridlines_hidden: bool,
    /// One past the last populated row.
    pub n_rows: usize,
    /// One past the last populated column.
    pub n_cols: usize,
    cells: BTreeMap<(usize, usize), SpecGridCell>,
    pub merges: Vec<SpecMergeRange>,
}

impl SpecSheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&SpecGridCell> {
        self.cells.get(&(row, col))
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&EnumGridValue> {
        self.cell(row, col).map(|cell| &cell.value)
    }

    pub fn if_has_value(&self, row: usize, col: usize) -> bool {
        self.cells.contains_key(&(row, col))
    }

    /// Store a value; empty text is treated as an empty cell.
    pub fn set_cell(&mut self, row: usize, col: usize, cell: SpecGridCell) {
        if matches!(&cell.value, EnumGridValue::Text(text) if text.is_empty()) {
            return;
        }
        self.n_rows = self.n_rows.max(row + 1);
        self.n_cols = self.n_cols.max(col + 1);
        self.cells.insert((row, col), cell);
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: EnumGridValue) {
        self.set_cell(
            row,
            col,
            SpecGridCell {
                value,
                style: SpecCellStyle::default(),
                formula: None,
            },
        );
    }

    pub fn if_merged(&self, row: usize, col: usize) -> bool {
        self.merges.iter().any(|rng| rng.contains(row, col))
    }

    /// Populated cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = ((usize, usize), &SpecGridCell)> {
        self.cells.iter().map(|(key, cell)| (*key, cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// All worksheets of a workbook, in tab order.
#[derive(Debug, Clone, Default)]
pub struct SpecWorkbookGrid {
    pub sheets: Vec<SpecSheetGrid>,
}

impl SpecWorkbookGrid {
    pub fn sheet(&self, name: &str) -> Option<&SpecSheetGrid> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Entry

pub fn read_workbook_file(path: impl AsRef<Path>) -> BlueprintResult<SpecWorkbookGrid> {
    let file = File::open(path)?;
    read_workbook(file)
}

pub fn read_workbook_bytes(bytes: &[u8]) -> BlueprintResult<SpecWorkbookGrid> {
    read_workbook(Cursor::new(bytes))
}

/// Read every worksheet of an XLSX package.
pub fn read_workbook<R: Read + Seek>(reader: R) -> BlueprintResult<SpecWorkbookGrid> {
    let mut archive = zip::ZipArchive::new(reader)?;
    if archive.by_name("[Content_Types].xml").is_err() {
        return Err(BlueprintError::InvalidFormat(
            "missing [Content_Types].xml".to_string(),
        ));
    }

    let l_shared_strings = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(bytes) => parse_shared_strings(&bytes)?,
        None => Vec::new(),
    };
    let l_styles = match read_part(&mut archive, "xl/styles.xml")? {
        Some(bytes) => parse_styles(&bytes)?,
        None => Vec::new(),
    };
    let bytes_workbook = read_part(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| BlueprintError::MissingPart("xl/workbook.xml".to_string()))?;
    let l_sheet_entries = parse_workbook_sheets(&bytes_workbook)?;
    let bytes_rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?
        .ok_or_else(|| BlueprintError::MissingPart("xl/_rels/workbook.xml.rels".to_string()))?;
    let dict_sheet_paths = parse_workbook_rels(&bytes_rels)?;

    let mut workbook = SpecWorkbookGrid::default();
    for entry in l_sheet_entries {
        let c_path = dict_sheet_paths
            .get(&entry.rel_id)
            .ok_or_else(|| BlueprintError::MissingPart(format!("relationship {}", entry.rel_id)))?;
        let bytes_sheet = read_part(&mut archive, c_path)?
            .ok_or_else(|| BlueprintError::MissingPart(c_path.clone()))?;
        let mut grid = SpecSheetGrid::new(entry.name);
        grid.if_hidden = entry.if_hidden;
        parse_worksheet(&bytes_sheet, &l_shared_strings, &l_styles, &mut grid)?;
        log::debug!(
            "read sheet {:?}: {} cells, {} merges",
            grid.name,
            grid.len(),
            grid.merges.len()
        );
        workbook.sheets.push(grid);
    }
    Ok(workbook)
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
) -> BlueprintResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parts

fn parse_shared_strings(bytes: &[u8]) -> BlueprintResult<Vec<String>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(false);

    let mut buf = Vec::new();
    let mut l_strings = Vec::new();
    let mut c_current = String::new();
    let mut if_in_si = false;
    let mut if_in_t = false;
    let mut if_in_phonetic = false;

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => {
                    if_in_si = true;
                    c_current.clear();
                }
                b"rPh" => if_in_phonetic = true,
                b"t" if if_in_si && !if_in_phonetic => if_in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => l_strings.push(String::new()),
            Event::End(e) => match e.name().as_ref() {
                b"si" => {
                    l_strings.push(decode_excel_escapes(&c_current));
                    if_in_si = false;
                }
                b"rPh" => if_in_phonetic = false,
                b"t" => if_in_t = false,
                _ => {}
            },
            Event::Text(e) if if_in_t => c_current.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(l_strings)
}

#[derive(Debug, Default)]
struct SpecFontState {
    color: Option<String>,
    size: Option<f64>,
    bold: bool,
    italic: bool,
}

/// Parse `cellXfs` into one resolved style per xf index.
fn parse_styles(bytes: &[u8]) -> BlueprintResult<Vec<SpecCellStyle>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut dict_num_formats: HashMap<u32, String> = HashMap::new();
    let mut l_fonts: Vec<SpecFontState> = Vec::new();
    let mut l_fills: Vec<Option<String>> = Vec::new();
    let mut l_xfs: Vec<(u32, u32, u32)> = Vec::new();

    let mut font_current: Option<SpecFontState> = None;
    let mut fill_current: Option<Option<String>> = None;
    let mut if_in_dxfs = false;
    let mut if_in_cell_xfs = false;

    loop {
        let event = xml_reader.read_event_into(&mut buf)?;
        let if_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"dxfs" => if_in_dxfs = !if_empty,
                b"cellXfs" => if_in_cell_xfs = !if_empty,
                b"numFmt" => {
                    if let (Some(n_id), Some(c_code)) = (
                        derive_attr(&e, b"numFmtId").and_then(|val| val.parse().ok()),
                        derive_attr(&e, b"formatCode"),
                    ) {
                        dict_num_formats.insert(n_id, c_code);
                    }
                }
                b"font" if !if_in_dxfs => {
                    if if_empty {
                        l_fonts.push(SpecFontState::default());
                    } else {
                        font_current = Some(SpecFontState::default());
                    }
                }
                b"b" => {
                    if let Some(font) = font_current.as_mut() {
                        font.bold = derive_flag(&e);
                    }
                }
                b"i" => {
                    if let Some(font) = font_current.as_mut() {
                        font.italic = derive_flag(&e);
                    }
                }
                b"sz" => {
                    if let Some(font) = font_current.as_mut() {
                        font.size = derive_attr(&e, b"val").and_then(|val| val.parse().ok());
                    }
                }
                b"color" => {
                    if let Some(font) = font_current.as_mut() {
                        font.color = derive_attr(&e, b"rgb").and_then(|val| derive_hex_color(&val));
                    }
                }
                b"fill" if !if_in_dxfs => {
                    if if_empty {
                        l_fills.push(None);
                    } else {
                        fill_current = Some(None);
                    }
                }
                b"fgColor" => {
                    if let Some(fill) = fill_current.as_mut() {
                        *fill = derive_attr(&e, b"rgb").and_then(|val| derive_hex_color(&val));
                    }
                }
                b"xf" if if_in_cell_xfs => {
                    let derive_id = |key: &[u8]| {
                        derive_attr(&e, key)
                            .and_then(|val| val.parse::<u32>().ok())
                            .unwrap_or(0)
                    };
                    l_xfs.push((derive_id(b"numFmtId"), derive_id(b"fontId"), derive_id(b"fillId")));
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"dxfs" => if_in_dxfs = false,
                b"cellXfs" => if_in_cell_xfs = false,
                b"font" => {
                    if let Some(font) = font_current.take() {
                        l_fonts.push(font);
                    }
                }
                b"fill" => {
                    if let Some(fill) = fill_current.take() {
                        l_fills.push(fill);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(l_xfs
        .into_iter()
        .map(|(n_num_fmt, n_font, n_fill)| {
            let font = l_fonts.get(n_font as usize);
            SpecCellStyle {
                font_color: font.and_then(|f| f.color.clone()),
                fill_color: l_fills.get(n_fill as usize).cloned().flatten(),
                font_size: font.and_then(|f| f.size),
                bold: font.is_some_and(|f| f.bold),
                italic: font.is_some_and(|f| f.italic),
                num_format: dict_num_formats.get(&n_num_fmt).cloned(),
            }
        })
        .collect())
}

struct SpecSheetEntry {
    name: String,
    rel_id: String,
    if_hidden: bool,
}

fn parse_workbook_sheets(bytes: &[u8]) -> BlueprintResult<Vec<SpecSheetEntry>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut l_entries = Vec::new();
    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rel_id)) = (derive_attr(&e, b"name"), derive_attr(&e, b"r:id")) {
                    let if_hidden = derive_attr(&e, b"state")
                        .is_some_and(|state| state == "hidden" || state == "veryHidden");
                    l_entries.push(SpecSheetEntry {
                        name,
                        rel_id,
                        if_hidden,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(l_entries)
}

fn parse_workbook_rels(bytes: &[u8]) -> BlueprintResult<HashMap<String, String>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut dict_paths = HashMap::new();
    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if let (Some(c_id), Some(c_target), Some(c_type)) = (
                    derive_attr(&e, b"Id"),
                    derive_attr(&e, b"Target"),
                    derive_attr(&e, b"Type"),
                ) && c_type.ends_with("/worksheet")
                {
                    let c_path = match c_target.strip_prefix('/') {
                        Some(c_abs) => c_abs.to_string(),
                        None => format!("xl/{c_target}"),
                    };
                    dict_paths.insert(c_id, c_path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(dict_paths)
}

#[derive(Default)]
struct SpecCellState {
    reference: Option<String>,
    kind: Option<String>,
    n_style: Option<usize>,
    value: Option<String>,
    formula: Option<String>,
}

fn parse_worksheet(
    bytes: &[u8],
    shared_strings: &[String],
    styles: &[SpecCellStyle],
    grid: &mut SpecSheetGrid,
) -> BlueprintResult<()> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(false);

    let mut buf = Vec::new();
    let mut cell_current: Option<SpecCellState> = None;
    let mut if_in_value = false;
    let mut if_in_formula = false;
    let mut if_in_inline_text = false;

    loop {
        let event = xml_reader.read_event_into(&mut buf)?;
        let if_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"sheetView" => {
                    grid.if_gridlines_hidden = derive_attr(&e, b"showGridLines")
                        .is_some_and(|val| val == "0" || val == "false");
                }
                b"c" => {
                    let state = SpecCellState {
                        reference: derive_attr(&e, b"r"),
                        kind: derive_attr(&e, b"t"),
                        n_style: derive_attr(&e, b"s").and_then(|val| val.parse().ok()),
                        ..Default::default()
                    };
                    if !if_empty {
                        cell_current = Some(state);
                    }
                }
                b"v" if cell_current.is_some() => if_in_value = !if_empty,
                b"f" if cell_current.is_some() => if_in_formula = !if_empty,
                b"t" if cell_current.is_some() => if_in_inline_text = !if_empty,
                b"mergeCell" => {
                    if let Some(c_ref) = derive_attr(&e, b"ref")
                        && let Some(merge) = parse_range_ref(&c_ref)
                    {
                        grid.merges.push(merge);
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(state) = cell_current.as_mut() {
                    let c_text = e.unescape()?;
                    if if_in_value || if_in_inline_text {
                        state.value.get_or_insert_with(String::new).push_str(&c_text);
                    } else if if_in_formula {
                        state.formula.get_or_insert_with(String::new).push_str(&c_text);
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"v" => if_in_value = false,
                b"f" => if_in_formula = false,
                b"t" => if_in_inline_text = false,
                b"c" => {
                    if let Some(state) = cell_current.take() {
                        store_cell(state, shared_strings, styles, grid)?;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn store_cell(
    state: SpecCellState,
    shared_strings: &[String],
    styles: &[SpecCellStyle],
    grid: &mut SpecSheetGrid,
) -> BlueprintResult<()> {
    let Some(c_ref) = state.reference else {
        return Ok(());
    };
    let (n_row, n_col) = parse_cell_ref(&c_ref)
        .ok_or_else(|| BlueprintError::InvalidFormat(format!("invalid cell reference {c_ref:?}")))?;
    let Some(c_raw) = state.value else {
        return Ok(());
    };
    let value = match state.kind.as_deref() {
        Some("s") => {
            let n_idx: usize = c_raw.trim().parse().map_err(|_| {
                BlueprintError::InvalidFormat(format!("invalid shared string index {c_raw:?}"))
            })?;
            let c_text = shared_strings.get(n_idx).ok_or_else(|| {
                BlueprintError::InvalidFormat(format!("shared string index {n_idx} out of bounds"))
            })?;
            EnumGridValue::Text(c_text.clone())
        }
        Some("b") => EnumGridValue::Boolean(c_raw == "1" || c_raw.eq_ignore_ascii_case("true")),
        Some("str") | Some("inlineStr") | Some("e") => {
            EnumGridValue::Text(decode_excel_escapes(&c_raw))
        }
        _ => match c_raw.trim().parse::<f64>() {
            Ok(n_val) => EnumGridValue::Number(n_val),
            Err(_) => EnumGridValue::Text(c_raw),
        },
    };
    let style = state
        .n_style
        .and_then(|n_idx| styles.get(n_idx))
        .cloned()
        .unwrap_or_default();
    grid.set_cell(
        n_row,
        n_col,
        SpecGridCell {
            value,
            style,
            formula: state.formula,
        },
    );
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Helpers

fn derive_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|val| val.to_string()))
}

/// `<b/>` is on; `<b val="0"/>` is off.
fn derive_flag(e: &BytesStart<'_>) -> bool {
    derive_attr(e, b"val").is_none_or(|val| val != "0" && val != "false")
}

/// `FF003366` -> `#003366`; fully transparent black means "no color".
pub fn derive_hex_color(argb: &str) -> Option<String> {
    if argb.eq_ignore_ascii_case("00000000") {
        return None;
    }
    let c_hex = match argb.len() {
        8 => &argb[2..],
        6 => argb,
        _ => return None,
    };
    if !c_hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", c_hex.to_ascii_uppercase()))
}

/// Parse `B12` into 0-based `(row, col)`.
pub fn parse_cell_ref(text: &str) -> Option<(usize, usize)> {
    let c_clean = text.replace('$', "");
    let n_split = c_clean.find(|ch: char| ch.is_ascii_digit())?;
    let (c_letters, c_digits) = c_clean.split_at(n_split);
    if c_letters.is_empty() || !c_letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    let n_row: usize = c_digits.parse().ok()?;
    let n_col = c_letters.chars().try_fold(0usize, |acc, ch| {
        acc.checked_mul(26)?
            .checked_add(ch.to_ascii_uppercase() as usize - 'A' as usize + 1)
    })?;
    Some((n_row.checked_sub(1)?, n_col.checked_sub(1)?))
}

fn parse_range_ref(text: &str) -> Option<SpecMergeRange> {
    let (c_first, c_last) = text.split_once(':').unwrap_or((text, text));
    let (row_first, col_first) = parse_cell_ref(c_first)?;
    let (row_last, col_last) = parse_cell_ref(c_last)?;
    Some(SpecMergeRange {
        row_first: row_first.min(row_last),
        col_first: col_first.min(col_last),
        row_last: row_first.max(row_last),
        col_last: col_first.max(col_last),
    })
}

/// Decode `_xHHHH_` escapes used for control characters in OOXML strings.
fn decode_excel_escapes(text: &str) -> String {
    let mut c_out = String::with_capacity(text.len());
    let mut c_rest = text;
    while let Some(n_pos) = c_rest.find("_x") {
        c_out.push_str(&c_rest[..n_pos]);
        let c_tail = &c_rest[n_pos..];
        let decoded = c_tail
            .get(2..6)
            .filter(|hex| hex.chars().all(|ch| ch.is_ascii_hexdigit()))
            .filter(|_| c_tail.get(6..7) == Some("_"))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                c_out.push(ch);
                c_rest = &c_tail[7..];
            }
            None => {
                c_out.push_str("_x");
                c_rest = &c_tail[2..];
            }
        }
    }
    c_out.push_str(c_rest);
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("$C$6"), Some((5, 2)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("10"), None);
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref(&format!("{}1", "Z".repeat(40))), None);
        assert_eq!(parse_range_ref(&format!("A1:{}9", "Q".repeat(64))), None);
    }

    #[test]
    fn test_parse_range_ref() {
        let merge = parse_range_ref("B2:K3").unwrap();
        assert_eq!((merge.row_first, merge.col_first), (1, 1));
        assert_eq!((merge.row_last, merge.col_last), (2, 10));
        assert!(merge.contains(2, 5));
        assert!(!merge.contains(3, 5));
    }

    #[test]
    fn test_derive_hex_color() {
        assert_eq!(derive_hex_color("FF003366").as_deref(), Some("#003366"));
        assert_eq!(derive_hex_color("ffffff").as_deref(), Some("#FFFFFF"));
        assert_eq!(derive_hex_color("00000000"), None);
        assert_eq!(derive_hex_color("theme"), None);
    }

    #[test]
    fn test_decode_excel_escapes() {
        assert_eq!(decode_excel_escapes("a_x000a_b"), "a\nb");
        assert_eq!(decode_excel_escapes("snake_x_case"), "snake_x_case");
        assert_eq!(decode_excel_escapes("_x005F_"), "_");
    }

    #[test]
    fn test_shared_strings_join_rich_runs() {
        let c_xml = r#"<sst><si><t>plain</t></si><si><r><t>Bold </t></r><r><t>tail</t></r></si><si/></sst>"#;
        let l_strings = parse_shared_strings(c_xml.as_bytes()).unwrap();
        assert_eq!(l_strings, vec!["plain", "Bold tail", ""]);
    }

    #[test]
    fn test_parse_styles_resolves_xf_font_and_fill() {
        let c_xml = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="&#163;#,##0"/></numFmts>
            <fonts count="2">
              <font><sz val="11"/><color theme="1"/><name val="Calibri"/></font>
              <font><b/><sz val="18"/><color rgb="FF003366"/><name val="Arial"/></font>
            </fonts>
            <fills count="3">
              <fill><patternFill patternType="none"/></fill>
              <fill><patternFill patternType="gray125"/></fill>
              <fill><patternFill patternType="solid"><fgColor rgb="FFE0E0E0"/><bgColor indexed="64"/></patternFill></fill>
            </fills>
            <cellXfs count="2">
              <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
              <xf numFmtId="164" fontId="1" fillId="2" borderId="0" applyFont="1"><alignment horizontal="center"/></xf>
            </cellXfs>
            <dxfs count="1"><dxf><font><b/></font><fill><patternFill><fgColor rgb="FFFF0000"/></patternFill></fill></dxf></dxfs>
          </styleSheet>"#;
        let l_styles = parse_styles(c_xml.as_bytes()).unwrap();
        assert_eq!(l_styles.len(), 2);
        assert_eq!(l_styles[0], SpecCellStyle {
            font_size: Some(11.0),
            ..Default::default()
        });
        assert_eq!(l_styles[1].font_color.as_deref(), Some("#003366"));
        assert_eq!(l_styles[1].fill_color.as_deref(), Some("#E0E0E0"));
        assert_eq!(l_styles[1].font_size, Some(18.0));
        assert!(l_styles[1].bold);
        assert_eq!(l_styles[1].num_format.as_deref(), Some("£#,##0"));
    }

    #[test]
    fn test_parse_worksheet_values_formulas_and_merges() {
        let c_xml = r#"<worksheet>
            <sheetViews><sheetView showGridLines="0" workbookViewId="0"/></sheetViews>
            <sheetData>
              <row r="2"><c r="B2" t="s"><v>0</v></c><c r="C2" s="1"><v>12.5</v></c></row>
              <row r="3"><c r="B3" t="str"><f>"a"&amp;"b"</f><v>ab</v></c><c r="C3"><f>SUM(C2:C2)</f><v>12.5</v></c><c r="D3" s="1"/></row>
              <row r="4"><c r="B4" t="inlineStr"><is><t>inline</t></is></c><c r="C4" t="b"><v>1</v></c></row>
            </sheetData>
            <mergeCells count="1"><mergeCell ref="B6:E6"/></mergeCells>
          </worksheet>"#;
        let l_strings = vec!["Region".to_string()];
        let l_styles = vec![SpecCellStyle::default(), SpecCellStyle {
            bold: true,
            ..Default::default()
        }];
        let mut grid = SpecSheetGrid::new("Sheet1");
        parse_worksheet(c_xml.as_bytes(), &l_strings, &l_styles, &mut grid).unwrap();

        assert!(grid.if_gridlines_hidden);
        assert_eq!(grid.value(1, 1), Some(&EnumGridValue::Text("Region".to_string())));
        assert_eq!(grid.value(1, 2), Some(&EnumGridValue::Number(12.5)));
        assert!(grid.cell(1, 2).unwrap().style.bold);
        assert_eq!(grid.value(2, 1), Some(&EnumGridValue::Text("ab".to_string())));
        assert_eq!(grid.cell(2, 2).unwrap().formula.as_deref(), Some("SUM(C2:C2)"));
        assert!(!grid.if_has_value(2, 3));
        assert_eq!(grid.value(3, 1), Some(&EnumGridValue::Text("inline".to_string())));
        assert_eq!(grid.value(3, 2), Some(&EnumGridValue::Boolean(true)));
        assert!(grid.if_merged(5, 4));
        assert_eq!((grid.n_rows, grid.n_cols), (4, 3));
    }

    #[test]
    fn test_read_workbook_rejects_non_zip() {
        let err = read_workbook_bytes(b"not a zip").unwrap_err();
        assert!(matches!(err, BlueprintError::Zip(_)));
    }
}

// #endregion
