//! Declarative style rules evaluated row-wise into a sparse cell style map.
//!
//! Expressions are parsed into a small typed AST:
//! - identifiers name dataset columns (backticks allow any text),
//! - literals are numbers, quoted strings and `True`/`False`,
//! - comparisons are `> >= < <= == !=`,
//! - boolean operators are `and`/`or`/`not` (also `&`, `|`, `~`),
//! - parentheses group.
//!
//! Comparisons against a null cell are false.

use std::collections::BTreeSet;

use polars::prelude::{AnyValue, DataFrame, DataType};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::spec::{SpecCellFormat, StyleMap};

/// One `(target column, expression, style)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecStyleRule {
    /// Output column receiving the style.
    #[serde(alias = "target")]
    pub column: String,
    /// Boolean expression over the source dataset.
    #[serde(alias = "condition")]
    pub expression: String,
    /// Attributes merged into matching cells.
    #[serde(default)]
    pub style: SpecCellFormat,
}

impl SpecStyleRule {
    pub fn new(
        column: impl Into<String>,
        expression: impl Into<String>,
        style: SpecCellFormat,
    ) -> Self {
        Self {
            column: column.into(),
            expression: expression.into(),
            style,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region ExpressionModel

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

/// Literal value in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumLiteral {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumExpr {
    Literal(EnumLiteral),
    Column(String),
    Compare {
        op: EnumCompareOp,
        lhs: Box<EnumExpr>,
        rhs: Box<EnumExpr>,
    },
    And(Box<EnumExpr>, Box<EnumExpr>),
    Or(Box<EnumExpr>, Box<EnumExpr>),
    Not(Box<EnumExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumValueType {
    Number,
    Text,
    Bool,
}

impl EnumExpr {
    /// Column names referenced anywhere in the expression.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut set_cols = BTreeSet::new();
        self.collect_columns(&mut set_cols);
        set_cols
    }

    fn collect_columns<'a>(&'a self, set_cols: &mut BTreeSet<&'a str>) {
        match self {
            EnumExpr::Literal(_) => {}
            EnumExpr::Column(name) => {
                set_cols.insert(name.as_str());
            }
            EnumExpr::Compare { lhs, rhs, .. } | EnumExpr::And(lhs, rhs) | EnumExpr::Or(lhs, rhs) => {
                lhs.collect_columns(set_cols);
                rhs.collect_columns(set_cols);
            }
            EnumExpr::Not(inner) => inner.collect_columns(set_cols),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tokenizer

#[derive(Debug, Clone, PartialEq)]
enum EnumToken {
    Ident(String),
    Number(f64),
    Text(String),
    Bool(bool),
    Compare(EnumCompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<EnumToken>, String> {
    let l_chars: Vec<char> = expression.chars().collect();
    let mut l_tokens = Vec::new();
    let mut n_pos = 0;

    while n_pos < l_chars.len() {
        let chr = l_chars[n_pos];
        if chr.is_whitespace() {
            n_pos += 1;
            continue;
        }

        let chr_next = l_chars.get(n_pos + 1).copied();
        match chr {
            '(' => {
                l_tokens.push(EnumToken::LParen);
                n_pos += 1;
            }
            ')' => {
                l_tokens.push(EnumToken::RParen);
                n_pos += 1;
            }
            '&' => {
                l_tokens.push(EnumToken::And);
                n_pos += if chr_next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                l_tokens.push(EnumToken::Or);
                n_pos += if chr_next == Some('|') { 2 } else { 1 };
            }
            '~' => {
                l_tokens.push(EnumToken::Not);
                n_pos += 1;
            }
            '>' | '<' | '=' | '!' => {
                let (op, n_len) = match (chr, chr_next) {
                    ('>', Some('=')) => (EnumCompareOp::Ge, 2),
                    ('<', Some('=')) => (EnumCompareOp::Le, 2),
                    ('=', Some('=')) => (EnumCompareOp::Eq, 2),
                    ('!', Some('=')) => (EnumCompareOp::Ne, 2),
                    ('>', _) => (EnumCompareOp::Gt, 1),
                    ('<', _) => (EnumCompareOp::Lt, 1),
                    ('!', _) => {
                        l_tokens.push(EnumToken::Not);
                        n_pos += 1;
                        continue;
                    }
                    _ => return Err(format!("unexpected '=' at position {n_pos}; use '=='")),
                };
                l_tokens.push(EnumToken::Compare(op));
                n_pos += n_len;
            }
            '\'' | '"' | '`' => {
                let n_start = n_pos + 1;
                let Some(n_len) = l_chars[n_start..].iter().position(|c| *c == chr) else {
                    return Err(format!("unterminated quote starting at position {n_pos}"));
                };
                let c_text: String = l_chars[n_start..n_start + n_len].iter().collect();
                l_tokens.push(if chr == '`' {
                    EnumToken::Ident(c_text)
                } else {
                    EnumToken::Text(c_text)
                });
                n_pos = n_start + n_len + 1;
            }
            c if c.is_ascii_digit() || c == '.' || (c == '-' && starts_number(chr_next, &l_tokens)) => {
                let n_start = n_pos;
                n_pos += 1;
                while n_pos < l_chars.len()
                    && (l_chars[n_pos].is_ascii_digit()
                        || l_chars[n_pos] == '.'
                        || l_chars[n_pos] == '_'
                        || matches!(l_chars[n_pos], 'e' | 'E'))
                {
                    n_pos += 1;
                }
                let c_num: String = l_chars[n_start..n_pos]
                    .iter()
                    .filter(|c| **c != '_')
                    .collect();
                let n_val = c_num
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal {c_num:?}"))?;
                l_tokens.push(EnumToken::Number(n_val));
            }
            c if c.is_alphabetic() || c == '_' => {
                let n_start = n_pos;
                while n_pos < l_chars.len()
                    && (l_chars[n_pos].is_alphanumeric() || l_chars[n_pos] == '_')
                {
                    n_pos += 1;
                }
                let c_word: String = l_chars[n_start..n_pos].iter().collect();
                l_tokens.push(match c_word.as_str() {
                    "and" | "AND" => EnumToken::And,
                    "or" | "OR" => EnumToken::Or,
                    "not" | "NOT" => EnumToken::Not,
                    "True" | "true" => EnumToken::Bool(true),
                    "False" | "false" => EnumToken::Bool(false),
                    _ => EnumToken::Ident(c_word),
                });
            }
            other => return Err(format!("unexpected character {other:?} at position {n_pos}")),
        }
    }

    Ok(l_tokens)
}

/// A '-' starts a negative literal only where an operand is expected.
fn starts_number(chr_next: Option<char>, l_tokens: &[EnumToken]) -> bool {
    let if_operand_expected = matches!(
        l_tokens.last(),
        None | Some(
            EnumToken::Compare(_)
                | EnumToken::And
                | EnumToken::Or
                | EnumToken::Not
                | EnumToken::LParen
        )
    );
    if_operand_expected && chr_next.is_some_and(|c| c.is_ascii_digit() || c == '.')
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parser

struct ExprParser {
    l_tokens: Vec<EnumToken>,
    n_pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&EnumToken> {
        self.l_tokens.get(self.n_pos)
    }

    fn next_token(&mut self) -> Option<EnumToken> {
        let token = self.l_tokens.get(self.n_pos).cloned();
        self.n_pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<EnumExpr, String> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&EnumToken::Or) {
            self.n_pos += 1;
            let rhs = self.parse_and()?;
            expr = EnumExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<EnumExpr, String> {
        let mut expr = self.parse_not()?;
        while self.peek() == Some(&EnumToken::And) {
            self.n_pos += 1;
            let rhs = self.parse_not()?;
            expr = EnumExpr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<EnumExpr, String> {
        if self.peek() == Some(&EnumToken::Not) {
            self.n_pos += 1;
            return Ok(EnumExpr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<EnumExpr, String> {
        let lhs = self.parse_primary()?;
        if let Some(EnumToken::Compare(op)) = self.peek() {
            let op = *op;
            self.n_pos += 1;
            let rhs = self.parse_primary()?;
            if let Some(EnumToken::Compare(_)) = self.peek() {
                return Err("chained comparisons are not supported".to_string());
            }
            return Ok(EnumExpr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<EnumExpr, String> {
        match self.next_token() {
            Some(EnumToken::Ident(name)) => Ok(EnumExpr::Column(name)),
            Some(EnumToken::Number(n)) => Ok(EnumExpr::Literal(EnumLiteral::Number(n))),
            Some(EnumToken::Text(s)) => Ok(EnumExpr::Literal(EnumLiteral::Text(s))),
            Some(EnumToken::Bool(b)) => Ok(EnumExpr::Literal(EnumLiteral::Bool(b))),
            Some(EnumToken::LParen) => {
                let expr = self.parse_or()?;
                match self.next_token() {
                    Some(EnumToken::RParen) => Ok(expr),
                    _ => Err("missing closing ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Parse expression text into an AST.
pub fn parse_expression(expression: &str) -> Result<EnumExpr, String> {
    let l_tokens = tokenize(expression)?;
    if l_tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = ExprParser { l_tokens, n_pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected trailing token {token:?}"));
    }
    Ok(expr)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TypeCheck

fn derive_value_type(dtype: &DataType) -> Option<EnumValueType> {
    if dtype.is_numeric() {
        return Some(EnumValueType::Number);
    }
    match dtype {
        DataType::String => Some(EnumValueType::Text),
        DataType::Boolean => Some(EnumValueType::Bool),
        _ => None,
    }
}

fn check_expr_type(
    expr: &EnumExpr,
    df: &DataFrame,
) -> Result<Option<EnumValueType>, String> {
    match expr {
        EnumExpr::Literal(EnumLiteral::Number(_)) => Ok(Some(EnumValueType::Number)),
        EnumExpr::Literal(EnumLiteral::Text(_)) => Ok(Some(EnumValueType::Text)),
        EnumExpr::Literal(EnumLiteral::Bool(_)) => Ok(Some(EnumValueType::Bool)),
        EnumExpr::Column(name) => {
            let col = df
                .column(name)
                .map_err(|_| format!("column {name:?} not found in dataset"))?;
            match derive_value_type(col.dtype()) {
                Some(value_type) => Ok(Some(value_type)),
                // Null-only columns compare false against anything.
                None if matches!(col.dtype(), DataType::Null) => Ok(None),
                None => Err(format!(
                    "column {name:?} has unsupported type {}",
                    col.dtype()
                )),
            }
        }
        EnumExpr::Compare { op, lhs, rhs } => {
            let type_lhs = check_expr_type(lhs, df)?;
            let type_rhs = check_expr_type(rhs, df)?;
            if let (Some(t_l), Some(t_r)) = (type_lhs, type_rhs) {
                if t_l != t_r {
                    return Err(format!("cannot compare {t_l:?} with {t_r:?}"));
                }
                if t_l == EnumValueType::Bool
                    && !matches!(op, EnumCompareOp::Eq | EnumCompareOp::Ne)
                {
                    return Err("booleans support only '==' and '!='".to_string());
                }
            }
            Ok(Some(EnumValueType::Bool))
        }
        EnumExpr::And(lhs, rhs) | EnumExpr::Or(lhs, rhs) => {
            for side in [lhs, rhs] {
                check_predicate_type(side, df)?;
            }
            Ok(Some(EnumValueType::Bool))
        }
        EnumExpr::Not(inner) => {
            check_predicate_type(inner, df)?;
            Ok(Some(EnumValueType::Bool))
        }
    }
}

fn check_predicate_type(expr: &EnumExpr, df: &DataFrame) -> Result<(), String> {
    match check_expr_type(expr, df)? {
        Some(EnumValueType::Bool) | None => Ok(()),
        Some(other) => Err(format!("expected a boolean condition, found {other:?}")),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Evaluation

#[derive(Debug, Clone, PartialEq)]
enum EnumScalar {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
}

fn derive_scalar(value: AnyValue<'_>) -> EnumScalar {
    match value {
        AnyValue::Null => EnumScalar::Null,
        AnyValue::Boolean(val) => EnumScalar::Bool(val),
        AnyValue::String(val) => EnumScalar::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumScalar::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumScalar::Number(val as f64),
        AnyValue::UInt16(val) => EnumScalar::Number(val as f64),
        AnyValue::UInt32(val) => EnumScalar::Number(val as f64),
        AnyValue::UInt64(val) => EnumScalar::Number(val as f64),
        AnyValue::Int8(val) => EnumScalar::Number(val as f64),
        AnyValue::Int16(val) => EnumScalar::Number(val as f64),
        AnyValue::Int32(val) => EnumScalar::Number(val as f64),
        AnyValue::Int64(val) => EnumScalar::Number(val as f64),
        AnyValue::Int128(val) => EnumScalar::Number(val as f64),
        AnyValue::Float32(val) => EnumScalar::Number(val as f64),
        AnyValue::Float64(val) if val.is_nan() => EnumScalar::Null,
        AnyValue::Float64(val) => EnumScalar::Number(val),
        other => EnumScalar::Text(other.to_string()),
    }
}

fn evaluate(expr: &EnumExpr, df: &DataFrame, n_idx_row: usize) -> Result<EnumScalar, String> {
    Ok(match expr {
        EnumExpr::Literal(EnumLiteral::Number(n)) => EnumScalar::Number(*n),
        EnumExpr::Literal(EnumLiteral::Text(s)) => EnumScalar::Text(s.clone()),
        EnumExpr::Literal(EnumLiteral::Bool(b)) => EnumScalar::Bool(*b),
        EnumExpr::Column(name) => {
            let value = df
                .column(name)
                .and_then(|col| col.get(n_idx_row))
                .map_err(|err| format!("failed to read {name:?} at row {n_idx_row}: {err}"))?;
            derive_scalar(value)
        }
        EnumExpr::Compare { op, lhs, rhs } => {
            let val_lhs = evaluate(lhs, df, n_idx_row)?;
            let val_rhs = evaluate(rhs, df, n_idx_row)?;
            EnumScalar::Bool(compare_scalars(*op, &val_lhs, &val_rhs)?)
        }
        EnumExpr::And(lhs, rhs) => EnumScalar::Bool(
            derive_truth(&evaluate(lhs, df, n_idx_row)?)
                && derive_truth(&evaluate(rhs, df, n_idx_row)?),
        ),
        EnumExpr::Or(lhs, rhs) => EnumScalar::Bool(
            derive_truth(&evaluate(lhs, df, n_idx_row)?)
                || derive_truth(&evaluate(rhs, df, n_idx_row)?),
        ),
        EnumExpr::Not(inner) => EnumScalar::Bool(!derive_truth(&evaluate(inner, df, n_idx_row)?)),
    })
}

fn derive_truth(value: &EnumScalar) -> bool {
    matches!(value, EnumScalar::Bool(true))
}

fn compare_scalars(op: EnumCompareOp, lhs: &EnumScalar, rhs: &EnumScalar) -> Result<bool, String> {
    let ordering = match (lhs, rhs) {
        (EnumScalar::Null, _) | (_, EnumScalar::Null) => return Ok(false),
        (EnumScalar::Number(a), EnumScalar::Number(b)) => a.partial_cmp(b),
        (EnumScalar::Text(a), EnumScalar::Text(b)) => Some(a.cmp(b)),
        (EnumScalar::Bool(a), EnumScalar::Bool(b)) => Some(a.cmp(b)),
        (a, b) => return Err(format!("cannot compare {a:?} with {b:?}")),
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        EnumCompareOp::Gt => ordering.is_gt(),
        EnumCompareOp::Ge => ordering.is_ge(),
        EnumCompareOp::Lt => ordering.is_lt(),
        EnumCompareOp::Le => ordering.is_le(),
        EnumCompareOp::Eq => ordering.is_eq(),
        EnumCompareOp::Ne => ordering.is_ne(),
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StyleMap

/// Row indices where `expression` holds over `df`.
pub fn evaluate_expression(df: &DataFrame, expression: &str) -> Result<Vec<usize>, String> {
    let expr = parse_expression(expression)?;
    check_predicate_type(&expr, df)?;

    let mut l_rows = Vec::new();
    for n_idx_row in 0..df.height() {
        if derive_truth(&evaluate(&expr, df, n_idx_row)?) {
            l_rows.push(n_idx_row);
        }
    }
    Ok(l_rows)
}

/// Evaluate `rules` in order and merge matching styles per `(row, column)`.
///
/// Later matching rules overwrite earlier ones attribute by attribute.
pub fn create_style_map(df: &DataFrame, rules: &[SpecStyleRule]) -> ReportResult<StyleMap> {
    let mut dict_styles = StyleMap::new();
    for (n_idx_rule, rule) in rules.iter().enumerate() {
        let l_rows = evaluate_expression(df, &rule.expression).map_err(|reason| {
            ReportError::InvalidExpression {
                rule_index: n_idx_rule,
                expression: rule.expression.clone(),
                reason,
            }
        })?;
        log::debug!(
            "style rule #{n_idx_rule} `{}` matched {} row(s)",
            rule.expression,
            l_rows.len()
        );
        for n_idx_row in l_rows {
            let entry = dict_styles
                .entry((n_idx_row, rule.column.clone()))
                .or_default();
            *entry = entry.merge(&rule.style);
        }
    }
    Ok(dict_styles)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    fn style(bg: Option<&str>, bold: Option<bool>, font: Option<&str>) -> SpecCellFormat {
        SpecCellFormat {
            bg_color: bg.map(ToString::to_string),
            bold,
            font_color: font.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn last_matching_rule_wins_per_attribute() {
        let df = df!("x" => [10i64, 3, -1]).expect("df");
        let style_a = style(Some("#FF0000"), Some(true), None);
        let style_b = style(Some("#00FF00"), None, Some("#0000FF"));
        let rules = vec![
            SpecStyleRule::new("c", "x > 5", style_a.clone()),
            SpecStyleRule::new("c", "x > 0", style_b.clone()),
        ];

        let dict_styles = create_style_map(&df, &rules).expect("style map");

        let row_0 = &dict_styles[&(0, "c".to_string())];
        assert_eq!(row_0.bg_color.as_deref(), Some("#00FF00"));
        assert_eq!(row_0.bold, Some(true));
        assert_eq!(row_0.font_color.as_deref(), Some("#0000FF"));

        assert_eq!(dict_styles[&(1, "c".to_string())], style_b);
        assert!(!dict_styles.contains_key(&(2, "c".to_string())));
    }

    #[test]
    fn rules_may_reference_columns_absent_from_output() {
        let df = df!(
            "status" => ["late", "ok", "late"],
            "days" => [12.0, 1.0, 2.0],
        )
        .expect("df");
        let rules = vec![SpecStyleRule::new(
            "project",
            "status == 'late' and not (days < 5)",
            style(Some("#FFC7CE"), None, None),
        )];
        let dict_styles = create_style_map(&df, &rules).expect("style map");
        assert_eq!(
            dict_styles.keys().cloned().collect::<Vec<_>>(),
            vec![(0, "project".to_string())]
        );
    }

    #[test]
    fn symbolic_operators_and_nulls() {
        let df = df!("a" => [Some(1i32), None, Some(7)], "b" => [true, true, false]).expect("df");
        assert_eq!(evaluate_expression(&df, "(a >= 1) & b").expect("eval"), vec![0]);
        assert_eq!(evaluate_expression(&df, "~(a < 5) | b == False").expect("eval"), vec![1, 2]);
        assert_eq!(evaluate_expression(&df, "a != -3").expect("eval"), vec![0, 2]);
    }

    #[test]
    fn errors_carry_rule_index_and_expression() {
        let df = df!("x" => [1i64], "name" => ["a"]).expect("df");
        let rules = vec![
            SpecStyleRule::new("x", "x > 0", SpecCellFormat::default()),
            SpecStyleRule::new("x", "missing > 0", SpecCellFormat::default()),
        ];
        match create_style_map(&df, &rules) {
            Err(ReportError::InvalidExpression {
                rule_index,
                expression,
                ..
            }) => {
                assert_eq!(rule_index, 1);
                assert_eq!(expression, "missing > 0");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let rules = vec![SpecStyleRule::new("x", "name > 3", SpecCellFormat::default())];
        assert!(matches!(
            create_style_map(&df, &rules),
            Err(ReportError::InvalidExpression { rule_index: 0, .. })
        ));
    }

    #[test]
    fn parser_rejects_malformed_text() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("x >").is_err());
        assert!(parse_expression("(x > 1").is_err());
        assert!(parse_expression("x = 1").is_err());
        assert!(parse_expression("1 < x < 3").is_err());
        assert_eq!(
            parse_expression("`unit price` > 2.5")
                .expect("parse")
                .columns()
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["unit price"]
        );
    }
}
