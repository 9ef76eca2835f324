// SPDX-License-Identifier: Apache-2.0

//! Result normalization: lower-case column names and best-effort numeric
//! coercion of text columns.
//!
//! Coercion is column-wide. A column holding text converts only when every
//! text cell in it parses as a number; otherwise the column is left exactly
//! as fetched. Normalizing an already normalized dataset is a no-op.
//!
//! Identifier columns that later queries filter on are exempted through
//! [`normalize_preserving`], so their values keep the warehouse's own text
//! (leading zeros, digits beyond `i64`).

use crate::connection::RawTable;
use fisca_model::{Dataset, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    RaggedRow { row: usize, cells: usize, columns: usize },
    InvalidShape(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaggedRow {
                row,
                cells,
                columns,
            } => write!(f, "row {row} has {cells} cells but {columns} columns"),
            Self::InvalidShape(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for NormalizeError {}

pub fn normalize(raw: RawTable) -> Result<Dataset, NormalizeError> {
    normalize_preserving(raw, &[])
}

/// Like [`normalize`], but columns named in `preserve` (compared after
/// lower-casing) are never coerced.
pub fn normalize_preserving(raw: RawTable, preserve: &[&str]) -> Result<Dataset, NormalizeError> {
    let RawTable { columns, mut rows } = raw;
    let width = columns.len();
    if let Some((row, cells)) = rows
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != width)
        .map(|(i, r)| (i, r.len()))
    {
        return Err(NormalizeError::RaggedRow {
            row,
            cells,
            columns: width,
        });
    }

    let columns: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    for (idx, name) in columns.iter().enumerate() {
        if preserve.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            continue;
        }
        coerce_numeric_column(&mut rows, idx);
    }
    Dataset::new(columns, rows).map_err(|e| NormalizeError::InvalidShape(e.to_string()))
}

pub fn normalize_dataset(dataset: Dataset) -> Result<Dataset, NormalizeError> {
    normalize(RawTable::from(dataset))
}

#[derive(Clone, Copy)]
enum Numeric {
    Integer(i64),
    Float(f64),
}

fn parse_numeric(text: &str) -> Option<Numeric> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(Numeric::Integer(v));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Numeric::Float)
}

fn coerce_numeric_column(rows: &mut [Vec<Value>], idx: usize) {
    let mut parsed: Vec<Option<Numeric>> = Vec::with_capacity(rows.len());
    let mut saw_text = false;
    let mut all_integer = true;
    for row in rows.iter() {
        match &row[idx] {
            Value::Text(s) => {
                saw_text = true;
                let Some(n) = parse_numeric(s) else {
                    return;
                };
                if matches!(n, Numeric::Float(_)) {
                    all_integer = false;
                }
                parsed.push(Some(n));
            }
            Value::Float(_) => {
                all_integer = false;
                parsed.push(None);
            }
            Value::Integer(_) | Value::Null => parsed.push(None),
        }
    }
    if !saw_text {
        return;
    }

    for (row, parsed) in rows.iter_mut().zip(parsed) {
        let cell = &mut row[idx];
        let next = match (parsed, &*cell) {
            (Some(Numeric::Integer(v)), _) if all_integer => Value::Integer(v),
            (Some(Numeric::Integer(v)), _) => Value::Float(v as f64),
            (Some(Numeric::Float(v)), _) => Value::Float(v),
            (None, Value::Integer(v)) if !all_integer => Value::Float(*v as f64),
            (None, _) => continue,
        };
        *cell = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(columns: &[&str], rows: Vec<Vec<Value>>) -> RawTable {
        RawTable::new(columns, rows)
    }

    #[test]
    fn lower_cases_column_names() {
        let ds = normalize(raw(&["NU_OF", "Ano"], vec![])).expect("normalize");
        assert_eq!(ds.columns(), &["nu_of".to_string(), "ano".to_string()]);
    }

    #[test]
    fn converts_fully_numeric_text_columns() {
        let ds = normalize(raw(
            &["qtd", "valor"],
            vec![
                vec![Value::from("10"), Value::from("1.5")],
                vec![Value::Null, Value::from(" 2 ")],
            ],
        ))
        .expect("normalize");
        assert_eq!(ds.get(0, "qtd"), Some(&Value::Integer(10)));
        assert_eq!(ds.get(1, "qtd"), Some(&Value::Null));
        assert_eq!(ds.get(0, "valor"), Some(&Value::Float(1.5)));
        assert_eq!(ds.get(1, "valor"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn leaves_column_untouched_when_any_cell_fails_to_parse() {
        let ds = normalize(raw(
            &["cnpj"],
            vec![
                vec![Value::from("123")],
                vec![Value::from("00.000.000/0001-00")],
            ],
        ))
        .expect("normalize");
        assert_eq!(ds.get(0, "cnpj"), Some(&Value::from("123")));
    }

    #[test]
    fn mixed_integer_and_decimal_text_widens_to_float() {
        let ds = normalize(raw(
            &["v"],
            vec![vec![Value::Integer(3)], vec![Value::from("0.25")]],
        ))
        .expect("normalize");
        assert_eq!(ds.get(0, "v"), Some(&Value::Float(3.0)));
        assert_eq!(ds.get(1, "v"), Some(&Value::Float(0.25)));
    }

    #[test]
    fn empty_text_blocks_conversion() {
        let ds = normalize(raw(&["v"], vec![vec![Value::from("1")], vec![Value::from("")]]))
            .expect("normalize");
        assert_eq!(ds.get(0, "v"), Some(&Value::from("1")));
    }

    #[test]
    fn preserved_columns_keep_leading_zeros_and_long_digits() {
        let ds = normalize_preserving(
            raw(
                &["NU_OF", "qtd"],
                vec![
                    vec![Value::from("00123"), Value::from("7")],
                    vec![Value::from("12345678901234567891"), Value::from("8")],
                ],
            ),
            &["nu_of"],
        )
        .expect("normalize");
        assert_eq!(ds.get(0, "nu_of"), Some(&Value::from("00123")));
        assert_eq!(ds.get(1, "nu_of"), Some(&Value::from("12345678901234567891")));
        assert_eq!(ds.get(0, "qtd"), Some(&Value::Integer(7)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = normalize(raw(&["a", "b"], vec![vec![Value::Null]])).expect_err("ragged");
        assert_eq!(
            err,
            NormalizeError::RaggedRow {
                row: 0,
                cells: 1,
                columns: 2
            }
        );
    }

    #[test]
    fn columns_colliding_after_lower_casing_are_rejected() {
        let err = normalize(raw(&["ANO", "ano"], vec![])).expect_err("collision");
        assert!(matches!(err, NormalizeError::InvalidShape(_)));
    }
}
