use std::collections::HashMap;
use std::io::Read;

use thiserror::Error;

use super::model::{CellValue, ColumnKind, Dataset};

/// Errors raised while turning CSV bytes into a [`Dataset`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No columns to parse from file")]
    NoColumns,

    #[error("Error tokenizing data. Expected {expected} fields in line {line}, saw {saw}")]
    TooManyFields {
        line: u64,
        expected: usize,
        saw: usize,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

type Result<T> = core::result::Result<T, LoadError>;

/// Cell texts pandas treats as missing by default.
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "TRUE", "true"];
const FALSE_TOKENS: &[&str] = &["False", "FALSE", "false"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse CSV text with a header row into a typed [`Dataset`].
///
/// Rows shorter than the header are padded with nulls; longer rows are
/// rejected. Column kinds are inferred from the whole column.
pub fn load_csv<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if raw_headers.is_empty() {
        return Err(LoadError::NoColumns);
    }
    let columns = dedupe_headers(raw_headers);
    let width = columns.len();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() > width {
            return Err(LoadError::TooManyFields {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: width,
                saw: record.len(),
            });
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        raw_rows.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|col| infer_kind(raw_rows.iter().map(|row| row[col].as_str()), raw_rows.len()))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(&kinds)
                .map(|(cell, kind)| convert_cell(cell, *kind))
                .collect()
        })
        .collect();

    Ok(Dataset {
        columns,
        kinds,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Inference helpers
// ---------------------------------------------------------------------------

/// Name blank headers `Unnamed: <index>` and rename repeats the way pandas
/// does: `a, a` → `a, a.1`, and `a, a.1, a` → `a, a.1, a.1.1`.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<String> = Vec::with_capacity(headers.len());
    for (i, name) in headers.into_iter().enumerate() {
        let mut name = if name.is_empty() {
            format!("Unnamed: {i}")
        } else {
            name
        };
        let mut seen = counts.get(&name).copied().unwrap_or(0);
        while seen > 0 {
            counts.insert(name.clone(), seen + 1);
            name = format!("{name}.{seen}");
            seen = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), seen + 1);
        out.push(name);
    }
    out
}

fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.contains(&s)
}

fn parse_bool(s: &str) -> Option<bool> {
    if TRUE_TOKENS.contains(&s) {
        Some(true)
    } else if FALSE_TOKENS.contains(&s) {
        Some(false)
    } else {
        None
    }
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>, n_rows: usize) -> ColumnKind {
    if n_rows == 0 {
        return ColumnKind::Empty;
    }

    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut saw_null = false;

    for cell in cells {
        if is_null_token(cell) {
            saw_null = true;
            continue;
        }
        let trimmed = cell.trim();
        if all_int && trimmed.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && trimmed.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && parse_bool(cell).is_none() {
            all_bool = false;
        }
        if !all_int && !all_float && !all_bool {
            return ColumnKind::Text;
        }
    }

    // An all-null column lands here with every flag still set; pandas reads
    // it as float64.
    if all_int && all_float && all_bool {
        return ColumnKind::Float;
    }
    // Missing values force an integer column to float.
    if all_int && !saw_null {
        ColumnKind::Integer
    } else if all_float {
        ColumnKind::Float
    } else if all_bool && !saw_null {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

fn convert_cell(cell: &str, kind: ColumnKind) -> CellValue {
    if is_null_token(cell) {
        return CellValue::Null;
    }
    let trimmed = cell.trim();
    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(CellValue::Integer)
            .unwrap_or(CellValue::Null),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Null),
        ColumnKind::Bool => parse_bool(cell).map(CellValue::Bool).unwrap_or(CellValue::Null),
        ColumnKind::Text | ColumnKind::Empty => CellValue::String(cell.to_string()),
    }
}
