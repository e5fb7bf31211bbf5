use std::collections::HashMap;

use serde::Serialize;

use super::model::{CellValue, ColumnRef};

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// `describe()` output for a numeric column. Statistics that are undefined
/// for the column (empty column, std of a single value) are `None` and
/// serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// `describe()` output for a non-numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<CellValue>,
    pub freq: Option<usize>,
}

/// Summary statistics of one column, shaped by the column's kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

/// Compute summary statistics for a column, numeric or categorical depending
/// on its inferred kind. Nulls never count.
pub fn describe(column: &ColumnRef<'_>) -> ColumnSummary {
    if column.kind.is_numeric() {
        ColumnSummary::Numeric(describe_numeric(&column.numbers()))
    } else {
        ColumnSummary::Categorical(describe_categorical(column.values()))
    }
}

pub fn describe_numeric(values: &[f64]) -> NumericSummary {
    let count = values.len();
    if count == 0 {
        return NumericSummary {
            count,
            mean: None,
            std: None,
            min: None,
            q25: None,
            q50: None,
            q75: None,
            max: None,
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    NumericSummary {
        count,
        mean: Some(mean),
        std,
        min: sorted.first().copied(),
        q25: Some(quantile(&sorted, 0.25)),
        q50: Some(quantile(&sorted, 0.50)),
        q75: Some(quantile(&sorted, 0.75)),
        max: sorted.last().copied(),
    }
}

/// Linear-interpolated quantile of a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn describe_categorical<'a>(values: impl Iterator<Item = &'a CellValue>) -> CategoricalSummary {
    let counts = value_counts(values);
    let count = counts.iter().map(|(_, n)| n).sum();
    let top = counts.first().cloned();
    CategoricalSummary {
        count,
        unique: counts.len(),
        top: top.as_ref().map(|(v, _)| v.clone()),
        freq: top.map(|(_, n)| n),
    }
}

/// Non-null values with their occurrence counts, most frequent first. Ties
/// keep first-appearance order.
pub fn value_counts<'a>(values: impl Iterator<Item = &'a CellValue>) -> Vec<(CellValue, usize)> {
    let mut index: HashMap<&CellValue, usize> = HashMap::new();
    let mut counts: Vec<(CellValue, usize)> = Vec::new();
    for value in values.filter(|v| !v.is_null()) {
        match index.get(value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }
    // stable sort preserves first appearance among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
