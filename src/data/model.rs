use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes pandas infers for CSV.
/// Categorical summaries count values in a `HashMap`, so `CellValue` must be
/// `Eq + Hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Hash so float cells can be counted --

impl Eq for CellValue {}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            // pandas prints booleans capitalised
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Null => write!(f, "NaN"),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64` for numeric statistics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – the inferred dtype of one column
// ---------------------------------------------------------------------------

/// Column dtype as pandas would infer it from CSV text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
    /// Header-only file: no rows to infer anything from.
    Empty,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete parsed table
// ---------------------------------------------------------------------------

/// A parsed CSV table. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Column names in header order.
    pub columns: Vec<String>,
    /// Inferred kind per column, parallel to `columns`.
    pub kinds: Vec<ColumnKind>,
    /// Row-major cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Borrow one column of the table by name.
    pub fn column(&self, name: &str) -> Option<ColumnRef<'_>> {
        let idx = self.column_index(name)?;
        Some(ColumnRef {
            name: &self.columns[idx],
            kind: self.kinds[idx],
            dataset: self,
            idx,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A borrowed view of a single column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRef<'a> {
    pub name: &'a str,
    pub kind: ColumnKind,
    dataset: &'a Dataset,
    idx: usize,
}

impl<'a> ColumnRef<'a> {
    /// All cells of the column, nulls included.
    pub fn values(&self) -> impl Iterator<Item = &'a CellValue> + 'a {
        let idx = self.idx;
        let dataset = self.dataset;
        dataset.rows.iter().map(move |row| &row[idx])
    }

    /// Non-null numeric cells as `f64`.
    pub fn numbers(&self) -> Vec<f64> {
        self.values().filter_map(CellValue::as_f64).collect()
    }
}

impl serde::Serialize for CellValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) => serializer.serialize_f64(*v),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Null => serializer.serialize_none(),
        }
    }
}
