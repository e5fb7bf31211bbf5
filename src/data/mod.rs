/// Data layer: core types, loading, and summary statistics.
///
/// Architecture:
/// ```text
///   uploaded .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse text → Dataset, infer column kinds
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset  │  columns, kinds, Vec<Vec<CellValue>>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ describe │  one column → ColumnSummary
///   └──────────┘
/// ```

pub mod describe;
pub mod loader;
pub mod model;
