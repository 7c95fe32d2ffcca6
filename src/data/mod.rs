/// Data layer: core types, loading, and validation.
///
/// Architecture:
/// ```text
///  Yahoo chart API / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawSeries
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ RawSeries  │  named columns, dynamically typed cells
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ validate  │  pick Date/Close, coerce, drop bad rows → ValidatedSeries
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod validate;
