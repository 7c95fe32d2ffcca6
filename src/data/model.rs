use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

// ---------------------------------------------------------------------------
// Cell – a single value in a raw price table
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell mirroring what price files and APIs hand us.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v:.4}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Date(d) => write!(f, "{d}"),
            Cell::Null => write!(f, "<null>"),
        }
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

impl Cell {
    /// Coerce to a finite `f64`.
    ///
    /// Integers, floats, booleans (as 1/0) and trimmed numeric text convert;
    /// everything else, including NaN and infinities, yields `None`.
    pub fn to_numeric(&self) -> Option<f64> {
        let v = match self {
            Cell::Float(v) => *v,
            Cell::Integer(i) => *i as f64,
            Cell::Bool(b) => f64::from(u8::from(*b)),
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            Cell::Date(_) | Cell::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Coerce to a calendar date. Time-of-day information is discarded.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date(s.trim()),
            _ => None,
        }
    }
}

/// Parse the date spellings we see in exported price files.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

// ---------------------------------------------------------------------------
// RawSeries – the unvalidated price table
// ---------------------------------------------------------------------------

/// One row of a [`RawSeries`], aligned with its column list.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow(pub Vec<Cell>);

impl RawRow {
    pub fn get(&self, idx: usize) -> &Cell {
        self.0.get(idx).unwrap_or(&Cell::Null)
    }
}

/// A time-indexed price table exactly as a source produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    /// Column names in source order.
    pub columns: Vec<String>,
    /// Rows in source order; short rows read as `Null` past their end.
    pub rows: Vec<RawRow>,
}

impl RawSeries {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }

    /// A table with columns but no rows, e.g. an unknown ticker.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched ASCII-case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &[RawRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

// ---------------------------------------------------------------------------
// ValidatedSeries – the clean (ds, y) series
// ---------------------------------------------------------------------------

/// One usable observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub ds: NaiveDate,
    pub y: f64,
}

impl Observation {
    pub fn new(ds: NaiveDate, y: f64) -> Self {
        Self { ds, y }
    }
}

/// Counts of rows removed during validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedRows {
    /// Value column could not be coerced to a finite number.
    pub non_numeric: usize,
    /// Timestamp column could not be read as a date.
    pub bad_timestamp: usize,
}

impl DroppedRows {
    pub fn total(&self) -> usize {
        self.non_numeric + self.bad_timestamp
    }
}

/// A non-empty, finite-valued `(ds, y)` series in input order.
///
/// Duplicate or unsorted timestamps are kept as they came.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSeries {
    points: Vec<Observation>,
    dropped: DroppedRows,
}

impl ValidatedSeries {
    /// Build from observations, refusing empty input and non-finite values.
    pub fn from_observations(points: Vec<Observation>) -> Option<Self> {
        Self::with_dropped(points, DroppedRows::default())
    }

    pub(crate) fn with_dropped(points: Vec<Observation>, dropped: DroppedRows) -> Option<Self> {
        if points.is_empty() || points.iter().any(|p| !p.y.is_finite()) {
            return None;
        }
        Some(Self { points, dropped })
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dropped(&self) -> DroppedRows {
        self.dropped
    }

    /// Number of distinct timestamps.
    pub fn distinct_timestamps(&self) -> usize {
        self.sorted_distinct_dates().len()
    }

    /// Distinct timestamps in chronological order.
    pub fn sorted_distinct_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.points.iter().map(|p| p.ds).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// The last `n` observations.
    pub fn tail(&self, n: usize) -> &[Observation] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn numeric_coercion_follows_lenient_rules() {
        assert_eq!(Cell::Integer(3).to_numeric(), Some(3.0));
        assert_eq!(Cell::Text(" 101.5 ".into()).to_numeric(), Some(101.5));
        assert_eq!(Cell::Bool(true).to_numeric(), Some(1.0));
        assert_eq!(Cell::Text("bad".into()).to_numeric(), None);
        assert_eq!(Cell::Text("NaN".into()).to_numeric(), None);
        assert_eq!(Cell::Float(f64::INFINITY).to_numeric(), None);
        assert_eq!(Cell::Null.to_numeric(), None);
        assert_eq!(Cell::Date(date(2024, 1, 1)).to_numeric(), None);
    }

    #[test]
    fn date_coercion_accepts_common_spellings() {
        let want = Some(date(2024, 1, 2));
        assert_eq!(Cell::Text("2024-01-02".into()).to_date(), want);
        assert_eq!(Cell::Text("2024/01/02".into()).to_date(), want);
        assert_eq!(Cell::Text("01/02/2024".into()).to_date(), want);
        assert_eq!(Cell::Text("2024-01-02 00:00:00".into()).to_date(), want);
        assert_eq!(Cell::Text("2024-01-02T09:30:00-05:00".into()).to_date(), want);
        assert_eq!(Cell::Text("yesterday".into()).to_date(), None);
        assert_eq!(Cell::Integer(20240102).to_date(), None);
    }

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let raw = RawSeries::empty(vec!["date".into(), "Close".into()]);
        assert_eq!(raw.column_index("Date"), Some(0));
        assert_eq!(raw.column_index("Close"), Some(1));
        assert_eq!(raw.column_index("Volume"), None);
    }

    #[test]
    fn validated_series_refuses_empty_and_non_finite() {
        assert!(ValidatedSeries::from_observations(vec![]).is_none());
        assert!(ValidatedSeries::from_observations(vec![Observation::new(date(2024, 1, 1), f64::NAN)]).is_none());
    }

    #[test]
    fn distinct_dates_are_sorted_and_deduplicated() {
        let series = ValidatedSeries::from_observations(vec![
            Observation::new(date(2024, 1, 3), 1.0),
            Observation::new(date(2024, 1, 1), 2.0),
            Observation::new(date(2024, 1, 3), 3.0),
        ])
        .unwrap();
        assert_eq!(series.distinct_timestamps(), 2);
        assert_eq!(series.sorted_distinct_dates(), vec![date(2024, 1, 1), date(2024, 1, 3)]);
        // original order untouched
        assert_eq!(series.points()[0].ds, date(2024, 1, 3));
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(10).len(), 3);
    }
}
