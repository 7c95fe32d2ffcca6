use thiserror::Error;

use super::model::{DroppedRows, Observation, RawSeries, ValidatedSeries};

// ---------------------------------------------------------------------------
// Schema: which raw columns carry the timestamp and the value
// ---------------------------------------------------------------------------

/// Names of the two raw columns that become `ds` and `y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSchema {
    pub timestamp_column: String,
    pub value_column: String,
}

impl Default for SeriesSchema {
    fn default() -> Self {
        Self {
            timestamp_column: "Date".to_string(),
            value_column: "Close".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("price data is missing the required '{column}' column")]
    Schema { column: String },
    #[error("no usable rows: {}", describe_empty(.dropped))]
    EmptySeries { dropped: DroppedRows },
}

fn describe_empty(dropped: &DroppedRows) -> String {
    if dropped.total() == 0 {
        "the series has no rows".to_string()
    } else {
        format!(
            "{} rows had a non-numeric value and {} an unreadable date",
            dropped.non_numeric, dropped.bad_timestamp
        )
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Turn a raw price table into a clean `(ds, y)` series.
///
/// Rows whose value does not coerce to a finite number, or whose timestamp
/// does not coerce to a date, are dropped. Order and duplicates are kept.
pub fn validate(raw: &RawSeries, schema: &SeriesSchema) -> Result<ValidatedSeries, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptySeries {
            dropped: DroppedRows::default(),
        });
    }

    let ds_idx = raw
        .column_index(&schema.timestamp_column)
        .ok_or_else(|| ValidationError::Schema {
            column: schema.timestamp_column.clone(),
        })?;
    let y_idx = raw
        .column_index(&schema.value_column)
        .ok_or_else(|| ValidationError::Schema {
            column: schema.value_column.clone(),
        })?;

    let mut dropped = DroppedRows::default();
    let mut points = Vec::with_capacity(raw.len());

    for row in &raw.rows {
        let Some(y) = row.get(y_idx).to_numeric() else {
            dropped.non_numeric += 1;
            continue;
        };
        let Some(ds) = row.get(ds_idx).to_date() else {
            dropped.bad_timestamp += 1;
            continue;
        };
        points.push(Observation::new(ds, y));
    }

    if dropped.total() > 0 {
        log::debug!(
            "validation dropped {} of {} rows ({} non-numeric, {} bad timestamps)",
            dropped.total(),
            raw.len(),
            dropped.non_numeric,
            dropped.bad_timestamp
        );
    }

    ValidatedSeries::with_dropped(points, dropped).ok_or(ValidationError::EmptySeries { dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Cell, RawRow};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(rows: Vec<(Cell, Cell)>) -> RawSeries {
        RawSeries::new(
            vec!["Date".into(), "Open".into(), "Close".into()],
            rows.into_iter()
                .map(|(d, c)| RawRow(vec![d, Cell::Float(1.0), c]))
                .collect(),
        )
    }

    #[test]
    fn drops_the_bad_middle_row() {
        let raw = table(vec![
            (Cell::Date(date(2024, 1, 1)), Cell::Integer(100)),
            (Cell::Date(date(2024, 1, 2)), Cell::Text("bad".into())),
            (Cell::Date(date(2024, 1, 3)), Cell::Integer(102)),
        ]);
        let series = validate(&raw, &SeriesSchema::default()).unwrap();
        assert_eq!(
            series.points(),
            &[
                Observation::new(date(2024, 1, 1), 100.0),
                Observation::new(date(2024, 1, 3), 102.0),
            ]
        );
        assert_eq!(series.dropped().non_numeric, 1);
    }

    #[test]
    fn keeps_an_order_preserving_subsequence() {
        let values = [
            Cell::Float(5.0),
            Cell::Null,
            Cell::Text("7.5".into()),
            Cell::Text("n/a".into()),
            Cell::Float(f64::NAN),
            Cell::Integer(2),
        ];
        let raw = table(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (Cell::Date(date(2024, 2, 1 + i as u32)), v.clone()))
                .collect(),
        );
        let series = validate(&raw, &SeriesSchema::default()).unwrap();
        let got: Vec<(u32, f64)> = series
            .points()
            .iter()
            .map(|p| (chrono::Datelike::day(&p.ds), p.y))
            .collect();
        assert_eq!(got, vec![(1, 5.0), (3, 7.5), (6, 2.0)]);
        assert_eq!(series.dropped().non_numeric, 3);
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let raw = RawSeries::new(
            vec!["Date".into(), "Open".into()],
            vec![RawRow(vec![Cell::Date(date(2024, 1, 1)), Cell::Float(1.0)])],
        );
        assert_eq!(
            validate(&raw, &SeriesSchema::default()),
            Err(ValidationError::Schema {
                column: "Close".into()
            })
        );

        let raw = RawSeries::new(
            vec!["Close".into()],
            vec![RawRow(vec![Cell::Float(1.0)])],
        );
        assert_eq!(
            validate(&raw, &SeriesSchema::default()),
            Err(ValidationError::Schema {
                column: "Date".into()
            })
        );
    }

    #[test]
    fn empty_input_is_an_error_not_an_empty_success() {
        let raw = RawSeries::empty(vec!["Date".into(), "Close".into()]);
        assert!(matches!(
            validate(&raw, &SeriesSchema::default()),
            Err(ValidationError::EmptySeries { dropped }) if dropped.total() == 0
        ));

        let raw = table(vec![(Cell::Date(date(2024, 1, 1)), Cell::Text("x".into()))]);
        assert!(matches!(
            validate(&raw, &SeriesSchema::default()),
            Err(ValidationError::EmptySeries { dropped }) if dropped.non_numeric == 1
        ));
    }

    #[test]
    fn duplicates_and_disorder_pass_through() {
        let raw = table(vec![
            (Cell::Text("2024-01-03".into()), Cell::Float(3.0)),
            (Cell::Text("2024-01-01".into()), Cell::Float(1.0)),
            (Cell::Text("2024-01-01".into()), Cell::Float(1.5)),
        ]);
        let series = validate(&raw, &SeriesSchema::default()).unwrap();
        let days: Vec<NaiveDate> = series.points().iter().map(|p| p.ds).collect();
        assert_eq!(days, vec![date(2024, 1, 3), date(2024, 1, 1), date(2024, 1, 1)]);
    }

    #[test]
    fn unreadable_timestamps_are_dropped_and_counted() {
        let raw = table(vec![
            (Cell::Text("someday".into()), Cell::Float(3.0)),
            (Cell::Text("2024-01-01".into()), Cell::Float(1.0)),
        ]);
        let series = validate(&raw, &SeriesSchema::default()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.dropped().bad_timestamp, 1);
    }

    #[test]
    fn custom_schema_selects_other_columns() {
        let raw = RawSeries::new(
            vec!["when".into(), "adj close".into()],
            vec![RawRow(vec![Cell::Text("2024-01-01".into()), Cell::Float(9.0)])],
        );
        let schema = SeriesSchema {
            timestamp_column: "When".into(),
            value_column: "Adj Close".into(),
        };
        let series = validate(&raw, &schema).unwrap();
        assert_eq!(series.points()[0].y, 9.0);
    }
}
