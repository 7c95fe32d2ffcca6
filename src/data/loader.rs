use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Cell, RawRow, RawSeries, parse_date};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Extensions [`load_file`] understands.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["csv", "json", "parquet", "pq"];

/// Load a raw price table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one row per trading day (`Date,Open,...,Close,...`)
/// * `.json`    – `[{ "Date": "2024-01-02", "Close": 185.6, ... }, ...]`
/// * `.parquet` – one scalar column per field, dates as Date32/Date64/Timestamp
pub fn load_file(path: &Path) -> Result<RawSeries> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records', date_format='iso')`):
///
/// ```json
/// [
///   { "Date": "2024-01-02", "Open": 187.15, "Close": 185.64, "Volume": 82488700 },
///   ...
/// ]
/// ```
///
/// Columns are ordered by first appearance.
fn load_json(path: &Path) -> Result<RawSeries> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            RawRow(
                columns
                    .iter()
                    .map(|col| obj.get(col).map(json_to_cell).unwrap_or(Cell::Null))
                    .collect(),
            )
        })
        .collect();

    Ok(RawSeries::new(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => guess_cell(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one trading day per row.
/// Cells are type-guessed; malformed prices stay as text for the validator.
fn load_csv(path: &Path) -> Result<RawSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cells = (0..columns.len())
            .map(|i| record.get(i).map(guess_cell).unwrap_or(Cell::Null))
            .collect();
        rows.push(RawRow(cells));
    }

    Ok(RawSeries::new(columns, rows))
}

fn guess_cell(s: &str) -> Cell {
    let s = s.trim();
    if s.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    if s == "true" || s == "false" {
        return Cell::Bool(s == "true");
    }
    if let Some(d) = parse_date(s) {
        return Cell::Date(d);
    }
    Cell::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one scalar column per field.
///
/// Works with files written by **Pandas** (`df.reset_index().to_parquet()`),
/// where `Date` arrives as `timestamp[ns]`, and by **Polars**.
fn load_parquet(path: &Path) -> Result<RawSeries> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let arrays = batch
            .columns()
            .iter()
            .map(normalize_column)
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            rows.push(RawRow(
                arrays.iter().map(|col| extract_cell(col, row)).collect(),
            ));
        }
    }

    Ok(RawSeries::new(columns, rows))
}

// -- Parquet / Arrow helpers --

/// Cast date-like columns to Date32 so rows can be read uniformly.
fn normalize_column(col: &Arc<dyn Array>) -> Result<Arc<dyn Array>> {
    match col.data_type() {
        DataType::Date64 | DataType::Timestamp(_, _) => {
            cast(col, &DataType::Date32).context("casting timestamp column to dates")
        }
        _ => Ok(Arc::clone(col)),
    }
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Cell::Null, |a| Cell::Integer(i64::from(a.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Cell::Null, |a| Cell::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Cell::Null, |a| Cell::Float(f64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Cell::Null, |a| Cell::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Cell::Null, |a| Cell::Bool(a.value(row))),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map_or(Cell::Null, Cell::Date),
        other => Cell::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::array::{Float64Array, StringArray, TimestampNanosecondArray};
    use arrow::datatypes::{Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use chrono::NaiveDate;
    use parquet::arrow::ArrowWriter;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_cells_are_type_guessed() {
        let file = write_temp(
            ".csv",
            "Date,Close,Volume\n2024-01-02,185.64,82488700\n2024-01-03,bad,\n",
        );
        let raw = load_file(file.path()).unwrap();
        assert_eq!(raw.columns, vec!["Date", "Close", "Volume"]);
        assert_eq!(raw.len(), 2);
        assert_eq!(
            raw.rows[0].0,
            vec![
                Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
                Cell::Float(185.64),
                Cell::Integer(82488700),
            ]
        );
        assert_eq!(raw.rows[1].get(1), &Cell::Text("bad".into()));
        assert_eq!(raw.rows[1].get(2), &Cell::Null);
    }

    #[test]
    fn json_records_union_their_keys() {
        let file = write_temp(
            ".json",
            r#"[{"Date":"2024-01-02","Close":185.64},{"Date":"2024-01-03","Close":null,"Note":"halt"}]"#,
        );
        let raw = load_file(file.path()).unwrap();
        assert_eq!(raw.columns, vec!["Date", "Close", "Note"]);
        assert_eq!(raw.rows[0].get(2), &Cell::Null);
        assert_eq!(raw.rows[1].get(1), &Cell::Null);
        assert_eq!(raw.rows[1].get(2), &Cell::Text("halt".into()));
    }

    #[test]
    fn json_must_be_an_array() {
        let file = write_temp(".json", r#"{"Date":"2024-01-02"}"#);
        assert!(load_file(file.path()).is_err());
    }

    #[test]
    fn parquet_timestamps_become_dates() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Date", DataType::Timestamp(TimeUnit::Nanosecond, None), false),
            Field::new("Close", DataType::Float64, true),
            Field::new("Ticker", DataType::Utf8, false),
        ]));
        let day_ns = 86_400_000_000_000i64;
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let jan2_ns = (jan2 - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() * day_ns;
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(TimestampNanosecondArray::from(vec![jan2_ns, jan2_ns + day_ns])),
                Arc::new(Float64Array::from(vec![Some(185.64), None])),
                Arc::new(StringArray::from(vec!["AAPL", "AAPL"])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let raw = load_file(file.path()).unwrap();
        assert_eq!(raw.columns, vec!["Date", "Close", "Ticker"]);
        assert_eq!(raw.rows[0].get(0), &Cell::Date(jan2));
        assert_eq!(raw.rows[0].get(1), &Cell::Float(185.64));
        assert_eq!(raw.rows[1].get(1), &Cell::Null);
        assert_eq!(raw.rows[1].get(2), &Cell::Text("AAPL".into()));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_temp(".xlsx", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
