//! Writes a synthetic `DEMO` price history to `sample_data/` as CSV, JSON
//! and Parquet, for use with the local-files source.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use parquet::arrow::ArrowWriter;
use serde_json::{Value as JsonValue, json};

const TICKER: &str = "DEMO";
const OUTPUT_DIR: &str = "sample_data";

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One trading day. `close` is `None` for the deliberately broken rows.
struct Bar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: Option<f64>,
    volume: i64,
}

/// How a broken close is spelled in the text formats.
fn broken_close(i: usize) -> &'static str {
    if i % 2 == 0 { "bad" } else { "" }
}

// ---------------------------------------------------------------------------
// Price model: geometric random walk plus weekly and yearly swings
// ---------------------------------------------------------------------------

fn generate_bars(start: NaiveDate, end: NaiveDate, rng: &mut SimpleRng) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut level: f64 = 100.0;
    let mut date = start;
    let mut broken = 0usize;

    while date < end {
        let weekday = date.weekday();
        if weekday != Weekday::Sat && weekday != Weekday::Sun {
            level *= (0.0004 + rng.gauss(0.0, 0.012)).exp();

            let yearly = 4.0 * (2.0 * std::f64::consts::PI * f64::from(date.ordinal()) / 365.25).sin();
            let weekly = 0.6 * (2.0 * std::f64::consts::PI * f64::from(weekday.num_days_from_monday()) / 5.0).cos();
            let close = level + yearly + weekly;

            let open = close * (1.0 + rng.gauss(0.0, 0.004));
            let spread = close * rng.next_f64() * 0.015;
            let high = open.max(close) + spread;
            let low = open.min(close) - spread;
            let volume = 1_000_000 + (rng.next_f64() * 4_000_000.0) as i64;

            // roughly one malformed close every 200 rows
            let keep = rng.next_f64() > 0.005;
            if !keep {
                broken += 1;
            }
            bars.push(Bar {
                date,
                open,
                high,
                low,
                close: keep.then_some(close),
                volume,
            });
        }
        date = date + Days::new(1);
    }

    log::info!("generated {} bars, {broken} with a broken close", bars.len());
    bars
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_csv(bars: &[Bar], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"])?;
    for (i, bar) in bars.iter().enumerate() {
        let close = bar
            .close
            .map(|c| format!("{c:.4}"))
            .unwrap_or_else(|| broken_close(i).to_string());
        writer.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            format!("{:.4}", bar.open),
            format!("{:.4}", bar.high),
            format!("{:.4}", bar.low),
            close.clone(),
            close,
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(bars: &[Bar], path: &Path) -> Result<()> {
    let records: Vec<JsonValue> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let close = match bar.close {
                Some(c) => json!(c),
                None if i % 2 == 0 => json!(broken_close(i)),
                None => JsonValue::Null,
            };
            json!({
                "Date": bar.date.format("%Y-%m-%d").to_string(),
                "Open": bar.open,
                "High": bar.high,
                "Low": bar.low,
                "Close": close,
                "Adj Close": close,
                "Volume": bar.volume,
            })
        })
        .collect();

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &records)?;
    Ok(())
}

fn write_parquet(bars: &[Bar], path: &Path) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("unix epoch")?;
    let dates = Date32Array::from(
        bars.iter()
            .map(|b| (b.date - epoch).num_days() as i32)
            .collect::<Vec<_>>(),
    );
    let prices = |f: fn(&Bar) -> f64| -> ArrayRef { Arc::new(Float64Array::from(bars.iter().map(f).collect::<Vec<_>>())) };
    let closes: ArrayRef = Arc::new(Float64Array::from(bars.iter().map(|b| b.close).collect::<Vec<_>>()));

    let schema = Arc::new(Schema::new(vec![
        Field::new("Date", DataType::Date32, false),
        Field::new("Open", DataType::Float64, false),
        Field::new("High", DataType::Float64, false),
        Field::new("Low", DataType::Float64, false),
        Field::new("Close", DataType::Float64, true),
        Field::new("Adj Close", DataType::Float64, true),
        Field::new("Volume", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(dates),
            prices(|b| b.open),
            prices(|b| b.high),
            prices(|b| b.low),
            closes.clone(),
            closes,
            Arc::new(Int64Array::from(bars.iter().map(|b| b.volume).collect::<Vec<_>>())),
        ],
    )
    .context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let start = NaiveDate::from_ymd_opt(2020, 1, 1).context("start date")?;
    let end = NaiveDate::from_ymd_opt(2024, 7, 1).context("end date")?;
    let mut rng = SimpleRng::new(42);
    let bars = generate_bars(start, end, &mut rng);

    let dir = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {OUTPUT_DIR}"))?;

    write_csv(&bars, &dir.join(format!("{TICKER}.csv")))?;
    write_json(&bars, &dir.join(format!("{TICKER}.json")))?;
    write_parquet(&bars, &dir.join(format!("{TICKER}.parquet")))?;

    println!("Wrote {} trading days of {TICKER} to {OUTPUT_DIR}/ (csv, json, parquet)", bars.len());
    Ok(())
}
