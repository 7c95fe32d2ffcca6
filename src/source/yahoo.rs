use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::{PriceQuery, PriceSource, SourceError, price_columns};
use crate::data::model::{Cell, RawRow, RawSeries};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// Yahoo rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) rusty-forecast/0.1";

// ---------------------------------------------------------------------------
// Yahoo Finance chart API
// ---------------------------------------------------------------------------

/// Daily bars from Yahoo's public `v8/finance/chart` endpoint.
pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, ticker: &str) -> Result<reqwest::Url, SourceError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SourceError::Parse(format!("bad base URL '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Parse(format!("base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker.trim()]);
        Ok(url)
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn fetch(&self, query: &PriceQuery) -> Result<RawSeries, SourceError> {
        let url = self.chart_url(&query.ticker)?;
        log::debug!("GET {url} for {query}");

        let response = self
            .client
            .get(url)
            .query(&[
                ("period1", unix_midnight(query.start).to_string()),
                ("period2", unix_midnight(query.end).to_string()),
                ("interval", "1d".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            log::info!("{}: ticker not found", query.ticker);
            return Ok(RawSeries::empty(price_columns()));
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        let raw = parse_chart(&body)?;
        log::info!("fetched {} rows for {query}", raw.len());
        Ok(raw)
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Turn a chart API payload into a raw price table.
///
/// A "Not Found" API error or a result without timestamps is an empty table.
pub fn parse_chart(body: &str) -> Result<RawSeries, SourceError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Parse(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(RawSeries::empty(price_columns()));
        }
        return Err(SourceError::Parse(format!(
            "yahoo chart API error {}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(RawSeries::empty(price_columns()));
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(RawSeries::empty(price_columns()));
    };

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let price = |values: &[Option<f64>], i: usize| -> Cell {
        values.get(i).copied().flatten().map_or(Cell::Null, Cell::Float)
    };

    let rows = timestamps
        .iter()
        .enumerate()
        .map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts + offset, 0)
                .map_or(Cell::Null, |dt| Cell::Date(dt.date_naive()));
            RawRow(vec![
                date,
                price(&quote.open, i),
                price(&quote.high, i),
                price(&quote.low, i),
                price(&quote.close, i),
                price(&adjclose, i),
                quote
                    .volume
                    .get(i)
                    .copied()
                    .flatten()
                    .map_or(Cell::Null, Cell::Integer),
            ])
        })
        .collect();

    Ok(RawSeries::new(price_columns(), rows))
}

// ---------------------------------------------------------------------------
// Chart API payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DAYS: &str = r#"{
      "chart": {
        "result": [{
          "meta": { "symbol": "AAPL", "gmtoffset": -18000 },
          "timestamp": [1704205800, 1704292200],
          "indicators": {
            "quote": [{
              "open": [187.15, 184.22],
              "high": [188.44, 185.88],
              "low": [183.89, 183.43],
              "close": [185.64, null],
              "volume": [82488700, 58414500]
            }],
            "adjclose": [{ "adjclose": [184.94, null] }]
          }
        }],
        "error": null
      }
    }"#;

    #[test]
    fn parses_daily_bars_in_exchange_time() {
        let raw = parse_chart(TWO_DAYS).unwrap();
        assert_eq!(raw.columns, price_columns());
        assert_eq!(raw.len(), 2);
        assert_eq!(
            raw.rows[0].get(0),
            &Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(raw.rows[0].get(4), &Cell::Float(185.64));
        assert_eq!(raw.rows[0].get(5), &Cell::Float(184.94));
        assert_eq!(raw.rows[0].get(6), &Cell::Integer(82488700));
        assert_eq!(raw.rows[1].get(4), &Cell::Null);
    }

    #[test]
    fn not_found_is_an_empty_table() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let raw = parse_chart(body).unwrap();
        assert!(raw.is_empty());
        assert_eq!(raw.columns, price_columns());
    }

    #[test]
    fn result_without_timestamps_is_empty() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(body).unwrap().is_empty());
    }

    #[test]
    fn other_api_errors_and_garbage_are_parse_errors() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(parse_chart(body), Err(SourceError::Parse(msg)) if msg.contains("Bad Request")));
        assert!(matches!(parse_chart("<html>"), Err(SourceError::Parse(_))));
    }

    #[test]
    fn chart_url_encodes_the_ticker_as_a_path_segment() {
        let source = YahooSource::new("https://example.test/", Duration::from_secs(1)).unwrap();
        let url = source.chart_url(" BRK-B ").unwrap();
        assert_eq!(url.as_str(), "https://example.test/v8/finance/chart/BRK-B");
    }

    #[test]
    fn query_bounds_are_utc_midnights() {
        assert_eq!(unix_midnight(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()), 1704153600);
    }
}
