//! Where raw price tables come from.

pub mod directory;
pub mod yahoo;

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::model::RawSeries;

pub use directory::DirectorySource;
pub use yahoo::YahooSource;

/// One retrieval request. Nothing here is validated; an inverted range is
/// passed through and simply yields no rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceQuery {
    pub ticker: String,
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
}

impl PriceQuery {
    pub fn new(ticker: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for PriceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} .. {})", self.ticker, self.start, self.end)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered HTTP {status}")]
    Http { status: u16 },
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("could not read {path}: {message}")]
    Load { path: String, message: String },
}

/// Fetches the raw daily price table for a ticker and date range.
///
/// An unknown ticker or an empty range is an empty [`RawSeries`], not an error.
pub trait PriceSource {
    fn name(&self) -> &str;

    fn fetch(&self, query: &PriceQuery) -> Result<RawSeries, SourceError>;
}

impl<S: PriceSource + ?Sized> PriceSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, query: &PriceQuery) -> Result<RawSeries, SourceError> {
        (**self).fetch(query)
    }
}

/// Column layout every built-in source produces.
pub fn price_columns() -> Vec<String> {
    ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"]
        .into_iter()
        .map(String::from)
        .collect()
}
