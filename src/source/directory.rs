use std::path::PathBuf;

use super::{PriceQuery, PriceSource, SourceError, price_columns};
use crate::data::loader::{SUPPORTED_EXTENSIONS, load_file};
use crate::data::model::RawSeries;

/// Price files on disk, one per ticker: `<root>/<TICKER>.<csv|json|parquet|pq>`.
pub struct DirectorySource {
    root: PathBuf,
    timestamp_column: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timestamp_column: "Date".to_string(),
        }
    }

    fn find_file(&self, ticker: &str) -> Option<PathBuf> {
        let stem = ticker.trim();
        [stem.to_ascii_uppercase(), stem.to_string()]
            .iter()
            .flat_map(|s| SUPPORTED_EXTENSIONS.iter().map(move |ext| self.root.join(format!("{s}.{ext}"))))
            .find(|p| p.is_file())
    }
}

impl PriceSource for DirectorySource {
    fn name(&self) -> &str {
        "Local files"
    }

    fn fetch(&self, query: &PriceQuery) -> Result<RawSeries, SourceError> {
        let Some(path) = self.find_file(&query.ticker) else {
            log::info!("no price file for {} under {}", query.ticker, self.root.display());
            return Ok(RawSeries::empty(price_columns()));
        };

        let mut raw = load_file(&path).map_err(|e| SourceError::Load {
            path: path.display().to_string(),
            message: format!("{e:#}"),
        })?;

        // rows with unreadable dates are left for the validator to judge
        if let Some(idx) = raw.column_index(&self.timestamp_column) {
            raw.rows.retain(|row| {
                row.get(idx)
                    .to_date()
                    .map_or(true, |d| d >= query.start && d < query.end)
            });
        }

        log::info!("read {} rows for {query} from {}", raw.len(), path.display());
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Cell;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn reads_the_ticker_file_and_clips_to_the_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("DEMO.csv"),
            "Date,Close\n2024-01-01,1\n2024-01-02,2\nsometime,3\n2024-01-03,4\n",
        )
        .unwrap();

        let source = DirectorySource::new(dir.path());
        let raw = source
            .fetch(&PriceQuery::new("demo", date(1, 2), date(1, 3)))
            .unwrap();
        let closes: Vec<&Cell> = raw.rows.iter().map(|r| r.get(1)).collect();
        assert_eq!(closes, vec![&Cell::Integer(2), &Cell::Integer(3)]);
    }

    #[test]
    fn missing_ticker_is_an_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let raw = DirectorySource::new(dir.path())
            .fetch(&PriceQuery::new("ZZZZ", date(1, 1), date(2, 1)))
            .unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn unreadable_files_are_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BAD.json"), "{not json").unwrap();
        let err = DirectorySource::new(dir.path())
            .fetch(&PriceQuery::new("BAD", date(1, 1), date(2, 1)))
            .unwrap_err();
        assert!(matches!(err, SourceError::Load { .. }));
    }
}
