//! One user-triggered run: fetch → validate → forecast → display.
//!
//! ```text
//! IDLE ─► FETCHING ─► VALIDATING ─┬─► EMPTY ─► NoData / EmptyAfterValidation
//!                                 └─► VALID ─► FORECASTING ─┬─► FAILED ─► InsufficientData / ForecastFailed
//!                                                           └─► DONE ───► Ok
//! ```
//! Every state is terminal for the run; nothing carries over except what the
//! caller keeps in its own [`SeriesCache`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::cache::{CacheKey, SeriesCache};
use crate::data::model::{RawSeries, ValidatedSeries};
use crate::data::validate::{SeriesSchema, ValidationError, validate};
use crate::forecast::orchestrator::panic_message;
use crate::forecast::{DEFAULT_HORIZON, ForecastEngine, ForecastError, ForecastResult, Forecaster};
use crate::present::DisplayBundle;
use crate::source::{PriceQuery, PriceSource};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NoData,
    FetchFailed,
    SchemaInvalid,
    EmptyAfterValidation,
    InsufficientData,
    ForecastFailed,
    Ok,
}

impl RunStatus {
    /// Outcomes caused by the inputs rather than by a fault.
    pub fn is_warning(self) -> bool {
        matches!(self, RunStatus::NoData | RunStatus::EmptyAfterValidation | RunStatus::InsufficientData)
    }

    pub fn is_error(self) -> bool {
        matches!(self, RunStatus::FetchFailed | RunStatus::SchemaInvalid | RunStatus::ForecastFailed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::NoData => "NO_DATA",
            RunStatus::FetchFailed => "FETCH_FAILED",
            RunStatus::SchemaInvalid => "SCHEMA_INVALID",
            RunStatus::EmptyAfterValidation => "EMPTY_AFTER_VALIDATION",
            RunStatus::InsufficientData => "INSUFFICIENT_DATA",
            RunStatus::ForecastFailed => "FORECAST_FAILED",
            RunStatus::Ok => "OK",
        };
        f.write_str(s)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// What was run, e.g. the ticker or file name.
    pub label: String,
    pub status: RunStatus,
    /// User-facing explanation; set for every non-`Ok` status.
    pub message: Option<String>,
    pub raw: Option<Arc<RawSeries>>,
    pub series: Option<ValidatedSeries>,
    pub forecast: Option<ForecastResult>,
}

impl RunOutcome {
    fn halted(label: &str, status: RunStatus, message: String, raw: Option<Arc<RawSeries>>) -> Self {
        Self {
            label: label.to_string(),
            status,
            message: Some(message),
            raw,
            series: None,
            forecast: None,
        }
    }

    /// Views for the front-end; `None` when validation never succeeded.
    pub fn display(&self, tail_rows: usize) -> Option<DisplayBundle<'_>> {
        self.series
            .as_ref()
            .map(|s| DisplayBundle::build(s, self.forecast.as_ref(), tail_rows))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<S, E> {
    source: S,
    forecaster: Forecaster<E>,
    schema: SeriesSchema,
    horizon: usize,
}

impl<S: PriceSource, E: ForecastEngine + 'static> Pipeline<S, E> {
    pub fn new(source: S, forecaster: Forecaster<E>) -> Self {
        Self {
            source,
            forecaster,
            schema: SeriesSchema::default(),
            horizon: DEFAULT_HORIZON,
        }
    }

    pub fn with_schema(mut self, schema: SeriesSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch (through `cache` when given) and process one query.
    pub fn run(&self, query: &PriceQuery, cache: Option<&mut SeriesCache>) -> RunOutcome {
        log::debug!("{query}: fetching from {}", self.source.name());

        let fetched = match cache {
            Some(cache) => cache.get_or_fetch(CacheKey::from(query), || self.source.fetch(query)),
            None => self.source.fetch(query).map(Arc::new),
        };

        match fetched {
            Ok(raw) => self.run_raw(&query.ticker, raw),
            Err(e) => {
                log::error!("{query}: fetch failed: {e}");
                RunOutcome::halted(
                    &query.ticker,
                    RunStatus::FetchFailed,
                    format!("Failed to retrieve data for {}: {e}", query.ticker),
                    None,
                )
            }
        }
    }

    /// Process an already loaded table, e.g. a file the user opened.
    pub fn run_raw(&self, label: &str, raw: Arc<RawSeries>) -> RunOutcome {
        if raw.is_empty() {
            log::warn!("{label}: no rows returned");
            return RunOutcome::halted(
                label,
                RunStatus::NoData,
                format!("No data available for {label}. Please check the stock ticker and date range."),
                Some(raw),
            );
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.validate_and_forecast(label, &raw)));
        match attempt {
            Ok((series, forecast)) => finish(label, raw, series, forecast),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                log::error!("{label}: run aborted by an internal fault: {msg}");
                RunOutcome::halted(
                    label,
                    RunStatus::ForecastFailed,
                    format!("Forecast failed for {label}: {msg}"),
                    Some(raw),
                )
            }
        }
    }

    fn validate_and_forecast(
        &self,
        label: &str,
        raw: &RawSeries,
    ) -> (Result<ValidatedSeries, ValidationError>, Option<Result<ForecastResult, ForecastError>>) {
        log::debug!("{label}: validating {} rows", raw.len());
        let series = validate(raw, &self.schema);
        let forecast = series.as_ref().ok().map(|s| {
            log::debug!("{label}: forecasting {} observations, horizon {}", s.len(), self.horizon);
            self.forecaster.forecast(s, self.horizon)
        });
        (series, forecast)
    }
}

fn finish(
    label: &str,
    raw: Arc<RawSeries>,
    series: Result<ValidatedSeries, ValidationError>,
    forecast: Option<Result<ForecastResult, ForecastError>>,
) -> RunOutcome {
    let series = match series {
        Ok(series) => series,
        Err(e @ ValidationError::Schema { .. }) => {
            log::error!("{label}: {e}");
            return RunOutcome::halted(label, RunStatus::SchemaInvalid, format!("Data formatting error: {e}"), Some(raw));
        }
        Err(e @ ValidationError::EmptySeries { .. }) => {
            log::warn!("{label}: {e}");
            return RunOutcome::halted(
                label,
                RunStatus::EmptyAfterValidation,
                format!("No usable closing prices for {label}: {e}"),
                Some(raw),
            );
        }
    };

    let dropped = series.dropped();
    let mut outcome = RunOutcome {
        label: label.to_string(),
        status: RunStatus::Ok,
        message: (dropped.total() > 0).then(|| {
            format!(
                "Dropped {} of {} rows with unusable values",
                dropped.total(),
                raw.len()
            )
        }),
        raw: Some(raw),
        series: None,
        forecast: None,
    };

    match forecast {
        Some(Ok(forecast)) => {
            outcome.forecast = Some(forecast);
        }
        Some(Err(e @ ForecastError::InsufficientData { .. })) => {
            log::warn!("{label}: {e}");
            outcome.status = RunStatus::InsufficientData;
            outcome.message = Some(format!("Not enough history to forecast {label}: {e}"));
        }
        Some(Err(e)) => {
            log::error!("{label}: {e}");
            outcome.status = RunStatus::ForecastFailed;
            outcome.message = Some(format!("Forecast failed for {label}: {e}"));
        }
        None => {
            outcome.status = RunStatus::ForecastFailed;
            outcome.message = Some(format!("Forecast failed for {label}: no forecast was attempted"));
        }
    }

    outcome.series = Some(series);
    outcome
}
