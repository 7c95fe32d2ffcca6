//! Forecasting: the engine contract, the bundled additive engine, and the
//! orchestrator that turns engine failures into typed results.

pub mod additive;
pub mod orchestrator;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::model::ValidatedSeries;

pub use additive::AdditiveEngine;
pub use orchestrator::{DEFAULT_HORIZON, ForecastError, Forecaster};

/// One point on the forecast axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// A named seasonal contribution, aligned with the forecast rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalComponent {
    pub name: String,
    pub period_days: f64,
    pub values: Vec<f64>,
}

/// Additive breakdown of a forecast, aligned with [`ForecastResult::rows`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub trend: Vec<f64>,
    pub seasonal: Vec<SeasonalComponent>,
}

/// Predictions over history plus horizon, with their decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub rows: Vec<ForecastRow>,
    pub components: Components,
    /// Number of leading rows that fall on history dates.
    pub history_len: usize,
}

impl ForecastResult {
    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &[ForecastRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Rows strictly after the last history date.
    pub fn future(&self) -> &[ForecastRow] {
        &self.rows[self.history_len.min(self.rows.len())..]
    }
}

/// Most frequent gap, in days, between consecutive sorted distinct dates.
///
/// Ties go to the shorter gap; fewer than two dates give one day.
pub fn infer_step_days(sorted_dates: &[NaiveDate]) -> i64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for pair in sorted_dates.windows(2) {
        let gap = (pair[1] - pair[0]).num_days();
        if gap > 0 {
            *counts.entry(gap).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(gap, count)| (count, Reverse(gap)))
        .map_or(1, |(gap, _)| gap)
}

/// Failure reported by a forecasting engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// A fit/predict/decompose forecasting backend.
pub trait ForecastEngine: Send + Sync {
    type Model: Send;

    /// Fewest distinct timestamps `fit` accepts.
    fn min_observations(&self) -> usize {
        2
    }

    fn fit(&self, series: &ValidatedSeries) -> Result<Self::Model, EngineError>;

    fn predict(&self, model: &Self::Model, timestamps: &[NaiveDate]) -> Result<Vec<ForecastRow>, EngineError>;

    fn decompose(&self, model: &Self::Model, forecast: &[ForecastRow]) -> Result<Components, EngineError>;
}
