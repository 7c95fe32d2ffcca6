//! Display-ready views over a run's results.

use crate::data::model::{Observation, ValidatedSeries};
use crate::forecast::{Components, ForecastResult, ForecastRow};

/// Rows shown in the "tail" previews.
pub const TAIL_ROWS: usize = 5;

/// Borrowed views for the front-end. Holds no data of its own.
#[derive(Debug, Clone, Copy)]
pub struct DisplayBundle<'a> {
    /// Most recent validated observations.
    pub history_tail: &'a [Observation],
    /// Most recent forecast rows; `None` when no forecast was produced.
    pub forecast_tail: Option<&'a [ForecastRow]>,
    /// Every validated observation, for the price chart.
    pub history: &'a [Observation],
    /// The full forecast, for the forecast chart.
    pub forecast: Option<&'a ForecastResult>,
}

impl<'a> DisplayBundle<'a> {
    pub fn build(series: &'a ValidatedSeries, forecast: Option<&'a ForecastResult>, tail_rows: usize) -> Self {
        Self {
            history_tail: series.tail(tail_rows),
            forecast_tail: forecast.map(|f| f.tail(tail_rows)),
            history: series.points(),
            forecast,
        }
    }

    pub fn components(&self) -> Option<&'a Components> {
        self.forecast.map(|f| &f.components)
    }

    /// `(date, value)` pairs of the price chart.
    pub fn chart_points(&self) -> impl Iterator<Item = (chrono::NaiveDate, f64)> + 'a {
        self.history.iter().map(|o| (o.ds, o.y))
    }
}
