//! Additive trend + seasonality model.
//!
//! `y(t) = intercept + slope * t + Σ seasonal Fourier terms`, fitted by
//! ridge-stabilised least squares on a copy of the history sorted by date.
//! Time is scaled to `[0, 1]` over the history span and `y` by its largest
//! absolute value, so the fixed ridge weight behaves the same for any price
//! level.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};

use super::{Components, EngineError, ForecastEngine, ForecastRow, SeasonalComponent, infer_step_days};
use crate::data::model::ValidatedSeries;

const YEARLY_PERIOD: f64 = 365.25;
const YEARLY_ORDER: usize = 10;
const WEEKLY_PERIOD: f64 = 7.0;
const WEEKLY_ORDER: usize = 3;

/// Ridge weight added to every non-intercept coefficient.
const RIDGE: f64 = 1e-2;

/// Two-sided z-score for an 80% interval.
const INTERVAL_Z: f64 = 1.282;

#[derive(Debug, Clone, PartialEq)]
struct Seasonality {
    name: &'static str,
    period_days: f64,
    order: usize,
}

impl Seasonality {
    fn width(&self) -> usize {
        2 * self.order
    }
}

/// Fitted state of an [`AdditiveEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveModel {
    start: NaiveDate,
    last: NaiveDate,
    span_days: f64,
    step_days: i64,
    y_scale: f64,
    n_history: usize,
    seasonalities: Vec<Seasonality>,
    beta: Array1<f64>,
    /// Residual standard deviation on the scaled axis.
    sigma: f64,
}

impl AdditiveModel {
    fn n_features(&self) -> usize {
        2 + self.seasonalities.iter().map(Seasonality::width).sum::<usize>()
    }

    fn features(&self, ds: NaiveDate) -> Array1<f64> {
        let mut row = Array1::zeros(self.n_features());
        row[0] = 1.0;
        row[1] = (ds - self.start).num_days() as f64 / self.span_days;

        let x = epoch_days(ds);
        let mut col = 2;
        for s in &self.seasonalities {
            for k in 1..=s.order {
                let angle = 2.0 * PI * k as f64 * x / s.period_days;
                row[col] = angle.sin();
                row[col + 1] = angle.cos();
                col += 2;
            }
        }
        row
    }

    /// Coefficient range of each seasonality inside `beta`.
    fn seasonal_ranges(&self) -> Vec<(usize, usize)> {
        let mut start = 2;
        self.seasonalities
            .iter()
            .map(|s| {
                let range = (start, start + s.width());
                start += s.width();
                range
            })
            .collect()
    }
}

/// Deterministic additive forecasting engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveEngine;

impl ForecastEngine for AdditiveEngine {
    type Model = AdditiveModel;

    fn fit(&self, series: &ValidatedSeries) -> Result<AdditiveModel, EngineError> {
        let mut history = series.points().to_vec();
        history.sort_by_key(|p| p.ds);

        let dates = series.sorted_distinct_dates();
        let (Some(&start), Some(&last)) = (dates.first(), dates.last()) else {
            return Err(EngineError("history is empty".into()));
        };
        if dates.len() < self.min_observations() {
            return Err(EngineError(format!(
                "history has {} distinct dates, need at least {}",
                dates.len(),
                self.min_observations()
            )));
        }

        let span_days = (last - start).num_days() as f64;
        let step_days = infer_step_days(&dates);

        let mut seasonalities = Vec::new();
        if span_days >= 2.0 * 365.0 {
            seasonalities.push(Seasonality {
                name: "yearly",
                period_days: YEARLY_PERIOD,
                order: YEARLY_ORDER,
            });
        }
        if span_days >= 14.0 && step_days < 7 {
            seasonalities.push(Seasonality {
                name: "weekly",
                period_days: WEEKLY_PERIOD,
                order: WEEKLY_ORDER,
            });
        }

        let y_scale = history
            .iter()
            .map(|p| p.y.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut model = AdditiveModel {
            start,
            last,
            span_days,
            step_days,
            y_scale,
            n_history: history.len(),
            seasonalities,
            beta: Array1::zeros(0),
            sigma: 0.0,
        };

        let n = history.len();
        let p = model.n_features();
        let mut x = Array2::<f64>::zeros((n, p));
        for (i, obs) in history.iter().enumerate() {
            x.row_mut(i).assign(&model.features(obs.ds));
        }
        let y = Array1::from_iter(history.iter().map(|o| o.y / y_scale));

        let mut xtx = x.t().dot(&x);
        for j in 1..p {
            xtx[[j, j]] += RIDGE;
        }
        let xty = x.t().dot(&y);
        let beta = cholesky_solve(&xtx, &xty)?;

        let residuals = &y - &x.dot(&beta);
        let sigma = (residuals.mapv(|r| r * r).sum() / n as f64).sqrt();
        if !sigma.is_finite() || beta.iter().any(|b| !b.is_finite()) {
            return Err(EngineError("fit produced non-finite coefficients".into()));
        }

        log::debug!(
            "fitted additive model on {n} points, {p} features, seasonalities {:?}, residual sd {:.4}",
            model.seasonalities.iter().map(|s| s.name).collect::<Vec<_>>(),
            sigma * y_scale
        );

        model.beta = beta;
        model.sigma = sigma;
        Ok(model)
    }

    fn predict(&self, model: &AdditiveModel, timestamps: &[NaiveDate]) -> Result<Vec<ForecastRow>, EngineError> {
        timestamps
            .iter()
            .map(|&ds| {
                let yhat = model.features(ds).dot(&model.beta);
                let steps_ahead = ((ds - model.last).num_days().max(0) as f64) / model.step_days as f64;
                let half_width = INTERVAL_Z * model.sigma * (1.0 + steps_ahead / model.n_history as f64).sqrt();

                let row = ForecastRow {
                    ds,
                    yhat: yhat * model.y_scale,
                    yhat_lower: (yhat - half_width) * model.y_scale,
                    yhat_upper: (yhat + half_width) * model.y_scale,
                };
                if row.yhat.is_finite() && row.yhat_lower.is_finite() && row.yhat_upper.is_finite() {
                    Ok(row)
                } else {
                    Err(EngineError(format!("non-finite prediction at {ds}")))
                }
            })
            .collect()
    }

    fn decompose(&self, model: &AdditiveModel, forecast: &[ForecastRow]) -> Result<Components, EngineError> {
        let ranges = model.seasonal_ranges();
        let mut trend = Vec::with_capacity(forecast.len());
        let mut seasonal: Vec<SeasonalComponent> = model
            .seasonalities
            .iter()
            .map(|s| SeasonalComponent {
                name: s.name.to_string(),
                period_days: s.period_days,
                values: Vec::with_capacity(forecast.len()),
            })
            .collect();

        for row in forecast {
            let f = model.features(row.ds);
            trend.push((model.beta[0] + model.beta[1] * f[1]) * model.y_scale);
            for (component, &(lo, hi)) in seasonal.iter_mut().zip(&ranges) {
                let v: f64 = (lo..hi).map(|j| f[j] * model.beta[j]).sum();
                component.values.push(v * model.y_scale);
            }
        }

        Ok(Components { trend, seasonal })
    }
}

/// Absolute day number; only the phase of the Fourier terms depends on it.
fn epoch_days(ds: NaiveDate) -> f64 {
    f64::from(ds.num_days_from_ce())
}

/// Solve `a x = b` for symmetric positive-definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, EngineError> {
    let n = b.len();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 1e-12 || !sum.is_finite() {
                    return Err(EngineError("normal equations are not positive definite".into()));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // forward: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[[i, k]] * z[k]).sum();
        z[i] = (b[i] - s) / l[[i, i]];
    }
    // back: Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (z[i] - s) / l[[i, i]];
    }
    Ok(x)
}
