use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use thiserror::Error;

use super::{EngineError, ForecastEngine, ForecastResult, infer_step_days};
use crate::data::model::ValidatedSeries;

/// Future periods requested when the caller has no preference.
pub const DEFAULT_HORIZON: usize = 365;

/// Timed-out workers allowed to keep running before new forecasts are refused.
pub const MAX_ABANDONED_WORKERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    #[error("need at least {required} distinct dates to fit a forecast, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("an error occurred during model training: {0}")]
    Engine(String),
    #[error("forecast did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("{0} earlier forecasts are still running, try again once they finish")]
    WorkersBusy(usize),
}

// ---------------------------------------------------------------------------
// Forecaster
// ---------------------------------------------------------------------------

/// Runs a [`ForecastEngine`] and converts every failure, panics included,
/// into a [`ForecastError`].
///
/// Clones share the engine and the count of abandoned workers.
pub struct Forecaster<E> {
    engine: Arc<E>,
    timeout: Option<Duration>,
    /// Workers spawned and not yet finished, abandoned ones included.
    running: Arc<AtomicUsize>,
}

impl<E> Clone for Forecaster<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            timeout: self.timeout,
            running: Arc::clone(&self.running),
        }
    }
}

/// Decrements the running count when a worker exits, panics included.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<E: ForecastEngine + 'static> Forecaster<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            timeout: None,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run the engine on a worker thread and give up after `timeout`.
    ///
    /// A worker that times out is detached, not stopped. Once
    /// [`MAX_ABANDONED_WORKERS`] of them are still running, further calls
    /// fail with [`ForecastError::WorkersBusy`] until one finishes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timed-out workers that have not finished yet.
    pub fn abandoned_workers(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Fit the series and predict its history plus `horizon` future periods.
    pub fn forecast(&self, series: &ValidatedSeries, horizon: usize) -> Result<ForecastResult, ForecastError> {
        let required = self.engine.min_observations();
        let actual = series.distinct_timestamps();
        if actual < required {
            return Err(ForecastError::InsufficientData { required, actual });
        }

        let result = match self.timeout {
            None => run_engine(self.engine.as_ref(), series, horizon),
            Some(timeout) => self.run_on_worker(series.clone(), horizon, timeout),
        }?;

        log::info!(
            "forecast produced {} rows ({} history, {} future)",
            result.rows.len(),
            result.history_len,
            result.rows.len() - result.history_len
        );
        Ok(result)
    }

    fn run_on_worker(
        &self,
        series: ValidatedSeries,
        horizon: usize,
        timeout: Duration,
    ) -> Result<ForecastResult, ForecastError> {
        // the caller waits on each worker, so anything still counted was abandoned
        let abandoned = self.abandoned_workers();
        if abandoned >= MAX_ABANDONED_WORKERS {
            log::warn!("refusing forecast: {abandoned} timed-out workers still running");
            return Err(ForecastError::WorkersBusy(abandoned));
        }

        let engine = Arc::clone(&self.engine);
        let (tx, rx) = mpsc::channel();
        self.running.fetch_add(1, Ordering::SeqCst);
        let slot = WorkerSlot(Arc::clone(&self.running));

        thread::Builder::new()
            .name("forecast".into())
            .spawn(move || {
                let result = run_engine(engine.as_ref(), &series, horizon);
                // release before sending so a waiting caller never counts this worker
                drop(slot);
                // receiver may have given up already
                let _ = tx.send(result);
            })
            .map_err(|e| ForecastError::Engine(format!("could not start forecast worker: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("forecast still running after {timeout:?}, abandoning worker");
                Err(ForecastError::TimedOut(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ForecastError::Engine(
                "forecast worker exited without a result".into(),
            )),
        }
    }
}

fn run_engine<E: ForecastEngine + ?Sized>(
    engine: &E,
    series: &ValidatedSeries,
    horizon: usize,
) -> Result<ForecastResult, ForecastError> {
    match panic::catch_unwind(AssertUnwindSafe(|| fit_and_predict(engine, series, horizon))) {
        Ok(result) => result.map_err(|EngineError(msg)| ForecastError::Engine(msg)),
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::error!("forecast engine panicked: {msg}");
            Err(ForecastError::Engine(msg))
        }
    }
}

fn fit_and_predict<E: ForecastEngine + ?Sized>(
    engine: &E,
    series: &ValidatedSeries,
    horizon: usize,
) -> Result<ForecastResult, EngineError> {
    let history = series.sorted_distinct_dates();
    let axis = forecast_axis(&history, horizon);

    let model = engine.fit(series)?;
    let rows = engine.predict(&model, &axis)?;
    if rows.len() != axis.len() {
        return Err(EngineError(format!(
            "engine returned {} rows for {} timestamps",
            rows.len(),
            axis.len()
        )));
    }
    let components = engine.decompose(&model, &rows)?;

    Ok(ForecastResult {
        rows,
        components,
        history_len: history.len(),
    })
}

/// Sorted distinct history dates followed by `horizon` steps past the last
/// one, stepping by the history's own granularity.
pub fn forecast_axis(history: &[NaiveDate], horizon: usize) -> Vec<NaiveDate> {
    let mut axis = history.to_vec();
    let Some(&last) = history.last() else {
        return axis;
    };
    let step = infer_step_days(history).unsigned_abs();
    axis.extend(
        (1..=horizon as u64).map_while(|k| last.checked_add_days(Days::new(step * k))),
    );
    axis
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "forecast engine panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Observation;
    use crate::forecast::{AdditiveEngine, Components, ForecastRow};
    use std::collections::BTreeSet;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n)
    }

    fn series(n: u64) -> ValidatedSeries {
        ValidatedSeries::from_observations(
            (0..n)
                .map(|i| Observation::new(day(i), 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64))
                .collect(),
        )
        .unwrap()
    }

    struct PanickingEngine;

    impl ForecastEngine for PanickingEngine {
        type Model = ();
        fn fit(&self, _: &ValidatedSeries) -> Result<(), EngineError> {
            panic!("matrix exploded");
        }
        fn predict(&self, _: &(), _: &[NaiveDate]) -> Result<Vec<ForecastRow>, EngineError> {
            unreachable!()
        }
        fn decompose(&self, _: &(), _: &[ForecastRow]) -> Result<Components, EngineError> {
            unreachable!()
        }
    }

    struct FailingEngine;

    impl ForecastEngine for FailingEngine {
        type Model = ();
        fn fit(&self, _: &ValidatedSeries) -> Result<(), EngineError> {
            Err(EngineError("degenerate input".into()))
        }
        fn predict(&self, _: &(), _: &[NaiveDate]) -> Result<Vec<ForecastRow>, EngineError> {
            unreachable!()
        }
        fn decompose(&self, _: &(), _: &[ForecastRow]) -> Result<Components, EngineError> {
            unreachable!()
        }
    }

    struct SlowEngine(Duration);

    impl ForecastEngine for SlowEngine {
        type Model = ();
        fn fit(&self, _: &ValidatedSeries) -> Result<(), EngineError> {
            thread::sleep(self.0);
            Ok(())
        }
        fn predict(&self, _: &(), ts: &[NaiveDate]) -> Result<Vec<ForecastRow>, EngineError> {
            Ok(ts
                .iter()
                .map(|&ds| ForecastRow {
                    ds,
                    yhat: 0.0,
                    yhat_lower: 0.0,
                    yhat_upper: 0.0,
                })
                .collect())
        }
        fn decompose(&self, _: &(), _: &[ForecastRow]) -> Result<Components, EngineError> {
            Ok(Components::default())
        }
    }

    #[test]
    fn zero_horizon_keeps_exactly_the_input_timestamps() {
        let input = series(20);
        let result = Forecaster::new(AdditiveEngine).forecast(&input, 0).unwrap();
        let got: BTreeSet<NaiveDate> = result.rows.iter().map(|r| r.ds).collect();
        let want: BTreeSet<NaiveDate> = input.points().iter().map(|p| p.ds).collect();
        assert_eq!(got, want);
        assert_eq!(result.rows.len(), want.len());
        assert!(result.future().is_empty());
    }

    #[test]
    fn default_horizon_extends_a_year_of_days() {
        let input = series(30);
        let result = Forecaster::new(AdditiveEngine)
            .forecast(&input, DEFAULT_HORIZON)
            .unwrap();
        assert_eq!(result.rows.len(), 30 + 365);
        assert_eq!(result.history_len, 30);
        assert_eq!(result.future()[0].ds, day(30));
        assert_eq!(result.rows.last().unwrap().ds, day(29 + 365));
        assert_eq!(result.components.trend.len(), result.rows.len());
    }

    #[test]
    fn forecasting_is_idempotent() {
        let input = series(45);
        let forecaster = Forecaster::new(AdditiveEngine);
        let a = forecaster.forecast(&input, 30).unwrap();
        let b = forecaster.forecast(&input, 30).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn one_row_is_insufficient_data() {
        let input = ValidatedSeries::from_observations(vec![Observation::new(day(0), 1.0)]).unwrap();
        assert_eq!(
            Forecaster::new(AdditiveEngine).forecast(&input, 10),
            Err(ForecastError::InsufficientData {
                required: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn engine_errors_and_panics_become_typed_errors() {
        let input = series(10);
        assert_eq!(
            Forecaster::new(FailingEngine).forecast(&input, 5),
            Err(ForecastError::Engine("degenerate input".into()))
        );
        assert_eq!(
            Forecaster::new(PanickingEngine).forecast(&input, 5),
            Err(ForecastError::Engine("matrix exploded".into()))
        );
        assert_eq!(
            Forecaster::new(PanickingEngine)
                .with_timeout(Duration::from_secs(5))
                .forecast(&input, 5),
            Err(ForecastError::Engine("matrix exploded".into()))
        );
    }

    #[test]
    fn slow_engines_time_out() {
        let input = series(10);
        let timeout = Duration::from_millis(20);
        let result = Forecaster::new(SlowEngine(Duration::from_millis(500)))
            .with_timeout(timeout)
            .forecast(&input, 5);
        assert_eq!(result, Err(ForecastError::TimedOut(timeout)));

        let result = Forecaster::new(SlowEngine(Duration::ZERO))
            .with_timeout(Duration::from_secs(5))
            .forecast(&input, 5)
            .unwrap();
        assert_eq!(result.rows.len(), 15);
    }

    #[test]
    fn abandoned_workers_are_capped() {
        let input = series(10);
        let timeout = Duration::from_millis(10);
        let forecaster = Forecaster::new(SlowEngine(Duration::from_millis(400))).with_timeout(timeout);
        let shared = forecaster.clone();

        for _ in 0..MAX_ABANDONED_WORKERS {
            assert_eq!(forecaster.forecast(&input, 5), Err(ForecastError::TimedOut(timeout)));
        }
        assert_eq!(shared.abandoned_workers(), MAX_ABANDONED_WORKERS);
        assert_eq!(
            shared.forecast(&input, 5),
            Err(ForecastError::WorkersBusy(MAX_ABANDONED_WORKERS))
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while forecaster.abandoned_workers() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(forecaster.abandoned_workers(), 0);
    }

    #[test]
    fn axis_steps_by_history_granularity() {
        let weekly = [day(0), day(7), day(14)];
        assert_eq!(forecast_axis(&weekly, 2), vec![day(0), day(7), day(14), day(21), day(28)]);
        assert!(forecast_axis(&[], 3).is_empty());
    }
}
