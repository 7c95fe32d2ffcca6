use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};

use rusty_forecast::cache::SeriesCache;
use rusty_forecast::config::{AppConfig, SourceKind};
use rusty_forecast::data::loader::load_file;
use rusty_forecast::forecast::{AdditiveEngine, Forecaster};
use rusty_forecast::pipeline::{Pipeline, RunOutcome};
use rusty_forecast::source::{DirectorySource, PriceQuery, PriceSource, YahooSource};

use crate::color::SeriesColors;

type AppPipeline = Pipeline<Box<dyn PriceSource>, AdditiveEngine>;

/// A run requested by the user, started once the loading state has been drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingRun {
    Query,
    File(PathBuf),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AppConfig,

    /// Sidebar inputs.
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: SourceKind,

    /// Fetched price tables, owned here and lent to each run.
    pub cache: SeriesCache,

    /// Result of the last run (None until the user runs one).
    pub outcome: Option<RunOutcome>,

    /// Errors raised outside a run, e.g. an unreadable file.
    pub status_message: Option<String>,

    pub colors: SeriesColors,

    /// Shared across runs so timed-out workers stay counted.
    forecaster: Forecaster<AdditiveEngine>,

    /// Requested run and whether a frame has shown it as loading.
    pending: Option<(PendingRun, bool)>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            ticker: config.default_ticker.clone(),
            start: config.default_start,
            end: Local::now().date_naive(),
            source: config.source,
            cache: SeriesCache::new(config.cache_ttl()),
            outcome: None,
            status_message: None,
            colors: SeriesColors::default(),
            forecaster: build_forecaster(&config),
            pending: None,
            config,
        }
    }

    pub fn query(&self) -> PriceQuery {
        PriceQuery::new(self.ticker.trim(), self.start, self.end)
    }

    fn pipeline(&self) -> Result<AppPipeline> {
        let source: Box<dyn PriceSource> = match self.source {
            SourceKind::Yahoo => Box::new(YahooSource::new(
                self.config.yahoo_base_url.clone(),
                self.config.request_timeout(),
            )?),
            SourceKind::Directory => Box::new(DirectorySource::new(self.config.data_dir.clone())),
        };
        Ok(Pipeline::new(source, self.forecaster.clone()))
    }

    /// Whether a run is queued or in progress.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Queue a run; it starts on the frame after the request.
    pub fn request(&mut self, run: PendingRun) {
        if self.pending.is_none() {
            self.pending = Some((run, false));
        }
    }

    /// Called once per frame after drawing. Returns true when the UI needs
    /// another frame to show a queued or finished run.
    pub fn poll(&mut self) -> bool {
        match self.pending.take() {
            None => return false,
            Some((run, false)) => self.pending = Some((run, true)),
            Some((PendingRun::Query, true)) => self.run(),
            Some((PendingRun::File(path), true)) => self.run_file(&path),
        }
        true
    }

    /// Run the pipeline for the sidebar inputs.
    pub fn run(&mut self) {
        if self.ticker.trim().is_empty() {
            self.status_message = Some("Enter a stock ticker first.".into());
            return;
        }
        match self.pipeline() {
            Ok(pipeline) => {
                let query = self.query();
                log::info!("running {query} via {}", pipeline.source().name());
                self.cache.clear_expired();
                let outcome = pipeline.run(&query, Some(&mut self.cache));
                self.set_outcome(outcome);
            }
            Err(e) => {
                log::error!("could not set up data source: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Run the pipeline on a price file picked by the user.
    pub fn run_file(&mut self, path: &Path) {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string();

        let result = load_file(path).and_then(|raw| {
            let pipeline = self.pipeline()?;
            Ok(pipeline.run_raw(&label, Arc::new(raw)))
        });
        match result {
            Ok(outcome) => {
                self.ticker = label;
                self.set_outcome(outcome);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    pub fn clear_cache(&mut self) {
        log::info!("dropping {} cached price tables", self.cache.len());
        self.cache.clear();
    }

    fn set_outcome(&mut self, outcome: RunOutcome) {
        log::info!("{}: {}", outcome.label, outcome.status);
        let n_components = outcome
            .forecast
            .as_ref()
            .map_or(1, |f| 1 + f.components.seasonal.len());
        self.colors = SeriesColors::new(n_components);
        self.status_message = None;
        self.outcome = Some(outcome);
    }
}

fn build_forecaster(config: &AppConfig) -> Forecaster<AdditiveEngine> {
    let forecaster = Forecaster::new(AdditiveEngine);
    match config.forecast_timeout() {
        Some(timeout) => forecaster.with_timeout(timeout),
        None => forecaster,
    }
}
