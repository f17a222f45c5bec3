//! The collection run: summary first, then every unit in turn.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use district_stats_resilience::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, RetryOptions, execute_with_retry_if,
};
use district_stats_snapshot::closing_period::parse_data_month;
use district_stats_snapshot::{is_valid_unit_id, read_cache_metadata};
use district_stats_snapshot_models::{CacheMetadata, RunError};
use district_stats_store::{CacheLayout, StoreError, write_atomic, write_json_atomic};
use strum::IntoEnumIterator as _;

use crate::fetcher::{FetchedReport, Fetcher, ReportType};
use crate::progress::{ProgressCallback, null_progress};
use crate::registry::UnitRegistry;
use crate::{FetchError, ScrapeError};

/// Options for one collection run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    /// Target date; today (UTC) when `None`.
    pub date: Option<NaiveDate>,
    /// Units to collect, trusted as given. `None` loads the registry.
    pub units: Option<Vec<String>>,
    /// Re-fetch reports that are already cached.
    pub force: bool,
    /// Checked before each unit; once set, remaining units are skipped.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Why a unit was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SkipReason {
    CircuitOpen,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub unit_id: String,
    pub reason: SkipReason,
}

/// Outcome of a collection run.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    /// Target date (`YYYY-MM-DD`).
    pub date: String,
    /// Units the loop reached, in order.
    pub units_processed: Vec<String>,
    /// Units whose reports are all on disk, fetched or cached.
    pub units_succeeded: Vec<String>,
    /// Succeeded units that were served from the cache.
    pub units_cached: Vec<String>,
    pub units_failed: Vec<String>,
    pub units_skipped: Vec<SkippedUnit>,
    /// Raw files written or found for this date.
    pub cache_files: Vec<PathBuf>,
    pub errors: Vec<RunError>,
    pub summary_fetched: bool,
    /// Whether the dashboard reported data for an earlier month.
    pub is_closing_period: bool,
    /// That month (`YYYY-MM`), when closing.
    pub data_month: Option<String>,
    /// Set when the circuit breaker stopped the run.
    pub breaker_open_until: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl ScrapeResult {
    fn new(date: String) -> Self {
        Self {
            date,
            units_processed: Vec::new(),
            units_succeeded: Vec::new(),
            units_cached: Vec::new(),
            units_failed: Vec::new(),
            units_skipped: Vec::new(),
            cache_files: Vec::new(),
            errors: Vec::new(),
            summary_fetched: false,
            is_closing_period: false,
            data_month: None,
            breaker_open_until: None,
            duration_ms: 0,
        }
    }

    /// `true` when no unit failed and at least one succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.units_failed.is_empty() && !self.units_succeeded.is_empty()
    }

    fn skip_all(&mut self, units: &[String], reason: SkipReason) {
        self.units_skipped
            .extend(units.iter().map(|unit_id| SkippedUnit {
                unit_id: unit_id.clone(),
                reason,
            }));
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[derive(Debug, thiserror::Error)]
enum UnitError {
    #[error("Invalid unit ID: {0:?}")]
    InvalidUnitId(String),

    #[error("{report}: {source}")]
    Fetch {
        report: ReportType,
        source: BreakerError<FetchError>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct UnitCollection {
    files: Vec<PathBuf>,
    data_month: Option<String>,
    cached: bool,
}

/// `YYYY-MM` of `data_month` when it names a month other than `date`'s.
#[must_use]
pub fn closing_month(date: NaiveDate, data_month: &str) -> Option<String> {
    let month = parse_data_month(data_month, date.year(), date.month())?;
    (month.year != date.year() || month.month != date.month())
        .then(|| format!("{:04}-{:02}", month.year, month.month))
}

/// Drives per-unit collection through a shared circuit breaker and
/// bounded retry.
pub struct Orchestrator {
    layout: CacheLayout,
    fetcher: Arc<dyn Fetcher>,
    registry: UnitRegistry,
    breaker: Arc<CircuitBreaker>,
    retry: RetryOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("layout", &self.layout)
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(layout: CacheLayout, fetcher: Arc<dyn Fetcher>, registry: UnitRegistry) -> Self {
        Self {
            layout,
            fetcher,
            registry,
            breaker: Arc::new(CircuitBreaker::new(
                "dashboard",
                CircuitBreakerConfig::default(),
            )),
            retry: RetryOptions::default(),
            progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn open_until(&self) -> Option<DateTime<Utc>> {
        if self.breaker.is_open() {
            self.breaker.stats().next_retry_time
        } else {
            None
        }
    }

    /// One logical fetch: retried while the error is transient, counted
    /// once by the breaker. Permanent errors such as a 404 for an unknown
    /// unit do not count against the dashboard.
    async fn fetch_guarded<F, Fut>(
        &self,
        context: &str,
        fetch: F,
    ) -> Result<FetchedReport, BreakerError<FetchError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<FetchedReport, FetchError>>,
    {
        self.breaker
            .execute_if(
                || async move {
                    execute_with_retry_if(fetch, &self.retry, context, FetchError::is_transient)
                        .await
                        .into_result()
                },
                FetchError::is_transient,
            )
            .await
    }

    /// Collects raw reports for one date.
    ///
    /// Per-unit failures are isolated and reported in the result. An open
    /// circuit aborts the run before anything is fetched.
    ///
    /// # Errors
    ///
    /// * [`ScrapeError::NoUnits`] if no units are requested or configured
    /// * [`ScrapeError::Store`] if the run metadata cannot be written
    pub async fn scrape(&self, options: &ScrapeOptions) -> Result<ScrapeResult, ScrapeError> {
        let started = Instant::now();
        let date = options.date.unwrap_or_else(|| Utc::now().date_naive());
        let date_key = date.format("%Y-%m-%d").to_string();

        let units = match &options.units {
            Some(units) => units.clone(),
            None => self.registry.unit_ids(),
        };
        if units.is_empty() {
            return Err(ScrapeError::NoUnits);
        }

        let mut result = ScrapeResult::new(date_key.clone());

        if let Some(until) = self.open_until() {
            log::error!(
                "Circuit {} is open until {until}; not collecting {} unit(s)",
                self.breaker.name(),
                units.len()
            );
            result.breaker_open_until = Some(until);
            result.skip_all(&units, SkipReason::CircuitOpen);
            result
                .errors
                .push(RunError::new(None, format!("Circuit breaker open until {until}")));
            return Ok(result.finish(started));
        }

        log::info!("Collecting {} unit(s) for {date_key}", units.len());
        self.progress.set_total(units.len() as u64);

        let mut observed_month = self
            .collect_summary(date, &date_key, options.force, &mut result)
            .await;

        for (index, unit_id) in units.iter().enumerate() {
            if options
                .cancel
                .as_ref()
                .is_some_and(|cancel| cancel.load(Ordering::SeqCst))
            {
                log::warn!(
                    "Collection cancelled, skipping {} remaining unit(s)",
                    units.len() - index
                );
                result.skip_all(&units[index..], SkipReason::Cancelled);
                break;
            }

            if let Some(until) = self.open_until() {
                log::error!(
                    "Circuit {} opened mid-run (retry at {until}), skipping {} remaining unit(s)",
                    self.breaker.name(),
                    units.len() - index
                );
                result.breaker_open_until = Some(until);
                result.skip_all(&units[index..], SkipReason::CircuitOpen);
                break;
            }

            self.progress.set_message(format!("unit {unit_id}"));
            result.units_processed.push(unit_id.clone());

            match self.collect_unit(date, &date_key, unit_id, options.force).await {
                Ok(collection) => {
                    if collection.cached {
                        log::debug!("Unit {unit_id}: reports already cached");
                        result.units_cached.push(unit_id.clone());
                    } else {
                        log::info!("Unit {unit_id}: collected");
                    }
                    if observed_month.is_none() {
                        observed_month = collection.data_month;
                    }
                    result.cache_files.extend(collection.files);
                    result.units_succeeded.push(unit_id.clone());
                }
                Err(e) => {
                    log::error!("Unit {unit_id}: {e}");
                    result.units_failed.push(unit_id.clone());
                    result.errors.push(RunError::new(Some(unit_id), e.to_string()));
                }
            }

            self.progress.inc(1);
        }

        self.write_metadata(date, &date_key, observed_month.as_deref(), &mut result)?;

        self.progress.finish(format!(
            "{} succeeded, {} failed, {} skipped",
            result.units_succeeded.len(),
            result.units_failed.len(),
            result.units_skipped.len()
        ));

        let result = result.finish(started);
        log::info!(
            "Collection {date_key}: {} succeeded ({} cached), {} failed, {} skipped ({}ms)",
            result.units_succeeded.len(),
            result.units_cached.len(),
            result.units_failed.len(),
            result.units_skipped.len(),
            result.duration_ms
        );

        Ok(result)
    }

    /// Fetches the all-units summary. Failure is recorded, never fatal.
    async fn collect_summary(
        &self,
        date: NaiveDate,
        date_key: &str,
        force: bool,
        result: &mut ScrapeResult,
    ) -> Option<String> {
        let path = self.layout.raw_summary_path(date_key);
        if !force && path.is_file() {
            log::debug!("Summary for {date_key} already cached");
            result.summary_fetched = true;
            result.cache_files.push(path);
            return None;
        }

        let outcome = match self
            .fetch_guarded("summary", || self.fetcher.fetch_summary(date))
            .await
        {
            Ok(report) => write_atomic(&path, report.csv.as_bytes())
                .map(|_| report.data_month)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(data_month) => {
                result.summary_fetched = true;
                result.cache_files.push(path);
                data_month
            }
            Err(message) => {
                log::warn!("Summary for {date_key} unavailable: {message}");
                result
                    .errors
                    .push(RunError::new(None, format!("summary: {message}")));
                None
            }
        }
    }

    async fn collect_unit(
        &self,
        date: NaiveDate,
        date_key: &str,
        unit_id: &str,
        force: bool,
    ) -> Result<UnitCollection, UnitError> {
        if !is_valid_unit_id(unit_id) {
            return Err(UnitError::InvalidUnitId(unit_id.to_owned()));
        }

        let dir = self.layout.raw_unit_dir(date_key, unit_id);
        let reports: Vec<(ReportType, PathBuf)> = ReportType::iter()
            .map(|report| (report, dir.join(report.file_name())))
            .collect();

        if !force && reports.iter().all(|(_, path)| path.is_file()) {
            return Ok(UnitCollection {
                files: reports.into_iter().map(|(_, path)| path).collect(),
                data_month: None,
                cached: true,
            });
        }

        let mut data_month = None;
        let mut files = Vec::with_capacity(reports.len());

        for (report, path) in reports {
            let context = format!("unit {unit_id} {report}");
            let fetched = self
                .fetch_guarded(&context, || {
                    self.fetcher.fetch_report(unit_id, report, date)
                })
                .await
                .map_err(|source| UnitError::Fetch { report, source })?;

            write_atomic(&path, fetched.csv.as_bytes())?;
            if data_month.is_none() {
                data_month = fetched.data_month;
            }
            files.push(path);
        }

        Ok(UnitCollection {
            files,
            data_month,
            cached: false,
        })
    }

    fn write_metadata(
        &self,
        date: NaiveDate,
        date_key: &str,
        observed_month: Option<&str>,
        result: &mut ScrapeResult,
    ) -> Result<(), ScrapeError> {
        let closing = match observed_month {
            Some(raw) => closing_month(date, raw),
            // Nothing fetched this run; keep what an earlier run recorded.
            None => read_cache_metadata(&self.layout, date_key)
                .filter(|m| m.is_closing_period == Some(true))
                .and_then(|m| m.data_month),
        };

        if let Some(month) = &closing {
            log::info!("Closing period: {date_key} reports data for {month}");
        }
        result.is_closing_period = closing.is_some();
        result.data_month.clone_from(&closing);

        let raw_dir = self.layout.raw_dir(date_key);
        let mut csv_files: Vec<String> = result
            .cache_files
            .iter()
            .map(|path| relative_name(&raw_dir, path))
            .collect();
        csv_files.sort();
        csv_files.dedup();

        let metadata = CacheMetadata {
            date: date_key.to_owned(),
            is_closing_period: closing.is_some().then_some(true),
            data_month: closing,
            collected_at: Some(Utc::now().to_rfc3339()),
            succeeded_units: result.units_succeeded.clone(),
            failed_units: result.units_failed.clone(),
            skipped_units: result
                .units_skipped
                .iter()
                .map(|s| s.unit_id.clone())
                .collect(),
            csv_files,
            errors: result.errors.clone(),
        };

        write_json_atomic(&self.layout.raw_metadata_path(date_key), &metadata)?;
        Ok(())
    }
}

fn relative_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
