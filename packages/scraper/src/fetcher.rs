//! The raw-data fetcher seam.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::FetchError;

/// Per-unit dashboard reports, each stored as `{report}.csv` in the unit's
/// raw directory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportType {
    DistrictPerformance,
    DivisionPerformance,
    ClubPerformance,
}

impl ReportType {
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{self}.csv")
    }
}

/// One fetched CSV report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedReport {
    pub csv: String,
    /// Month the dashboard says the data describes (`YYYY-MM` or `MM`),
    /// when it reports one.
    pub data_month: Option<String>,
}

/// Source of raw dashboard reports.
///
/// Implementations perform a single attempt per call; retry and circuit
/// breaking are applied by the orchestrator.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the unit-independent summary covering every unit.
    async fn fetch_summary(&self, date: NaiveDate) -> Result<FetchedReport, FetchError>;

    /// Fetches one report for one unit.
    async fn fetch_report(
        &self,
        unit_id: &str,
        report: ReportType,
        date: NaiveDate,
    ) -> Result<FetchedReport, FetchError>;
}
