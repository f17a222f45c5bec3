//! HTTP implementation of [`Fetcher`] against the dashboard's CSV export.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::FetchError;
use crate::fetcher::{FetchedReport, Fetcher, ReportType};

/// Response header carrying the month the export actually describes.
pub const DATA_MONTH_HEADER: &str = "X-Data-Month";

/// File name of the unit-independent summary export.
pub const SUMMARY_EXPORT: &str = "all-districts.csv";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads CSV exports with `reqwest`.
///
/// Reports are requested from `{base}/{report}.csv?unit={id}&date={date}`
/// and the summary from `{base}/all-districts.csv?date={date}`.
#[derive(Debug, Clone)]
pub struct HttpCsvFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCsvFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("district_stats/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn export_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.base_url)
    }

    async fn get_csv(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<FetchedReport, FetchError> {
        log::debug!("GET {url} {query:?}");
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let data_month = response
            .headers()
            .get(DATA_MONTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        let csv = response.text().await?;
        if csv.trim().is_empty() {
            return Err(FetchError::Parse(format!("empty CSV from {url}")));
        }

        log::debug!("Downloaded {} bytes from {url}", csv.len());
        Ok(FetchedReport { csv, data_month })
    }
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl Fetcher for HttpCsvFetcher {
    async fn fetch_summary(&self, date: NaiveDate) -> Result<FetchedReport, FetchError> {
        self.get_csv(self.export_url(SUMMARY_EXPORT), &[("date", date_param(date))])
            .await
    }

    async fn fetch_report(
        &self,
        unit_id: &str,
        report: ReportType,
        date: NaiveDate,
    ) -> Result<FetchedReport, FetchError> {
        self.get_csv(
            self.export_url(&report.file_name()),
            &[("unit", unit_id.to_owned()), ("date", date_param(date))],
        )
        .await
    }
}
