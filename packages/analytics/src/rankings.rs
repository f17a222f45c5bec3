//! Cross-unit rankings.
//!
//! The rankings file for a snapshot date is built from the collector's
//! all-units summary export and loaded once per compute run. Units are
//! ranked per metric by value, highest first; ties are broken by unit ID
//! so ranks are deterministic and never shared.

use std::collections::HashMap;

use district_stats_analytics_models::{
    MetricRanking, PerformanceAnalytics, RankingMetric, RankingsFile, UnitRankingInput,
};
use district_stats_store::{CacheLayout, read_json_optional, write_json_atomic};
use strum::IntoEnumIterator as _;

use crate::{AnalyticsError, round1};

const COL_DISTRICT: &str = "District";
const COL_REGION: &str = "Region";
const COL_PAID_CLUBS: &str = "Paid Clubs";
const COL_TOTAL_PAYMENTS: &str = "Total Payments";
const COL_DISTINGUISHED: &str = "Distinguished Clubs";

/// `((total - rank) / total) * 100`, rounded to one decimal.
#[must_use]
pub fn percentile(rank: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = (total.saturating_sub(rank)) as f64 / total as f64 * 100.0;
    round1(value)
}

/// Parses the all-units summary CSV.
///
/// Rows with an empty or non-alphanumeric unit ID are ignored, as are
/// empty numeric cells (counted as zero).
///
/// # Errors
///
/// * [`AnalyticsError::Csv`] if the CSV is malformed
/// * [`AnalyticsError::Parse`] if the unit ID column is missing
pub fn parse_summary_csv(contents: &[u8]) -> Result<Vec<UnitRankingInput>, AnalyticsError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let district = column(COL_DISTRICT).ok_or_else(|| {
        AnalyticsError::Parse(format!("summary report has no '{COL_DISTRICT}' column"))
    })?;
    let region = column(COL_REGION);
    let paid = column(COL_PAID_CLUBS);
    let payments = column(COL_TOTAL_PAYMENTS);
    let distinguished = column(COL_DISTINGUISHED);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
        let number = |idx: Option<usize>| cell(idx).replace(',', "").parse::<u32>().unwrap_or(0);

        let unit_id = cell(Some(district));
        if unit_id.is_empty() || !unit_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            continue;
        }

        rows.push(UnitRankingInput {
            unit_id: unit_id.to_owned(),
            region: cell(region).to_owned(),
            paid_clubs: number(paid),
            total_payments: number(payments),
            distinguished_clubs: number(distinguished),
        });
    }

    Ok(rows)
}

/// Builds `snapshots/{snapshot_date}/all-districts-rankings.json` from the
/// summary collected on `collection_date`.
///
/// Returns the number of ranked units, or `None` when no summary was
/// collected for that date.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the summary cannot be read or parsed, or
/// the rankings file cannot be written.
pub fn write_rankings_from_summary(
    layout: &CacheLayout,
    collection_date: &str,
    snapshot_date: &str,
) -> Result<Option<usize>, AnalyticsError> {
    let summary_path = layout.raw_summary_path(collection_date);
    if !summary_path.is_file() {
        log::debug!("No summary collected for {collection_date}, skipping rankings");
        return Ok(None);
    }

    let rankings = parse_summary_csv(&std::fs::read(&summary_path)?)?;
    let count = rankings.len();
    let file = RankingsFile {
        generated_at: Some(chrono::Utc::now().to_rfc3339()),
        source_date: Some(collection_date.to_owned()),
        rankings,
    };
    write_json_atomic(&layout.rankings_path(snapshot_date), &file)?;
    log::info!("Wrote rankings for {count} unit(s) to snapshot {snapshot_date}");

    Ok(Some(count))
}

/// Loads the rankings file for a snapshot date. Absence or an unreadable
/// file is a warning; analytics then report null rankings.
#[must_use]
pub fn load_rankings(layout: &CacheLayout, snapshot_date: &str) -> Option<RankingsFile> {
    match read_json_optional::<RankingsFile>(&layout.rankings_path(snapshot_date)) {
        Ok(Some(file)) => Some(file),
        Ok(None) => {
            log::warn!("No rankings for snapshot {snapshot_date}; rankings will be null");
            None
        }
        Err(e) => {
            log::warn!("Unreadable rankings for snapshot {snapshot_date}: {e}");
            None
        }
    }
}

const fn metric_value(row: &UnitRankingInput, metric: RankingMetric) -> u32 {
    match metric {
        RankingMetric::Clubs => row.paid_clubs,
        RankingMetric::Payments => row.total_payments,
        RankingMetric::Distinguished => row.distinguished_clubs,
    }
}

/// Position of `unit_id` among `rows` ranked by `metric`, with the
/// number of rows ranked.
fn position(
    rows: &[&UnitRankingInput],
    metric: RankingMetric,
    unit_id: &str,
) -> Option<(usize, usize)> {
    let mut ordered: Vec<&&UnitRankingInput> = rows.iter().collect();
    ordered.sort_by(|a, b| {
        metric_value(b, metric)
            .cmp(&metric_value(a, metric))
            .then_with(|| a.unit_id.cmp(&b.unit_id))
    });
    ordered
        .iter()
        .position(|r| r.unit_id == unit_id)
        .map(|idx| (idx + 1, ordered.len()))
}

/// Rankings for one compute run.
#[derive(Debug, Default)]
pub struct RankingTable {
    rows: Vec<UnitRankingInput>,
    by_unit: HashMap<String, usize>,
}

impl RankingTable {
    /// Indexes `file`. Duplicate unit rows keep the first occurrence.
    #[must_use]
    pub fn new(file: RankingsFile) -> Self {
        let mut rows = Vec::with_capacity(file.rankings.len());
        let mut by_unit = HashMap::new();
        for row in file.rankings {
            if !by_unit.contains_key(&row.unit_id) {
                by_unit.insert(row.unit_id.clone(), rows.len());
                rows.push(row);
            }
        }
        Self { rows, by_unit }
    }

    /// World and region rank for every metric. `table` of `None` means no
    /// rankings were available for the run.
    #[must_use]
    pub fn performance(table: Option<&Self>, unit_id: &str) -> PerformanceAnalytics {
        let row = table.and_then(|t| t.by_unit.get(unit_id).map(|&idx| &t.rows[idx]));

        let (Some(table), Some(row)) = (table, row) else {
            return PerformanceAnalytics {
                rankings_available: table.is_some(),
                region: None,
                metrics: RankingMetric::iter().map(unranked).collect(),
            };
        };

        let world: Vec<&UnitRankingInput> = table.rows.iter().collect();
        let region: Vec<&UnitRankingInput> = table
            .rows
            .iter()
            .filter(|r| !row.region.is_empty() && r.region == row.region)
            .collect();

        let metrics = RankingMetric::iter()
            .map(|metric| {
                let world_pos = position(&world, metric, unit_id);
                let region_pos = position(&region, metric, unit_id);
                MetricRanking {
                    metric,
                    value: Some(metric_value(row, metric)),
                    world_rank: world_pos.map(|(rank, _)| rank),
                    world_total: world_pos.map(|(_, total)| total),
                    world_percentile: world_pos.map(|(rank, total)| percentile(rank, total)),
                    region_rank: region_pos.map(|(rank, _)| rank),
                    region_total: region_pos.map(|(_, total)| total),
                    region_percentile: region_pos.map(|(rank, total)| percentile(rank, total)),
                }
            })
            .collect();

        PerformanceAnalytics {
            rankings_available: true,
            region: (!row.region.is_empty()).then(|| row.region.clone()),
            metrics,
        }
    }
}

const fn unranked(metric: RankingMetric) -> MetricRanking {
    MetricRanking {
        metric,
        value: None,
        world_rank: None,
        world_total: None,
        world_percentile: None,
        region_rank: None,
        region_total: None,
        region_percentile: None,
    }
}
