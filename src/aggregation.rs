//! Filtering and totals over stored report rows.
//!
//! Every function here is pure: rows and criteria come in, derived values go
//! out, nothing is cached between calls.

use crate::models::{
    Category, DashboardResponse, FilterCriteria, GroupTotals, ReportRow, SeriesPoint, Totals,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Rates at or above this are favourable.
pub const HIGH_RATE_THRESHOLD: f64 = 60.0;
/// Rates at or above this (and below the high mark) are neutral.
pub const MEDIUM_RATE_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateTier {
    High,
    Medium,
    Low,
}

impl RateTier {
    pub fn css_class(self) -> &'static str {
        match self {
            RateTier::High => "tier-high",
            RateTier::Medium => "tier-medium",
            RateTier::Low => "tier-low",
        }
    }
}

pub fn filter_rows(rows: &[ReportRow], criteria: &FilterCriteria) -> Vec<ReportRow> {
    rows.iter()
        .filter(|row| matches(row, criteria))
        .cloned()
        .collect()
}

fn matches(row: &ReportRow, criteria: &FilterCriteria) -> bool {
    criteria.branch.as_ref().is_none_or(|branch| *branch == row.branch)
        && criteria.rep.as_ref().is_none_or(|rep| *rep == row.rep)
        && criteria.start_date.is_none_or(|start| row.date >= start)
        && criteria.end_date.is_none_or(|end| row.date <= end)
}

pub fn total_quotes(rows: &[ReportRow]) -> u64 {
    rows.iter()
        .map(ReportRow::quotes)
        .fold(0u64, u64::saturating_add)
}

pub fn total_sales(rows: &[ReportRow]) -> u64 {
    rows.iter()
        .map(ReportRow::sales)
        .fold(0u64, u64::saturating_add)
}

/// Sales as a percentage of quotes, rounded half-up to one decimal.
/// Zero quotes gives `0.0`.
pub fn conversion_rate(total_quotes: u64, total_sales: u64) -> f64 {
    if total_quotes == 0 {
        return 0.0;
    }

    // Integer arithmetic in tenths of a percent keeps the half-up step exact.
    let quotes = u128::from(total_quotes);
    let tenths = (u128::from(total_sales) * 2000 + quotes) / (2 * quotes);
    tenths as f64 / 10.0
}

pub fn classify_rate(rate: f64) -> RateTier {
    if rate >= HIGH_RATE_THRESHOLD {
        RateTier::High
    } else if rate >= MEDIUM_RATE_THRESHOLD {
        RateTier::Medium
    } else {
        RateTier::Low
    }
}

pub fn branch_key(row: &ReportRow) -> &str {
    &row.branch
}

pub fn rep_key(row: &ReportRow) -> &str {
    &row.rep
}

/// Partitions `rows` by `key_fn`, keeping groups in first-seen order.
pub fn group_totals<F>(rows: &[ReportRow], key_fn: F) -> Vec<GroupTotals>
where
    F: Fn(&ReportRow) -> &str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sums: Vec<(&str, u64, u64)> = Vec::new();

    for row in rows {
        let key = key_fn(row);
        let slot = *index.entry(key).or_insert_with(|| {
            sums.push((key, 0, 0));
            sums.len() - 1
        });
        let entry = &mut sums[slot];
        entry.1 = entry.1.saturating_add(row.quotes());
        entry.2 = entry.2.saturating_add(row.sales());
    }

    sums.into_iter()
        .map(|(key, quotes, sales)| {
            let rate = conversion_rate(quotes, sales);
            GroupTotals {
                key: key.to_string(),
                quotes,
                sales,
                conversion_rate: rate,
                tier: classify_rate(rate),
            }
        })
        .collect()
}

/// Sales per category summed per date, ascending by date.
pub fn sales_series(rows: &[ReportRow]) -> Vec<SeriesPoint> {
    let mut by_date: BTreeMap<_, SeriesPoint> = BTreeMap::new();
    for row in rows {
        let point = by_date.entry(row.date).or_insert_with(|| SeriesPoint {
            date: row.date,
            one_time_sales: 0,
            weekly_sales: 0,
            biweekly_sales: 0,
            monthly_sales: 0,
        });
        point.one_time_sales = point
            .one_time_sales
            .saturating_add(row.sales_for(Category::OneTime));
        point.weekly_sales = point
            .weekly_sales
            .saturating_add(row.sales_for(Category::Weekly));
        point.biweekly_sales = point
            .biweekly_sales
            .saturating_add(row.sales_for(Category::Biweekly));
        point.monthly_sales = point
            .monthly_sales
            .saturating_add(row.sales_for(Category::Monthly));
    }
    by_date.into_values().collect()
}

pub fn totals(rows: &[ReportRow]) -> Totals {
    let quotes = total_quotes(rows);
    let sales = total_sales(rows);
    let rate = conversion_rate(quotes, sales);
    Totals {
        quotes,
        sales,
        conversion_rate: rate,
        tier: classify_rate(rate),
    }
}

/// Everything the dashboard page shows for one filter selection.
///
/// The totals card and chart follow the filter; the per-branch and per-rep
/// breakdowns always cover every stored row.
pub fn build_dashboard(rows: &[ReportRow], criteria: &FilterCriteria) -> DashboardResponse {
    let filtered = filter_rows(rows, criteria);

    DashboardResponse {
        filter: criteria.clone(),
        row_count: filtered.len(),
        totals: totals(&filtered),
        by_branch: group_totals(rows, branch_key),
        by_rep: group_totals(rows, rep_key),
        series: sales_series(&filtered),
    }
}
