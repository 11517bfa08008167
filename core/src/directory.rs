//! Customer directory: search, filter, sort and page over derived insights.

use crate::{
    aggregate::{exceeds, falls_below},
    config::DirectoryConfig,
    error::LoyaltyResult,
    insight::CustomerInsight,
    model::CustomerStatus,
    segment::average_spend,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpendingBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    TotalSpent,
    LoyaltyPoints,
    LastVisit,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DirectoryQuery {
    pub search:   Option<String>,
    pub status:   Option<CustomerStatus>,
    pub spending: Option<SpendingBand>,
    pub sort_by:  SortKey,
    pub order:    SortOrder,
    /// 1-based.
    pub page:     usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryPage {
    pub customers:   Vec<CustomerInsight>,
    pub page:        usize,
    pub total_pages: usize,
    pub total_count: usize,
}

pub fn spending_band(total: Decimal, average: Decimal, config: &DirectoryConfig) -> SpendingBand {
    if exceeds(total, average, config.high_band_multiplier) {
        SpendingBand::High
    } else if falls_below(total, average, config.low_band_multiplier) {
        SpendingBand::Low
    } else {
        SpendingBand::Medium
    }
}

fn matches_search(c: &CustomerInsight, needle: &str) -> bool {
    let hit = |field: &str| field.to_lowercase().contains(needle);
    hit(&c.first_name)
        || hit(&c.last_name)
        || hit(&c.code)
        || c.email.as_deref().is_some_and(hit)
}

fn compare(a: &CustomerInsight, b: &CustomerInsight, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => {
            let an = format!("{} {}", a.first_name, a.last_name).to_lowercase();
            let bn = format!("{} {}", b.first_name, b.last_name).to_lowercase();
            an.cmp(&bn)
        }
        SortKey::TotalSpent => a.total_spent.cmp(&b.total_spent),
        SortKey::LoyaltyPoints => a.loyalty_points.cmp(&b.loyalty_points),
        // Never-visited sorts as the oldest possible visit.
        SortKey::LastVisit => a.last_visit_at.cmp(&b.last_visit_at),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

/// Apply `query` to `customers`. Spending bands are measured against the
/// average of the whole unfiltered list.
pub fn query_directory(
    customers: &[CustomerInsight],
    query: &DirectoryQuery,
    config: &DirectoryConfig,
) -> LoyaltyResult<DirectoryPage> {
    let average = average_spend(customers.iter().map(|c| c.total_spent))?;
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut result: Vec<&CustomerInsight> = customers
        .iter()
        .filter(|c| needle.as_deref().map_or(true, |n| matches_search(c, n)))
        .filter(|c| query.status.map_or(true, |s| c.status == s))
        .filter(|c| {
            query
                .spending
                .map_or(true, |band| spending_band(c.total_spent, average, config) == band)
        })
        .collect();

    // Stable sort keeps input order among equal keys.
    result.sort_by(|a, b| {
        let ord = compare(a, b, query.sort_by);
        match query.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let page_size = config.page_size.max(1);
    let total_count = result.len();
    let total_pages = total_count.div_ceil(page_size);
    let page = query.page.max(1);
    let customers = result
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Ok(DirectoryPage {
        customers,
        page,
        total_pages,
        total_count,
    })
}
