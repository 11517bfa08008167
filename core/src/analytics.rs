//! Merchant analytics over a trailing time range.
//!
//! Days are UTC calendar days. Daily averages divide by the number of days
//! that had at least one transaction, not by the length of the range.

use crate::{
    aggregate::add_amount,
    error::LoyaltyResult,
    model::Transaction,
    types::{CustomerId, Timestamp},
};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const TOP_CUSTOMER_LIMIT: usize = 5;
pub const DAILY_SERIES_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TimeRange {
    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopCustomer {
    pub customer_id: CustomerId,
    pub name:        String,
    pub total:       Decimal,
    pub visits:      usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPoint {
    pub date:         NaiveDate,
    pub transactions: usize,
    pub sales:        Decimal,
    pub customers:    usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantAnalytics {
    pub range:                  TimeRange,
    pub total_sales:            Decimal,
    pub total_transactions:     usize,
    pub unique_customers:       usize,
    pub avg_transaction_value:  Decimal,
    pub avg_daily_transactions: Decimal,
    pub avg_daily_sales:        Decimal,
    pub top_customers:          Vec<TopCustomer>,
    /// Oldest day first, ending today.
    pub daily:                  Vec<DailyPoint>,
}

#[derive(Default)]
struct DayBucket {
    count:     usize,
    total:     Decimal,
    customers: BTreeSet<CustomerId>,
}

/// Build the analytics report. `None` when the merchant has no completed
/// transactions at all; a range with no activity yields a zeroed report.
pub fn merchant_analytics(
    transactions: &[Transaction],
    names: &HashMap<CustomerId, String>,
    range: TimeRange,
    now: Timestamp,
) -> LoyaltyResult<Option<MerchantAnalytics>> {
    let completed: Vec<&Transaction> = transactions.iter().filter(|t| t.is_completed()).collect();
    if completed.is_empty() {
        return Ok(None);
    }

    let start = now - Duration::days(range.days());
    let in_range: Vec<&Transaction> = completed
        .into_iter()
        .filter(|t| t.created_at >= start)
        .collect();

    let mut by_day: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    let mut by_customer: HashMap<&str, (Decimal, usize)> = HashMap::new();
    let mut total_sales = Decimal::ZERO;
    for t in &in_range {
        let bucket = by_day.entry(t.created_at.date_naive()).or_default();
        bucket.count += 1;
        bucket.total = add_amount(bucket.total, t.amount)?;
        bucket.customers.insert(t.customer_id.clone());

        let entry = by_customer.entry(t.customer_id.as_str()).or_insert((Decimal::ZERO, 0));
        entry.0 = add_amount(entry.0, t.amount)?;
        entry.1 += 1;

        total_sales = add_amount(total_sales, t.amount)?;
    }

    let total_transactions = in_range.len();
    let active_days = Decimal::from(by_day.len().max(1));
    let (avg_daily_transactions, avg_daily_sales) = if by_day.is_empty() {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        (Decimal::from(total_transactions) / active_days, total_sales / active_days)
    };
    let avg_transaction_value = if total_transactions == 0 {
        Decimal::ZERO
    } else {
        total_sales / Decimal::from(total_transactions)
    };

    let mut top_customers: Vec<TopCustomer> = by_customer
        .iter()
        .map(|(id, (total, visits))| TopCustomer {
            customer_id: id.to_string(),
            name:        display_name(id, names),
            total:       *total,
            visits:      *visits,
        })
        .collect();
    top_customers.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.customer_id.cmp(&b.customer_id)));
    top_customers.truncate(TOP_CUSTOMER_LIMIT);

    let today = now.date_naive();
    let daily = (0..DAILY_SERIES_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            match by_day.get(&date) {
                Some(b) => DailyPoint {
                    date,
                    transactions: b.count,
                    sales:        b.total,
                    customers:    b.customers.len(),
                },
                None => DailyPoint {
                    date,
                    transactions: 0,
                    sales:        Decimal::ZERO,
                    customers:    0,
                },
            }
        })
        .collect();

    let unique_customers = by_customer.len();
    log::debug!(
        "analytics {range:?}: {total_transactions} txns, {unique_customers} customers, sales {total_sales}"
    );

    Ok(Some(MerchantAnalytics {
        range,
        total_sales,
        total_transactions,
        unique_customers,
        avg_transaction_value,
        avg_daily_transactions,
        avg_daily_sales,
        top_customers,
        daily,
    }))
}

fn display_name(customer_id: &str, names: &HashMap<CustomerId, String>) -> String {
    match names.get(customer_id) {
        Some(name) => name.clone(),
        None => {
            let short: String = customer_id.chars().take(8).collect();
            format!("Customer {short}...")
        }
    }
}
