//! Customer-insight pipeline.
//!
//! Turns each customer's raw transactions into a `CustomerInsight`:
//!   1. aggregate (totals, recency)
//!   2. trend over two trailing windows
//!   3. merchant-wide average spend across all customers
//!   4. segment, which needs the average from step 3
//!
//! Nothing here is cached. The same transactions and `now` always give the
//! same insights.

use crate::{
    aggregate::{self, CustomerSummary, LastTransaction, MS_PER_DAY},
    config::LoyaltyConfig,
    error::LoyaltyResult,
    model::{Customer, CustomerStatus, Transaction},
    segment::{self, Segment, SegmentInputs},
    trend::{SpendingTrend, TrendWindows},
    types::{CustomerId, Timestamp},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything fetched for one customer before derivation.
#[derive(Debug, Clone)]
pub struct CustomerActivity {
    pub customer:       Customer,
    pub loyalty_points: i64,
    /// Newest first.
    pub transactions:   Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerInsight {
    pub customer_id:             CustomerId,
    pub code:                    String,
    pub first_name:              String,
    pub last_name:               String,
    pub email:                   Option<String>,
    pub status:                  CustomerStatus,
    pub created_at:              Timestamp,
    pub loyalty_points:          i64,
    pub total_spent:             Decimal,
    pub total_transactions:      usize,
    pub average_order_value:     Decimal,
    pub last_visit_at:           Option<Timestamp>,
    pub days_since_last_visit:   Option<i64>,
    pub last_transaction:        Option<LastTransaction>,
    /// Visits per 30-day month since joining, counting at least one month.
    pub visit_frequency:         Decimal,
    pub spending_trend:          SpendingTrend,
    pub recent_spending:         Decimal,
    pub customer_lifetime_value: Decimal,
    pub segment:                 Segment,
}

pub fn visit_frequency(total_transactions: usize, joined_at: Timestamp, now: Timestamp) -> Decimal {
    let month_ms = Decimal::from(30 * MS_PER_DAY);
    let months = (Decimal::from((now - joined_at).num_milliseconds()) / month_ms).max(Decimal::ONE);
    Decimal::from(total_transactions) / months
}

/// Derive insights for every customer of one merchant.
pub fn derive_insights(
    activities: &[CustomerActivity],
    now: Timestamp,
    config: &LoyaltyConfig,
) -> LoyaltyResult<Vec<CustomerInsight>> {
    let summaries = activities
        .iter()
        .map(|a| aggregate::summarize(&a.transactions, now))
        .collect::<LoyaltyResult<Vec<CustomerSummary>>>()?;
    let average = segment::average_spend(summaries.iter().map(|s| s.total_spent))?;
    log::debug!(
        "deriving insights for {} customers, average spend {average}",
        activities.len()
    );

    activities
        .iter()
        .zip(summaries)
        .map(|(activity, summary)| build_insight(activity, summary, average, now, config))
        .collect()
}

fn build_insight(
    activity: &CustomerActivity,
    summary: CustomerSummary,
    average_spend: Decimal,
    now: Timestamp,
    config: &LoyaltyConfig,
) -> LoyaltyResult<CustomerInsight> {
    let c = &activity.customer;
    let windows = TrendWindows::collect(&activity.transactions, now, &config.trend)?;
    let segment = segment::classify_segment(
        &SegmentInputs {
            total_spent:           summary.total_spent,
            days_since_last_visit: summary.days_since_last_visit,
            joined_at:             c.created_at,
        },
        average_spend,
        now,
        &config.segments,
    );

    Ok(CustomerInsight {
        customer_id:             c.customer_id.clone(),
        code:                    c.code.clone(),
        first_name:              c.first_name.clone(),
        last_name:               c.last_name.clone(),
        email:                   c.email.clone(),
        status:                  c.status,
        created_at:              c.created_at,
        loyalty_points:          activity.loyalty_points,
        visit_frequency:         visit_frequency(summary.total_transactions, c.created_at, now),
        spending_trend:          windows.classify(&config.trend),
        recent_spending:         windows.recent_spend,
        customer_lifetime_value: summary.total_spent,
        total_spent:             summary.total_spent,
        total_transactions:      summary.total_transactions,
        average_order_value:     summary.average_order_value,
        last_visit_at:           summary.last_visit_at,
        days_since_last_visit:   summary.days_since_last_visit,
        last_transaction:        summary.last_transaction,
        segment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::{now, txn};
    use chrono::Duration;

    fn customer(id: &str, joined_days_ago: i64) -> Customer {
        Customer {
            customer_id: id.into(),
            merchant_id: "m-1".into(),
            code:        format!("CUST-{id}"),
            first_name:  "Ada".into(),
            last_name:   id.into(),
            email:       None,
            phone:       None,
            status:      CustomerStatus::Active,
            created_at:  now() - Duration::days(joined_days_ago),
        }
    }

    fn activity(id: &str, joined_days_ago: i64, transactions: Vec<Transaction>) -> CustomerActivity {
        CustomerActivity {
            customer: customer(id, joined_days_ago),
            loyalty_points: 0,
            transactions,
        }
    }

    #[test]
    fn insights_segment_against_merchant_average() {
        let activities = vec![
            activity("big", 365, vec![txn("900", 3)]),
            activity("mid", 365, vec![txn("60", 5)]),
            activity("gone", 365, vec![txn("40", 120)]),
            activity("fresh", 5, vec![txn("0.50", 1)]),
        ];
        let insights = derive_insights(&activities, now(), &LoyaltyConfig::default()).unwrap();
        let segments: Vec<_> = insights.iter().map(|i| i.segment).collect();
        // average = 250.125
        assert_eq!(
            segments,
            vec![Segment::Vip, Segment::Regular, Segment::Inactive, Segment::New]
        );
    }

    #[test]
    fn customer_without_transactions_is_zeroed() {
        let insights =
            derive_insights(&[activity("none", 400, vec![])], now(), &LoyaltyConfig::default())
                .unwrap();
        let i = &insights[0];
        assert_eq!(i.total_spent, Decimal::ZERO);
        assert_eq!(i.average_order_value, Decimal::ZERO);
        assert_eq!(i.last_visit_at, None);
        assert_eq!(i.days_since_last_visit, None);
        assert_eq!(i.visit_frequency, Decimal::ZERO);
        assert_eq!(i.spending_trend, SpendingTrend::Stable);
        assert_eq!(i.segment, Segment::Inactive);
    }

    #[test]
    fn visit_frequency_counts_at_least_one_month() {
        assert_eq!(visit_frequency(3, now() - Duration::days(10), now()), Decimal::from(3));
        assert_eq!(visit_frequency(6, now() - Duration::days(90), now()), Decimal::from(2));
    }

    #[test]
    fn derivation_is_deterministic() {
        let activities = vec![
            activity("a", 100, vec![txn("100", 10), txn("50", 40)]),
            activity("b", 100, vec![txn("12.34", 2)]),
        ];
        let config = LoyaltyConfig::default();
        let first = derive_insights(&activities, now(), &config).unwrap();
        let second = derive_insights(&activities, now(), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].spending_trend, SpendingTrend::Up);
        assert_eq!(first[0].recent_spending, Decimal::from(100));
        assert_eq!(first[0].customer_lifetime_value, Decimal::from(150));
    }

    #[test]
    fn merchant_average_overflow_is_an_error() {
        let mut a = txn("1", 1);
        a.amount = Decimal::MAX;
        let activities = vec![
            activity("a", 100, vec![a.clone()]),
            activity("b", 100, vec![a]),
        ];
        let err = derive_insights(&activities, now(), &LoyaltyConfig::default()).unwrap_err();
        assert!(matches!(err, crate::error::LoyaltyError::Validation(_)), "got {err:?}");
    }
}
