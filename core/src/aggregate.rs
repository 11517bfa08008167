//! Per-customer aggregation.
//!
//! Reduces one customer's transactions at one merchant to summary
//! statistics. Only completed transactions count; anything else in the
//! input is discarded here so callers cannot double-count or leak pending
//! rows into totals.

use crate::{
    error::{LoyaltyError, LoyaltyResult},
    model::{PaymentMethod, Transaction},
    types::Timestamp,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastTransaction {
    pub amount:         Decimal,
    pub payment_method: PaymentMethod,
    pub created_at:     Timestamp,
    pub notes:          Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerSummary {
    pub total_spent:           Decimal,
    pub total_transactions:    usize,
    pub average_order_value:   Decimal,
    pub last_visit_at:         Option<Timestamp>,
    /// `None` means never visited; `Some(0)` means visited today.
    pub days_since_last_visit: Option<i64>,
    pub last_transaction:      Option<LastTransaction>,
}

impl CustomerSummary {
    pub fn empty() -> Self {
        Self {
            total_spent:           Decimal::ZERO,
            total_transactions:    0,
            average_order_value:   Decimal::ZERO,
            last_visit_at:         None,
            days_since_last_visit: None,
            last_transaction:      None,
        }
    }
}

/// Whole days elapsed from `then` to `now`, floored.
pub fn whole_days_between(then: Timestamp, now: Timestamp) -> i64 {
    (now - then).num_milliseconds().div_euclid(MS_PER_DAY)
}

/// `total + amount`, or a validation error when the sum leaves the
/// decimal range.
pub fn add_amount(total: Decimal, amount: Decimal) -> LoyaltyResult<Decimal> {
    total.checked_add(amount).ok_or_else(|| {
        LoyaltyError::validation(format!("spend total overflowed adding {amount}"))
    })
}

/// `value * factor` compared against `total`. A threshold past the decimal
/// range is never exceeded.
pub fn exceeds(total: Decimal, value: Decimal, factor: Decimal) -> bool {
    value.checked_mul(factor).map_or(false, |limit| total > limit)
}

/// `total` below `value * factor`. Everything is below an out-of-range
/// threshold.
pub fn falls_below(total: Decimal, value: Decimal, factor: Decimal) -> bool {
    value.checked_mul(factor).map_or(true, |limit| total < limit)
}

/// Summarize a customer's transactions, newest first.
///
/// The most recent completed transaction defines the last visit. For input
/// already sorted descending that is the first completed element.
pub fn summarize(transactions: &[Transaction], now: Timestamp) -> LoyaltyResult<CustomerSummary> {
    let mut total_spent = Decimal::ZERO;
    let mut count = 0usize;
    let mut latest: Option<&Transaction> = None;

    for t in transactions.iter().filter(|t| t.is_completed()) {
        total_spent = add_amount(total_spent, t.amount)?;
        count += 1;
        if latest.map_or(true, |l| t.created_at > l.created_at) {
            latest = Some(t);
        }
    }

    if count == 0 {
        return Ok(CustomerSummary::empty());
    }

    let last_visit_at = latest.map(|t| t.created_at);
    Ok(CustomerSummary {
        total_spent,
        total_transactions: count,
        average_order_value: total_spent / Decimal::from(count),
        last_visit_at,
        days_since_last_visit: last_visit_at.map(|at| whole_days_between(at, now)),
        last_transaction: latest.map(|t| LastTransaction {
            amount:         t.amount,
            payment_method: t.payment_method,
            created_at:     t.created_at,
            notes:          t.notes.clone(),
        }),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    pub fn now() -> crate::types::Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn txn(amount: &str, days_ago: i64) -> Transaction {
        txn_with_status(amount, days_ago, TransactionStatus::Completed)
    }

    pub fn txn_with_status(amount: &str, days_ago: i64, status: TransactionStatus) -> Transaction {
        Transaction {
            transaction_id:   format!("t-{amount}-{days_ago}"),
            transaction_code: "TXN-0-0".into(),
            customer_id:      "c-1".into(),
            merchant_id:      "m-1".into(),
            amount:           amount.parse::<Decimal>().unwrap(),
            currency:         "SGD".into(),
            transaction_type: TransactionType::Purchase,
            payment_method:   PaymentMethod::Card,
            notes:            None,
            status,
            created_at:       now() - Duration::days(days_ago),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::model::TransactionStatus;
    use chrono::Duration;

    #[test]
    fn empty_list_means_never_visited() {
        let s = summarize(&[], now()).unwrap();
        assert_eq!(s.total_spent, Decimal::ZERO);
        assert_eq!(s.total_transactions, 0);
        assert_eq!(s.average_order_value, Decimal::ZERO);
        assert_eq!(s.last_visit_at, None);
        assert_eq!(s.days_since_last_visit, None);
    }

    #[test]
    fn total_is_exact_sum_of_amounts() {
        let txns: Vec<_> = ["0.10", "0.20", "19.99", "0.01", "1000.33"]
            .iter()
            .enumerate()
            .map(|(i, a)| txn(a, i as i64))
            .collect();
        let s = summarize(&txns, now()).unwrap();
        assert_eq!(s.total_spent, "1020.63".parse::<Decimal>().unwrap());
        assert_eq!(s.total_transactions, 5);
    }

    #[test]
    fn average_order_value_divides_total_by_count() {
        let s = summarize(&[txn("30", 1), txn("10", 3)], now()).unwrap();
        assert_eq!(s.average_order_value, Decimal::from(20));
    }

    #[test]
    fn last_visit_is_newest_and_days_are_floored() {
        let mut recent = txn("5", 0);
        recent.created_at = now() - Duration::hours(47);
        let s = summarize(&[recent.clone(), txn("8", 10)], now()).unwrap();
        assert_eq!(s.last_visit_at, Some(recent.created_at));
        assert_eq!(s.days_since_last_visit, Some(1));
        assert_eq!(s.last_transaction.unwrap().amount, Decimal::from(5));
    }

    #[test]
    fn visited_today_is_zero_not_none() {
        let s = summarize(&[txn("5", 0)], now()).unwrap();
        assert_eq!(s.days_since_last_visit, Some(0));
    }

    #[test]
    fn non_completed_transactions_are_ignored() {
        let txns = vec![
            txn_with_status("500", 0, TransactionStatus::Pending),
            txn_with_status("400", 1, TransactionStatus::Failed),
            txn_with_status("300", 2, TransactionStatus::Cancelled),
            txn("25", 5),
        ];
        let s = summarize(&txns, now()).unwrap();
        assert_eq!(s.total_spent, Decimal::from(25));
        assert_eq!(s.total_transactions, 1);
        assert_eq!(s.days_since_last_visit, Some(5));
    }

    #[test]
    fn only_non_completed_is_same_as_empty() {
        let txns = vec![txn_with_status("50", 1, TransactionStatus::Pending)];
        assert_eq!(summarize(&txns, now()).unwrap(), CustomerSummary::empty());
    }

    #[test]
    fn overflowing_total_is_an_error_not_a_panic() {
        let mut huge = txn("1", 1);
        huge.amount = Decimal::MAX;
        let err = summarize(&[huge.clone(), huge], now()).unwrap_err();
        assert!(matches!(err, LoyaltyError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn out_of_range_thresholds() {
        assert!(!exceeds(Decimal::MAX, Decimal::MAX, Decimal::from(2)));
        assert!(falls_below(Decimal::MAX, Decimal::MAX, Decimal::from(2)));
        assert!(exceeds(Decimal::from(3), Decimal::ONE, Decimal::from(2)));
    }
}
