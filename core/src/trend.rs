//! Spending trend: compares the last window of spend with the one before.
//!
//! This is a plain threshold heuristic over two trailing windows, not a
//! statistical test. There is no smoothing.

use crate::{
    aggregate::{add_amount, exceeds, falls_below},
    config::TrendConfig,
    error::LoyaltyResult,
    model::Transaction,
    types::Timestamp,
};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpendingTrend {
    Up,
    Down,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendWindows {
    /// Spend in (now - window, now].
    pub recent_spend:   Decimal,
    /// Spend in (now - 2*window, now - window].
    pub previous_spend: Decimal,
}

impl TrendWindows {
    pub fn collect(
        transactions: &[Transaction],
        now: Timestamp,
        config: &TrendConfig,
    ) -> LoyaltyResult<Self> {
        let window = Duration::days(config.window_days);
        let recent_start = now - window;
        let previous_start = recent_start - window;

        let mut recent_spend = Decimal::ZERO;
        let mut previous_spend = Decimal::ZERO;
        for t in transactions.iter().filter(|t| t.is_completed()) {
            if t.created_at > recent_start && t.created_at <= now {
                recent_spend = add_amount(recent_spend, t.amount)?;
            } else if t.created_at > previous_start && t.created_at <= recent_start {
                previous_spend = add_amount(previous_spend, t.amount)?;
            }
        }
        Ok(Self { recent_spend, previous_spend })
    }

    pub fn classify(&self, config: &TrendConfig) -> SpendingTrend {
        classify_trend(self.recent_spend, self.previous_spend, config)
    }
}

/// With no previous spend any recent spend reads as `Up`; both zero is `Stable`.
pub fn classify_trend(recent: Decimal, previous: Decimal, config: &TrendConfig) -> SpendingTrend {
    if exceeds(recent, previous, config.up_factor) {
        SpendingTrend::Up
    } else if falls_below(recent, previous, config.down_factor) {
        SpendingTrend::Down
    } else {
        SpendingTrend::Stable
    }
}
