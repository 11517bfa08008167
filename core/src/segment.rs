//! Qualitative customer segments.

use crate::{
    aggregate::{add_amount, exceeds, whole_days_between},
    config::SegmentThresholds,
    error::LoyaltyResult,
    types::Timestamp,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Segment {
    #[serde(rename = "VIP")]
    Vip,
    Regular,
    New,
    Inactive,
}

impl Segment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vip => "VIP",
            Self::Regular => "Regular",
            Self::New => "New",
            Self::Inactive => "Inactive",
        }
    }
}

/// Inputs the classifier reads for one customer.
#[derive(Debug, Clone, Copy)]
pub struct SegmentInputs {
    pub total_spent:           Decimal,
    pub days_since_last_visit: Option<i64>,
    pub joined_at:             Timestamp,
}

/// Rules are checked in order and the first match wins, so a big spender
/// who joined last week is VIP and a lapsed big spender is still VIP.
pub fn classify_segment(
    inputs: &SegmentInputs,
    average_spend: Decimal,
    now: Timestamp,
    thresholds: &SegmentThresholds,
) -> Segment {
    if exceeds(inputs.total_spent, average_spend, thresholds.vip_multiplier) {
        return Segment::Vip;
    }
    if exceeds(inputs.total_spent, average_spend, thresholds.regular_multiplier) {
        return Segment::Regular;
    }
    match inputs.days_since_last_visit {
        None => return Segment::Inactive,
        Some(days) if days > thresholds.inactive_after_days => return Segment::Inactive,
        Some(_) => {}
    }
    if whole_days_between(inputs.joined_at, now) < thresholds.new_within_days {
        return Segment::New;
    }
    Segment::Regular
}

/// Mean of the given totals; zero for an empty merchant.
pub fn average_spend<I>(totals: I) -> LoyaltyResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut sum = Decimal::ZERO;
    let mut n = 0u64;
    for v in totals {
        sum = add_amount(sum, v)?;
        n += 1;
    }
    if n == 0 {
        Ok(Decimal::ZERO)
    } else {
        Ok(sum / Decimal::from(n))
    }
}
