//! Points/stamps accrual, staff adjustments and redemption checks.
//!
//! These are pure balance rules. Persisting the result exactly once per
//! transaction is the store's job (see `store::ledger`).

use crate::{
    config::NegativeBalancePolicy,
    error::{LoyaltyError, LoyaltyResult},
    model::{LoyaltyAccount, LoyaltyProgram, ProgramType},
};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

/// Largest single transaction accepted, in currency units.
pub const MAX_TRANSACTION_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Reject non-positive and oversized amounts before anything is written.
pub fn validate_amount(amount: Decimal) -> LoyaltyResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LoyaltyError::validation(format!(
            "transaction amount must be positive, got {amount}"
        )));
    }
    if amount > MAX_TRANSACTION_AMOUNT {
        return Err(LoyaltyError::validation(format!(
            "transaction amount {amount} exceeds the maximum of {MAX_TRANSACTION_AMOUNT}"
        )));
    }
    Ok(())
}

/// Credit earned for one completed transaction.
///
/// Points: one per whole currency unit, truncated. Stamps: one per visit.
pub fn points_earned(amount: Decimal, program_type: ProgramType) -> LoyaltyResult<i64> {
    validate_amount(amount)?;
    match program_type {
        ProgramType::Points => amount.floor().to_i64().ok_or_else(|| {
            LoyaltyError::validation(format!("transaction amount {amount} is out of range"))
        }),
        ProgramType::Stamps => Ok(1),
    }
}

/// Same as [`points_earned`] for a program type read as text.
pub fn points_earned_for(amount: Decimal, program_type: &str) -> LoyaltyResult<i64> {
    let program_type: ProgramType = program_type.parse()?;
    points_earned(amount, program_type)
}

/// Human-readable ledger description for an accrual.
pub fn accrual_description(program_type: ProgramType) -> &'static str {
    match program_type {
        ProgramType::Points => "Transaction reward: purchase",
        ProgramType::Stamps => "Transaction reward: visit",
    }
}

// ── Manual adjustment ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    Add,
    Deduct,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointsAdjustment {
    pub action:    AdjustmentAction,
    /// Always positive; the action supplies the sign.
    pub magnitude: i64,
    pub reason:    String,
}

impl PointsAdjustment {
    /// Build from staff input. The magnitude must parse as a positive integer.
    pub fn from_input(action: AdjustmentAction, raw_points: &str, reason: &str) -> LoyaltyResult<Self> {
        let magnitude: i64 = raw_points.trim().parse().map_err(|_| {
            LoyaltyError::validation(format!("'{raw_points}' is not a whole number of points"))
        })?;
        let adjustment = Self {
            action,
            magnitude,
            reason: reason.trim().to_string(),
        };
        adjustment.validate()?;
        Ok(adjustment)
    }

    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.magnitude <= 0 {
            return Err(LoyaltyError::validation(format!(
                "adjustment must be a positive number of points, got {}",
                self.magnitude
            )));
        }
        Ok(())
    }

    pub fn delta(&self) -> i64 {
        match self.action {
            AdjustmentAction::Add => self.magnitude,
            AdjustmentAction::Deduct => -self.magnitude,
        }
    }

    pub fn description(&self) -> String {
        if self.reason.is_empty() {
            "Manual adjustment".to_string()
        } else {
            self.reason.clone()
        }
    }
}

/// New balance after an adjustment: `current + delta`, never clamped.
/// Under `Reject` a result below zero is refused instead.
pub fn apply_adjustment(
    account: &LoyaltyAccount,
    adjustment: &PointsAdjustment,
    policy: NegativeBalancePolicy,
) -> LoyaltyResult<i64> {
    adjustment.validate()?;
    let new_balance = account
        .current_points
        .checked_add(adjustment.delta())
        .ok_or_else(|| LoyaltyError::validation("points balance overflow"))?;
    if new_balance < 0 && policy == NegativeBalancePolicy::Reject {
        return Err(LoyaltyError::validation(format!(
            "deducting {} points would leave customer {} at {new_balance}",
            adjustment.magnitude, account.customer_id
        )));
    }
    Ok(new_balance)
}

// ── Redemption ───────────────────────────────────────────────────────

/// New balance after redeeming `points`. Redemption never overdraws.
pub fn check_redemption(
    account: &LoyaltyAccount,
    program: &LoyaltyProgram,
    points: i64,
) -> LoyaltyResult<i64> {
    if points <= 0 {
        return Err(LoyaltyError::validation("redemption must be a positive number of points"));
    }
    if points < program.minimum_redemption_points {
        return Err(LoyaltyError::validation(format!(
            "minimum redemption is {} points, requested {points}",
            program.minimum_redemption_points
        )));
    }
    if points > account.current_points {
        return Err(LoyaltyError::validation(format!(
            "customer {} has {} points, cannot redeem {points}",
            account.customer_id, account.current_points
        )));
    }
    Ok(account.current_points - points)
}
