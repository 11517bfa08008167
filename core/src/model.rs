//! Stored entities: merchants, customers, programs, accounts, transactions
//! and the points ledger.
//!
//! Enum columns are persisted as their snake_case names. Parsing an unknown
//! name is an error, never a silent default.

use crate::{
    error::{LoyaltyError, LoyaltyResult},
    types::{CustomerId, EntityId, MerchantId, Timestamp, TransactionId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! text_enum {
    ($name:ident, $err:expr, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LoyaltyError;

            fn from_str(s: &str) -> LoyaltyResult<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($err(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

// ── Merchant ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Merchant {
    pub merchant_id:   MerchantId,
    pub business_name: String,
    pub merchant_code: String,
    pub created_at:    Timestamp,
}

/// The caller's tenant identity, passed explicitly into every service call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerchantSession {
    pub merchant_id: MerchantId,
    pub staff_user:  String,
}

impl MerchantSession {
    pub fn new(merchant_id: impl Into<MerchantId>, staff_user: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            staff_user:  staff_user.into(),
        }
    }
}

// ── Customer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Blocked,
}

text_enum!(CustomerStatus, LoyaltyError::Validation, {
    Active => "active",
    Inactive => "inactive",
    Blocked => "blocked",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
    pub code:        String,
    pub first_name:  String,
    pub last_name:   String,
    pub email:       Option<String>,
    pub phone:       Option<String>,
    pub status:      CustomerStatus,
    pub created_at:  Timestamp,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ── Program ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgramType {
    /// One point per whole currency unit spent.
    Points,
    /// One stamp per visit.
    Stamps,
}

text_enum!(ProgramType, LoyaltyError::Configuration, {
    Points => "points",
    Stamps => "stamps",
});

pub const DEFAULT_PROGRAM_NAME: &str = "Default Loyalty Program";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoyaltyProgram {
    pub merchant_id:               MerchantId,
    pub program_name:              String,
    pub program_type:              ProgramType,
    pub rate_per_currency_unit:    Decimal,
    pub minimum_redemption_points: i64,
}

impl LoyaltyProgram {
    /// The program a merchant gets before configuring anything.
    pub fn default_for(merchant_id: impl Into<MerchantId>) -> Self {
        Self {
            merchant_id:               merchant_id.into(),
            program_name:              DEFAULT_PROGRAM_NAME.to_string(),
            program_type:              ProgramType::Points,
            rate_per_currency_unit:    Decimal::ONE,
            minimum_redemption_points: 100,
        }
    }

    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.program_name.trim().is_empty() {
            return Err(LoyaltyError::configuration("program_name must not be empty"));
        }
        if self.rate_per_currency_unit <= Decimal::ZERO {
            return Err(LoyaltyError::configuration(format!(
                "rate_per_currency_unit must be positive, got {}",
                self.rate_per_currency_unit
            )));
        }
        if self.minimum_redemption_points < 0 {
            return Err(LoyaltyError::configuration(
                "minimum_redemption_points must not be negative",
            ));
        }
        Ok(())
    }
}

// ── Loyalty account ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoyaltyAccount {
    pub customer_id:    CustomerId,
    pub merchant_id:    MerchantId,
    pub current_points: i64,
    pub total_earned:   i64,
    pub total_redeemed: i64,
}

impl LoyaltyAccount {
    pub fn open(customer_id: impl Into<CustomerId>, merchant_id: impl Into<MerchantId>) -> Self {
        Self {
            customer_id:    customer_id.into(),
            merchant_id:    merchant_id.into(),
            current_points: 0,
            total_earned:   0,
            total_redeemed: 0,
        }
    }
}

// ── Transaction ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(TransactionStatus, LoyaltyError::Validation, {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl TransactionStatus {
    /// Only pending transactions may move, and only to a terminal status.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    Other,
}

text_enum!(PaymentMethod, LoyaltyError::Validation, {
    Cash => "cash",
    Card => "card",
    Mobile => "mobile",
    Other => "other",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Refund,
    Adjustment,
}

text_enum!(TransactionType, LoyaltyError::Validation, {
    Purchase => "purchase",
    Refund => "refund",
    Adjustment => "adjustment",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id:   TransactionId,
    pub transaction_code: String,
    pub customer_id:      CustomerId,
    pub merchant_id:      MerchantId,
    pub amount:           Decimal,
    pub currency:         String,
    pub transaction_type: TransactionType,
    pub payment_method:   PaymentMethod,
    pub notes:            Option<String>,
    pub status:           TransactionStatus,
    pub created_at:       Timestamp,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

// ── Points ledger ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Earned,
    Redeemed,
    Expired,
    Adjusted,
}

text_enum!(LedgerKind, LoyaltyError::Validation, {
    Earned => "earned",
    Redeemed => "redeemed",
    Expired => "expired",
    Adjusted => "adjusted",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsLedgerEntry {
    pub entry_id:       Option<i64>,
    pub customer_id:    CustomerId,
    pub merchant_id:    MerchantId,
    pub transaction_id: Option<EntityId>,
    pub points_change:  i64,
    pub kind:           LedgerKind,
    pub description:    String,
    pub created_at:     Timestamp,
}
