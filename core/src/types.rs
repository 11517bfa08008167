//! Shared primitive types used across the loyalty core.

use chrono::{DateTime, Utc};

/// A stable, unique identifier for any stored entity.
pub type EntityId = String;

pub type MerchantId = EntityId;
pub type CustomerId = EntityId;
pub type TransactionId = EntityId;

/// Every instant in the crate is UTC.
pub type Timestamp = DateTime<Utc>;
