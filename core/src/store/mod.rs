//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The service calls store methods; it never executes SQL directly.
//! Balance changes always go through `store::ledger` so the account row and
//! its ledger entry are written in the same SQL transaction.

use crate::{error::LoyaltyResult, types::Timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

mod account;
mod customer;
mod ledger;
mod merchant;
mod transaction;

pub use ledger::AccrualOutcome;

pub struct LoyaltyStore {
    conn: Connection,
}

impl LoyaltyStore {
    pub fn open(path: &str) -> LoyaltyResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        log::debug!("opened loyalty store at {path}");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LoyaltyResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LoyaltyResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_transactions.sql"))?;
        Ok(())
    }
}

// ── Column codecs ────────────────────────────────────────────────────

pub(crate) fn millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let ms: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

pub(crate) fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a text column into one of the model enums.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = crate::error::LoyaltyError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
