use super::LoyaltyStore;
use crate::{
    error::{LoyaltyError, LoyaltyResult},
    model::LoyaltyAccount,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

impl LoyaltyStore {
    // ── Loyalty account ───────────────────────────────────────────

    pub fn account(&self, customer_id: &str, merchant_id: &str) -> LoyaltyResult<LoyaltyAccount> {
        read_account(&self.conn, customer_id, merchant_id)
    }

    /// Current balance per customer for one merchant.
    pub fn balances_for_merchant(&self, merchant_id: &str) -> LoyaltyResult<HashMap<String, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, current_points FROM loyalty_account WHERE merchant_id = ?1",
        )?;
        let rows = stmt.query_map(params![merchant_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect::<Result<HashMap<_, _>, _>>().map_err(Into::into)
    }
}

/// Zero-balance account, written inside the customer insert.
pub(super) fn open_account(
    conn: &Connection,
    customer_id: &str,
    merchant_id: &str,
) -> LoyaltyResult<()> {
    conn.execute(
        "INSERT INTO loyalty_account (customer_id, merchant_id) VALUES (?1, ?2)",
        params![customer_id, merchant_id],
    )?;
    Ok(())
}

/// Shared with the ledger, which reads inside its own SQL transaction.
pub(super) fn read_account(
    conn: &Connection,
    customer_id: &str,
    merchant_id: &str,
) -> LoyaltyResult<LoyaltyAccount> {
    conn.query_row(
        "SELECT customer_id, merchant_id, current_points, total_earned, total_redeemed
         FROM loyalty_account WHERE customer_id = ?1 AND merchant_id = ?2",
        params![customer_id, merchant_id],
        map_account_row,
    )
    .optional()?
    .ok_or_else(|| LoyaltyError::NotFound {
        entity: "loyalty account",
        id:     format!("{customer_id}@{merchant_id}"),
    })
}

fn map_account_row(row: &Row<'_>) -> rusqlite::Result<LoyaltyAccount> {
    Ok(LoyaltyAccount {
        customer_id:    row.get(0)?,
        merchant_id:    row.get(1)?,
        current_points: row.get(2)?,
        total_earned:   row.get(3)?,
        total_redeemed: row.get(4)?,
    })
}
