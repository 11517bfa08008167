use super::{decimal_col, enum_col, millis, timestamp_col, LoyaltyStore};
use crate::{
    error::{LoyaltyError, LoyaltyResult},
    model::Transaction,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) const TXN_COLUMNS: &str =
    "transaction_id, transaction_code, customer_id, merchant_id, amount, currency,
     transaction_type, payment_method, notes, status, created_at";

impl LoyaltyStore {
    // ── Transaction ───────────────────────────────────────────────

    pub fn transaction(&self, merchant_id: &str, transaction_id: &str) -> LoyaltyResult<Transaction> {
        read_transaction(&self.conn, merchant_id, transaction_id)
    }

    /// Completed transactions for one customer at one merchant, newest first.
    pub fn completed_transactions_for(
        &self,
        customer_id: &str,
        merchant_id: &str,
    ) -> LoyaltyResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE customer_id = ?1 AND merchant_id = ?2 AND status = 'completed'
             ORDER BY created_at DESC, transaction_id ASC"
        ))?;
        let rows = stmt.query_map(params![customer_id, merchant_id], map_transaction_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// A merchant's transactions of any status, newest first.
    pub fn transactions_for_merchant(&self, merchant_id: &str) -> LoyaltyResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE merchant_id = ?1
             ORDER BY created_at DESC, transaction_id ASC"
        ))?;
        let rows = stmt.query_map(params![merchant_id], map_transaction_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn transaction_count(&self, merchant_id: &str) -> LoyaltyResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE merchant_id = ?1",
            params![merchant_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(super) fn insert_transaction_row(conn: &Connection, t: &Transaction) -> LoyaltyResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO transactions ({TXN_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            t.transaction_id,
            t.transaction_code,
            t.customer_id,
            t.merchant_id,
            t.amount.to_string(),
            t.currency,
            t.transaction_type.as_str(),
            t.payment_method.as_str(),
            t.notes,
            t.status.as_str(),
            millis(t.created_at),
        ],
    )?;
    Ok(())
}

pub(super) fn read_transaction(
    conn: &Connection,
    merchant_id: &str,
    transaction_id: &str,
) -> LoyaltyResult<Transaction> {
    conn.query_row(
        &format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE merchant_id = ?1 AND transaction_id = ?2"
        ),
        params![merchant_id, transaction_id],
        map_transaction_row,
    )
    .optional()?
    .ok_or_else(|| LoyaltyError::NotFound {
        entity: "transaction",
        id:     transaction_id.to_string(),
    })
}

fn map_transaction_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        transaction_id:   row.get(0)?,
        transaction_code: row.get(1)?,
        customer_id:      row.get(2)?,
        merchant_id:      row.get(3)?,
        amount:           decimal_col(row, 4)?,
        currency:         row.get(5)?,
        transaction_type: enum_col(row, 6)?,
        payment_method:   enum_col(row, 7)?,
        notes:            row.get(8)?,
        status:           enum_col(row, 9)?,
        created_at:       timestamp_col(row, 10)?,
    })
}
