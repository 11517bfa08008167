//! Points ledger and every write that moves a balance.
//!
//! Each public method here runs in one SQL transaction: the balance update
//! and its ledger entry commit together or not at all. Accrual is keyed on
//! the transaction id by a unique index, so crediting the same transaction
//! twice is a no-op.

use super::{
    account::read_account,
    enum_col, millis, timestamp_col,
    transaction::{insert_transaction_row, read_transaction},
    LoyaltyStore,
};
use crate::{
    error::{LoyaltyError, LoyaltyResult, StoreErrorKind},
    model::{LedgerKind, LoyaltyAccount, PointsLedgerEntry, Transaction, TransactionStatus},
    types::Timestamp,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccrualOutcome {
    pub points_earned:  i64,
    /// False when the transaction had already been credited, or is not
    /// completed and so earns nothing yet.
    pub newly_credited: bool,
}

impl AccrualOutcome {
    fn none() -> Self {
        Self { points_earned: 0, newly_credited: false }
    }
}

impl LoyaltyStore {
    /// Insert a transaction. A completed one is credited `points` in the
    /// same SQL transaction.
    pub fn record_transaction(
        &self,
        t: &Transaction,
        points: i64,
        description: &str,
    ) -> LoyaltyResult<AccrualOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        insert_transaction_row(&tx, t)?;
        let outcome = if t.is_completed() {
            credit_once(&tx, t, points, description, t.created_at)?
        } else {
            AccrualOutcome::none()
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Move a pending transaction to completed and credit it. `accrue` is
    /// called with the stored row to price the credit.
    ///
    /// Completing an already-completed transaction returns its original
    /// credit with `newly_credited = false`.
    pub fn complete_transaction<F>(
        &self,
        merchant_id: &str,
        transaction_id: &str,
        at: Timestamp,
        accrue: F,
    ) -> LoyaltyResult<AccrualOutcome>
    where
        F: FnOnce(&Transaction) -> LoyaltyResult<(i64, String)>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut t = read_transaction(&tx, merchant_id, transaction_id)?;

        if t.status == TransactionStatus::Completed {
            let points = earned_points_for(&tx, transaction_id)?.unwrap_or(0);
            return Ok(AccrualOutcome { points_earned: points, newly_credited: false });
        }
        ensure_transition(&t, TransactionStatus::Completed)?;

        let (points, description) = accrue(&t)?;
        tx.execute(
            "UPDATE transactions SET status = 'completed' WHERE transaction_id = ?1",
            params![transaction_id],
        )?;
        t.status = TransactionStatus::Completed;
        let outcome = credit_once(&tx, &t, points, &description, at)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Move a pending transaction to failed or cancelled.
    pub fn close_transaction(
        &self,
        merchant_id: &str,
        transaction_id: &str,
        next: TransactionStatus,
    ) -> LoyaltyResult<()> {
        if next == TransactionStatus::Completed {
            return Err(LoyaltyError::validation(
                "completing a transaction must go through complete_transaction",
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        let t = read_transaction(&tx, merchant_id, transaction_id)?;
        ensure_transition(&t, next)?;
        tx.execute(
            "UPDATE transactions SET status = ?1 WHERE transaction_id = ?2",
            params![next.as_str(), transaction_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Read the account, let `rule` decide the new balance, then write the
    /// balance and a ledger entry for the difference.
    ///
    /// Earned entries are only written by transaction accrual, which keys
    /// them on a transaction id; they are refused here.
    pub fn apply_points_change<F>(
        &self,
        customer_id: &str,
        merchant_id: &str,
        kind: LedgerKind,
        description: &str,
        at: Timestamp,
        rule: F,
    ) -> LoyaltyResult<LoyaltyAccount>
    where
        F: FnOnce(&LoyaltyAccount) -> LoyaltyResult<i64>,
    {
        if kind == LedgerKind::Earned {
            return Err(LoyaltyError::validation(
                "earned points are credited through transaction accrual only",
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        let account = read_account(&tx, customer_id, merchant_id)?;
        let new_balance = rule(&account)?;
        let delta = new_balance - account.current_points;

        let redeemed = if kind == LedgerKind::Redeemed { -delta } else { 0 };
        tx.execute(
            "UPDATE loyalty_account
             SET current_points = ?1,
                 total_redeemed = total_redeemed + ?2
             WHERE customer_id = ?3 AND merchant_id = ?4",
            params![new_balance, redeemed, customer_id, merchant_id],
        )?;
        insert_ledger_row(
            &tx,
            &PointsLedgerEntry {
                entry_id:       None,
                customer_id:    customer_id.to_string(),
                merchant_id:    merchant_id.to_string(),
                transaction_id: None,
                points_change:  delta,
                kind,
                description:    description.to_string(),
                created_at:     at,
            },
        )?;
        let updated = read_account(&tx, customer_id, merchant_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Ledger entries for one account, newest first.
    pub fn ledger_for(
        &self,
        customer_id: &str,
        merchant_id: &str,
        limit: usize,
    ) -> LoyaltyResult<Vec<PointsLedgerEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, customer_id, merchant_id, transaction_id, points_change,
                    kind, description, created_at
             FROM points_ledger
             WHERE customer_id = ?1 AND merchant_id = ?2
             ORDER BY created_at DESC, entry_id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![customer_id, merchant_id, limit as i64], |row| {
            Ok(PointsLedgerEntry {
                entry_id:       Some(row.get(0)?),
                customer_id:    row.get(1)?,
                merchant_id:    row.get(2)?,
                transaction_id: row.get(3)?,
                points_change:  row.get(4)?,
                kind:           enum_col(row, 5)?,
                description:    row.get(6)?,
                created_at:     timestamp_col(row, 7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn ensure_transition(t: &Transaction, next: TransactionStatus) -> LoyaltyResult<()> {
    if !t.status.can_transition_to(next) {
        return Err(LoyaltyError::validation(format!(
            "transaction {} cannot move from {} to {}",
            t.transaction_id, t.status, next
        )));
    }
    Ok(())
}

fn earned_points_for(conn: &Connection, transaction_id: &str) -> LoyaltyResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT points_change FROM points_ledger
             WHERE transaction_id = ?1 AND kind = 'earned'",
            params![transaction_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn insert_ledger_row(conn: &Connection, e: &PointsLedgerEntry) -> LoyaltyResult<()> {
    conn.execute(
        "INSERT INTO points_ledger
            (customer_id, merchant_id, transaction_id, points_change, kind, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            e.customer_id,
            e.merchant_id,
            e.transaction_id,
            e.points_change,
            e.kind.as_str(),
            e.description,
            millis(e.created_at),
        ],
    )?;
    Ok(())
}

/// Credit a completed transaction unless the ledger already holds its
/// accrual. The unique index decides; the error kind, not its text, tells
/// us which case we hit.
fn credit_once(
    conn: &Connection,
    t: &Transaction,
    points: i64,
    description: &str,
    at: Timestamp,
) -> LoyaltyResult<AccrualOutcome> {
    let entry = PointsLedgerEntry {
        entry_id:       None,
        customer_id:    t.customer_id.clone(),
        merchant_id:    t.merchant_id.clone(),
        transaction_id: Some(t.transaction_id.clone()),
        points_change:  points,
        kind:           LedgerKind::Earned,
        description:    description.to_string(),
        created_at:     at,
    };
    match insert_ledger_row(conn, &entry) {
        Ok(()) => {}
        Err(e) if e.store_kind() == Some(StoreErrorKind::ConstraintViolation) => {
            log::warn!("transaction {} already credited, skipping accrual", t.transaction_id);
            let existing = earned_points_for(conn, &t.transaction_id)?.unwrap_or(0);
            return Ok(AccrualOutcome { points_earned: existing, newly_credited: false });
        }
        Err(e) => return Err(e),
    }

    let updated = conn.execute(
        "UPDATE loyalty_account
         SET current_points = current_points + ?1, total_earned = total_earned + ?1
         WHERE customer_id = ?2 AND merchant_id = ?3",
        params![points, t.customer_id, t.merchant_id],
    )?;
    if updated == 0 {
        return Err(LoyaltyError::NotFound {
            entity: "loyalty account",
            id:     format!("{}@{}", t.customer_id, t.merchant_id),
        });
    }
    log::info!(
        "credited {points} to customer {} for transaction {}",
        t.customer_id,
        t.transaction_id
    );
    Ok(AccrualOutcome { points_earned: points, newly_credited: true })
}
