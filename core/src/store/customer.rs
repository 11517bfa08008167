use super::{account::open_account, enum_col, millis, timestamp_col, LoyaltyStore};
use crate::{
    error::{LoyaltyError, LoyaltyResult},
    model::{Customer, CustomerStatus},
};
use rusqlite::{params, OptionalExtension, Row};

const CUSTOMER_COLUMNS: &str =
    "customer_id, merchant_id, code, first_name, last_name, email, phone, status, created_at";

impl LoyaltyStore {
    // ── Customer ──────────────────────────────────────────────────

    /// Insert the customer together with an empty loyalty account at the
    /// same merchant. Both rows commit or neither does.
    pub fn insert_customer(&self, c: &Customer) -> LoyaltyResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO customer (
                customer_id, merchant_id, code, first_name, last_name,
                email, phone, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                c.customer_id,
                c.merchant_id,
                c.code,
                c.first_name,
                c.last_name,
                c.email,
                c.phone,
                c.status.as_str(),
                millis(c.created_at),
            ],
        )?;
        open_account(&tx, &c.customer_id, &c.merchant_id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn customer(&self, merchant_id: &str, customer_id: &str) -> LoyaltyResult<Customer> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customer
                     WHERE merchant_id = ?1 AND customer_id = ?2"
                ),
                params![merchant_id, customer_id],
                map_customer_row,
            )
            .optional()?
            .ok_or_else(|| LoyaltyError::NotFound {
                entity: "customer",
                id:     customer_id.to_string(),
            })
    }

    pub fn customer_by_code(&self, merchant_id: &str, code: &str) -> LoyaltyResult<Option<Customer>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customer
                     WHERE merchant_id = ?1 AND code = ?2"
                ),
                params![merchant_id, code],
                map_customer_row,
            )
            .optional()?)
    }

    /// All of a merchant's customers, newest first.
    pub fn customers_for_merchant(&self, merchant_id: &str) -> LoyaltyResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE merchant_id = ?1
             ORDER BY created_at DESC, customer_id ASC"
        ))?;
        let rows = stmt.query_map(params![merchant_id], map_customer_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_customer_status(
        &self,
        merchant_id: &str,
        customer_id: &str,
        status: CustomerStatus,
    ) -> LoyaltyResult<()> {
        let updated = self.conn.execute(
            "UPDATE customer SET status = ?1 WHERE merchant_id = ?2 AND customer_id = ?3",
            params![status.as_str(), merchant_id, customer_id],
        )?;
        if updated == 0 {
            return Err(LoyaltyError::NotFound {
                entity: "customer",
                id:     customer_id.to_string(),
            });
        }
        Ok(())
    }
}

fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        customer_id: row.get(0)?,
        merchant_id: row.get(1)?,
        code:        row.get(2)?,
        first_name:  row.get(3)?,
        last_name:   row.get(4)?,
        email:       row.get(5)?,
        phone:       row.get(6)?,
        status:      enum_col(row, 7)?,
        created_at:  timestamp_col(row, 8)?,
    })
}
