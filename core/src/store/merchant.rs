use super::{millis, timestamp_col, LoyaltyStore};
use crate::{
    error::{LoyaltyError, LoyaltyResult},
    model::{LoyaltyProgram, Merchant},
};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

impl LoyaltyStore {
    // ── Merchant ──────────────────────────────────────────────────

    pub fn insert_merchant(&self, m: &Merchant) -> LoyaltyResult<()> {
        self.conn.execute(
            "INSERT INTO merchant (merchant_id, business_name, merchant_code, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![m.merchant_id, m.business_name, m.merchant_code, millis(m.created_at)],
        )?;
        Ok(())
    }

    pub fn merchant(&self, merchant_id: &str) -> LoyaltyResult<Merchant> {
        self.conn
            .query_row(
                "SELECT merchant_id, business_name, merchant_code, created_at
                 FROM merchant WHERE merchant_id = ?1",
                params![merchant_id],
                |row| {
                    Ok(Merchant {
                        merchant_id:   row.get(0)?,
                        business_name: row.get(1)?,
                        merchant_code: row.get(2)?,
                        created_at:    timestamp_col(row, 3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| LoyaltyError::NotFound {
                entity: "merchant",
                id:     merchant_id.to_string(),
            })
    }

    // ── Loyalty program ───────────────────────────────────────────

    /// Insert or replace the merchant's single active program.
    pub fn upsert_program(&self, p: &LoyaltyProgram) -> LoyaltyResult<()> {
        p.validate()?;
        self.conn.execute(
            "INSERT INTO loyalty_program
                (merchant_id, program_name, program_type, rate_per_currency_unit,
                 minimum_redemption_points)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (merchant_id) DO UPDATE SET
                program_name = excluded.program_name,
                program_type = excluded.program_type,
                rate_per_currency_unit = excluded.rate_per_currency_unit,
                minimum_redemption_points = excluded.minimum_redemption_points",
            params![
                p.merchant_id,
                p.program_name.trim(),
                p.program_type.as_str(),
                p.rate_per_currency_unit.to_string(),
                p.minimum_redemption_points,
            ],
        )?;
        Ok(())
    }

    /// The merchant's program. An unrecognised stored program type is a
    /// configuration error, not a storage error.
    pub fn program(&self, merchant_id: &str) -> LoyaltyResult<Option<LoyaltyProgram>> {
        let row = self
            .conn
            .query_row(
                "SELECT program_name, program_type, rate_per_currency_unit,
                        minimum_redemption_points
                 FROM loyalty_program WHERE merchant_id = ?1",
                params![merchant_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((program_name, program_type, rate, minimum_redemption_points)) = row else {
            return Ok(None);
        };
        let rate: Decimal = rate.parse().map_err(|e| {
            LoyaltyError::configuration(format!("bad rate '{rate}' for merchant {merchant_id}: {e}"))
        })?;
        Ok(Some(LoyaltyProgram {
            merchant_id: merchant_id.to_string(),
            program_name,
            program_type: program_type.parse()?,
            rate_per_currency_unit: rate,
            minimum_redemption_points,
        }))
    }
}
