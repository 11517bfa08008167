//! Customer-code validation and seeded generation of codes and ids.
//!
//! All generated identifiers come from one PCG stream so a run started
//! with the same seed produces the same codes.

use crate::{
    error::{LoyaltyError, LoyaltyResult},
    types::{EntityId, Timestamp},
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub const MIN_CUSTOMER_CODE_LEN: usize = 3;
pub const MAX_CUSTOMER_CODE_LEN: usize = 50;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Check a scanned customer code and return it trimmed.
pub fn validate_customer_code(raw: &str) -> LoyaltyResult<&str> {
    let code = raw.trim();
    let len = code.chars().count();
    if !(MIN_CUSTOMER_CODE_LEN..=MAX_CUSTOMER_CODE_LEN).contains(&len) {
        return Err(LoyaltyError::validation(format!(
            "customer code must be {MIN_CUSTOMER_CODE_LEN}-{MAX_CUSTOMER_CODE_LEN} characters, got {len}"
        )));
    }
    Ok(code)
}

pub struct CodeGenerator {
    inner: Pcg64Mcg,
}

impl CodeGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// `TXN-<unix millis>-<0..1000>`
    pub fn transaction_code(&mut self, now: Timestamp) -> String {
        format!("TXN-{}-{}", now.timestamp_millis(), self.inner.gen_range(0..1000))
    }

    /// Eight characters from an alphabet without look-alike glyphs.
    pub fn customer_code(&mut self) -> String {
        let suffix: String = (0..8)
            .map(|_| CODE_ALPHABET[self.inner.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        format!("CUST-{suffix}")
    }

    /// A v4-shaped UUID drawn from this stream.
    pub fn entity_id(&mut self) -> EntityId {
        let bytes: [u8; 16] = self.inner.gen();
        uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
    }
}
