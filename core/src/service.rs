//! Merchant-facing operations.
//!
//! Every call takes the caller's `MerchantSession`; the service keeps no
//! notion of a "current" merchant. Validation happens before any write, so
//! a rejected transaction leaves nothing behind.

use crate::{
    accrual::{self, PointsAdjustment},
    analytics::{self, MerchantAnalytics, TimeRange},
    codes::{self, CodeGenerator},
    config::LoyaltyConfig,
    directory::{self, DirectoryPage, DirectoryQuery},
    error::{LoyaltyError, LoyaltyResult},
    insight::{self, CustomerActivity, CustomerInsight},
    model::*,
    store::{AccrualOutcome, LoyaltyStore},
    types::{CustomerId, Timestamp},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CURRENCY: &str = "SGD";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name:  String,
    #[serde(default)]
    pub email:      Option<String>,
    #[serde(default)]
    pub phone:      Option<String>,
    /// Generated when absent.
    #[serde(default)]
    pub code:       Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTransaction {
    pub customer_id:      CustomerId,
    pub amount:           Decimal,
    pub payment_method:   PaymentMethod,
    #[serde(default)]
    pub notes:            Option<String>,
    #[serde(default)]
    pub currency:         Option<String>,
    /// Recorded as completed unless the caller holds it pending.
    #[serde(default)]
    pub pending:          bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub accrual:     AccrualOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub customer: Customer,
    pub account:  LoyaltyAccount,
}

pub struct LoyaltyService {
    store:  LoyaltyStore,
    config: LoyaltyConfig,
    codes:  CodeGenerator,
}

impl LoyaltyService {
    pub fn new(store: LoyaltyStore, config: LoyaltyConfig, seed: u64) -> Self {
        Self {
            store,
            config,
            codes: CodeGenerator::new(seed),
        }
    }

    /// In-memory store with migrations applied and default config.
    pub fn build_test(seed: u64) -> LoyaltyResult<Self> {
        let store = LoyaltyStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, LoyaltyConfig::default(), seed))
    }

    pub fn store(&self) -> &LoyaltyStore {
        &self.store
    }

    // ── Merchant and program ──────────────────────────────────────

    /// Create a merchant together with its starting points program.
    pub fn register_merchant(
        &mut self,
        business_name: &str,
        merchant_code: &str,
        now: Timestamp,
    ) -> LoyaltyResult<MerchantSession> {
        if business_name.trim().is_empty() || merchant_code.trim().is_empty() {
            return Err(LoyaltyError::validation("business name and merchant code are required"));
        }
        let merchant = Merchant {
            merchant_id:   self.codes.entity_id(),
            business_name: business_name.trim().to_string(),
            merchant_code: merchant_code.trim().to_string(),
            created_at:    now,
        };
        self.store.insert_merchant(&merchant)?;
        self.store
            .upsert_program(&LoyaltyProgram::default_for(merchant.merchant_id.clone()))?;
        log::info!("registered merchant {} ({})", merchant.merchant_id, merchant.business_name);
        Ok(MerchantSession::new(merchant.merchant_id, "owner"))
    }

    pub fn configure_program(
        &self,
        session: &MerchantSession,
        program_name: &str,
        program_type: ProgramType,
        rate_per_currency_unit: Decimal,
        minimum_redemption_points: i64,
    ) -> LoyaltyResult<LoyaltyProgram> {
        let program = LoyaltyProgram {
            merchant_id: session.merchant_id.clone(),
            program_name: program_name.trim().to_string(),
            program_type,
            rate_per_currency_unit,
            minimum_redemption_points,
        };
        self.store.upsert_program(&program)?;
        log::info!(
            "merchant {} program set to {program_type} by {}",
            session.merchant_id,
            session.staff_user
        );
        Ok(program)
    }

    /// The merchant's program. Missing is a configuration error: accrual is
    /// never priced against an assumed default.
    pub fn program(&self, session: &MerchantSession) -> LoyaltyResult<LoyaltyProgram> {
        self.store.program(&session.merchant_id)?.ok_or_else(|| {
            LoyaltyError::configuration(format!(
                "merchant {} has no loyalty program",
                session.merchant_id
            ))
        })
    }

    // ── Customers ─────────────────────────────────────────────────

    pub fn register_customer(
        &mut self,
        session: &MerchantSession,
        new: NewCustomer,
        now: Timestamp,
    ) -> LoyaltyResult<Customer> {
        if new.first_name.trim().is_empty() {
            return Err(LoyaltyError::validation("first name is required"));
        }
        let code = match new.code.as_deref() {
            Some(raw) => codes::validate_customer_code(raw)?.to_string(),
            None => self.codes.customer_code(),
        };
        let customer = Customer {
            customer_id: self.codes.entity_id(),
            merchant_id: session.merchant_id.clone(),
            code,
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: new.email,
            phone: new.phone,
            status: CustomerStatus::Active,
            created_at: now,
        };
        self.store.insert_customer(&customer)?;
        log::info!("merchant {} enrolled customer {}", session.merchant_id, customer.code);
        Ok(customer)
    }

    /// Resolve a scanned customer code.
    pub fn scan_customer(&self, session: &MerchantSession, raw_code: &str) -> LoyaltyResult<ScanResult> {
        let code = codes::validate_customer_code(raw_code)?;
        let customer = self
            .store
            .customer_by_code(&session.merchant_id, code)?
            .ok_or_else(|| LoyaltyError::NotFound {
                entity: "customer code",
                id:     code.to_string(),
            })?;
        if customer.status == CustomerStatus::Blocked {
            log::warn!("scan of blocked customer {} at {}", customer.code, session.merchant_id);
            return Err(LoyaltyError::validation(format!("customer {} is blocked", customer.code)));
        }
        let account = self.store.account(&customer.customer_id, &session.merchant_id)?;
        Ok(ScanResult { customer, account })
    }

    pub fn set_customer_status(
        &self,
        session: &MerchantSession,
        customer_id: &str,
        status: CustomerStatus,
    ) -> LoyaltyResult<()> {
        self.store
            .set_customer_status(&session.merchant_id, customer_id, status)
    }

    // ── Transactions and accrual ──────────────────────────────────

    pub fn record_transaction(
        &mut self,
        session: &MerchantSession,
        new: NewTransaction,
        now: Timestamp,
    ) -> LoyaltyResult<RecordedTransaction> {
        accrual::validate_amount(new.amount)?;
        let program = self.program(session)?;
        let customer = self.store.customer(&session.merchant_id, &new.customer_id)?;
        if customer.status == CustomerStatus::Blocked {
            return Err(LoyaltyError::validation(format!("customer {} is blocked", customer.code)));
        }

        let status = if new.pending {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Completed
        };
        let points = accrual::points_earned(new.amount, program.program_type)?;
        let transaction = Transaction {
            transaction_id:   self.codes.entity_id(),
            transaction_code: self.codes.transaction_code(now),
            customer_id:      customer.customer_id,
            merchant_id:      session.merchant_id.clone(),
            amount:           new.amount,
            currency:         new.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            transaction_type: TransactionType::Purchase,
            payment_method:   new.payment_method,
            notes:            new.notes,
            status,
            created_at:       now,
        };
        let accrual = self.store.record_transaction(
            &transaction,
            points,
            accrual::accrual_description(program.program_type),
        )?;
        log::info!(
            "{} recorded {} {} for customer {} ({} points)",
            session.staff_user,
            transaction.amount,
            transaction.currency,
            transaction.customer_id,
            accrual.points_earned
        );
        Ok(RecordedTransaction { transaction, accrual })
    }

    /// Complete a pending transaction and credit it exactly once.
    pub fn complete_transaction(
        &self,
        session: &MerchantSession,
        transaction_id: &str,
        now: Timestamp,
    ) -> LoyaltyResult<AccrualOutcome> {
        let program = self.program(session)?;
        let pending = self.store.transaction(&session.merchant_id, transaction_id)?;
        if pending.status == TransactionStatus::Pending {
            let customer = self.store.customer(&session.merchant_id, &pending.customer_id)?;
            if customer.status == CustomerStatus::Blocked {
                log::warn!(
                    "completion of {transaction_id} refused, customer {} is blocked",
                    customer.code
                );
                return Err(LoyaltyError::validation(format!(
                    "customer {} is blocked",
                    customer.code
                )));
            }
        }
        self.store
            .complete_transaction(&session.merchant_id, transaction_id, now, |t| {
                let points = accrual::points_earned(t.amount, program.program_type)?;
                Ok((points, accrual::accrual_description(program.program_type).to_string()))
            })
    }

    pub fn close_transaction(
        &self,
        session: &MerchantSession,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> LoyaltyResult<()> {
        self.store
            .close_transaction(&session.merchant_id, transaction_id, status)
    }

    // ── Points ────────────────────────────────────────────────────

    pub fn adjust_points(
        &self,
        session: &MerchantSession,
        customer_id: &str,
        adjustment: &PointsAdjustment,
        now: Timestamp,
    ) -> LoyaltyResult<LoyaltyAccount> {
        let policy = self.config.negative_balance;
        let description = format!("{} ({})", adjustment.description(), session.staff_user);
        let account = self.store.apply_points_change(
            customer_id,
            &session.merchant_id,
            LedgerKind::Adjusted,
            &description,
            now,
            |account| accrual::apply_adjustment(account, adjustment, policy),
        )?;
        log::info!(
            "{} adjusted customer {customer_id} by {} to {}",
            session.staff_user,
            adjustment.delta(),
            account.current_points
        );
        Ok(account)
    }

    pub fn redeem_points(
        &self,
        session: &MerchantSession,
        customer_id: &str,
        points: i64,
        now: Timestamp,
    ) -> LoyaltyResult<LoyaltyAccount> {
        let program = self.program(session)?;
        self.store.apply_points_change(
            customer_id,
            &session.merchant_id,
            LedgerKind::Redeemed,
            &format!("Redeemed {points} points"),
            now,
            |account| accrual::check_redemption(account, &program, points),
        )
    }

    pub fn points_history(
        &self,
        session: &MerchantSession,
        customer_id: &str,
        limit: usize,
    ) -> LoyaltyResult<Vec<PointsLedgerEntry>> {
        self.store.ledger_for(customer_id, &session.merchant_id, limit)
    }

    // ── Insights and analytics ────────────────────────────────────

    /// Fresh insights for every customer of the merchant.
    pub fn customer_insights(
        &self,
        session: &MerchantSession,
        now: Timestamp,
    ) -> LoyaltyResult<Vec<CustomerInsight>> {
        let merchant_id = &session.merchant_id;
        let balances = self.store.balances_for_merchant(merchant_id)?;
        let activities = self
            .store
            .customers_for_merchant(merchant_id)?
            .into_iter()
            .map(|customer| {
                let transactions = self
                    .store
                    .completed_transactions_for(&customer.customer_id, merchant_id)?;
                Ok(CustomerActivity {
                    loyalty_points: balances.get(&customer.customer_id).copied().unwrap_or(0),
                    customer,
                    transactions,
                })
            })
            .collect::<LoyaltyResult<Vec<_>>>()?;
        insight::derive_insights(&activities, now, &self.config)
    }

    pub fn customer_directory(
        &self,
        session: &MerchantSession,
        query: &DirectoryQuery,
        now: Timestamp,
    ) -> LoyaltyResult<DirectoryPage> {
        let insights = self.customer_insights(session, now)?;
        directory::query_directory(&insights, query, &self.config.directory)
    }

    pub fn analytics(
        &self,
        session: &MerchantSession,
        range: TimeRange,
        now: Timestamp,
    ) -> LoyaltyResult<Option<MerchantAnalytics>> {
        let merchant_id = &session.merchant_id;
        let transactions = self.store.transactions_for_merchant(merchant_id)?;
        let names: HashMap<CustomerId, String> = self
            .store
            .customers_for_merchant(merchant_id)?
            .into_iter()
            .map(|c| (c.customer_id.clone(), c.full_name()))
            .collect();
        analytics::merchant_analytics(&transactions, &names, range, now)
    }
}
