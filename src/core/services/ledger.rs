use crate::core::db::{CounterStore, StoreError};
use crate::core::services::admission::Tier;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("User not found")]
    UserNotFound,

    #[error("Max time exceeded")]
    PeriodCapPermanentlyExceeded,

    #[error("Ledger store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// How long a usage counter accumulates before a fresh one is started.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    #[default]
    Lifetime,
    Monthly,
}

impl QuotaPeriod {
    pub fn bucket(&self, now: DateTime<Utc>) -> String {
        match self {
            QuotaPeriod::Lifetime => "lifetime".to_string(),
            QuotaPeriod::Monthly => now.format("%Y-%m").to_string(),
        }
    }
}

/// Per-user consumed seconds, one counter per tier per period.
///
/// The ledger never enforces caps. Admission checks happen before a request
/// is decoded and the increment lands afterwards, so two concurrent requests
/// from one user can both pass and push the total past the cap.
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn CounterStore>,
    period: QuotaPeriod,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn CounterStore>, period: QuotaPeriod) -> Self {
        Self { store, period }
    }

    fn usage_key(&self, user_id: u64, tier: Tier, now: DateTime<Utc>) -> String {
        format!("quota:{}:{}:{}", tier, self.period.bucket(now), user_id)
    }

    fn blocked_key(user_id: u64) -> String {
        format!("quota:blocked:{}", user_id)
    }

    /// Consumed seconds for the current period.
    ///
    /// `UserNotFound` means no record exists yet; callers initialize and
    /// carry on with zero.
    pub async fn get_consumed(&self, user_id: u64, tier: Tier) -> Result<i64, LedgerError> {
        if self.store.exists(&Self::blocked_key(user_id)).await? {
            return Err(LedgerError::PeriodCapPermanentlyExceeded);
        }

        let key = self.usage_key(user_id, tier, Utc::now());
        self.store.get(&key).await?.ok_or(LedgerError::UserNotFound)
    }

    pub async fn initialize_user(&self, user_id: u64, tier: Tier) -> Result<(), LedgerError> {
        let key = self.usage_key(user_id, tier, Utc::now());
        if self.store.create_if_absent(&key).await? {
            debug!("Created {} usage record for user {}", tier, user_id);
        }
        Ok(())
    }

    /// Atomically adds `delta_seconds` and returns the new total.
    pub async fn increment_consumed(
        &self,
        user_id: u64,
        tier: Tier,
        delta_seconds: u32,
    ) -> Result<i64, LedgerError> {
        let key = self.usage_key(user_id, tier, Utc::now());
        Ok(self.store.incr_by(&key, i64::from(delta_seconds)).await?)
    }

    pub async fn block_user(&self, user_id: u64) -> Result<(), LedgerError> {
        self.store.mark(&Self::blocked_key(user_id)).await?;
        Ok(())
    }
}
