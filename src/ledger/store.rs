//! Ledger storage backends.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::LedgerResult;
use super::memory::MemoryLedger;
use super::records::{Account, CreditGrant, UsageSession};
use crate::types::{AccountId, Channel, Seconds, SessionId, Tier};

/// Storage backend for the metering ledger.
///
/// `accrue` is the only mutation of a session's counter and must be a single
/// atomic read-modify-write so concurrent ticks never lose an increment.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or overwrite the account's tier (last writer wins).
    async fn upsert_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account>;

    /// Create the account with `tier` if absent; an existing row is left untouched.
    async fn ensure_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account>;

    async fn load_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>>;

    async fn insert_session(&self, session: &UsageSession) -> LedgerResult<()>;

    async fn load_session(&self, id: &SessionId) -> LedgerResult<Option<UsageSession>>;

    /// Add `seconds` to the session's counter without exceeding `ceiling` and
    /// without ever lowering it. Returns `None` for an unknown session.
    async fn accrue(
        &self,
        id: &SessionId,
        seconds: Seconds,
        ceiling: Seconds,
    ) -> LedgerResult<Option<UsageSession>>;

    /// Set `stopped_at` if not already set.
    async fn stop_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<UsageSession>>;

    /// Sessions of `account_id` whose `started_at` is at or after `since`.
    async fn sessions_started_since(
        &self,
        account_id: &AccountId,
        since: DateTime<Utc>,
    ) -> LedgerResult<Vec<UsageSession>>;

    async fn insert_grant(&self, grant: &CreditGrant) -> LedgerResult<()>;

    /// Grants for the pair that have not expired at `at`.
    async fn active_grants(
        &self,
        account_id: &AccountId,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<CreditGrant>>;
}

pub struct LedgerFactory;

impl LedgerFactory {
    pub fn memory() -> Arc<dyn LedgerStore> {
        Arc::new(MemoryLedger::new())
    }

    #[cfg(feature = "postgres")]
    pub async fn postgres(database_url: &str) -> LedgerResult<Arc<dyn LedgerStore>> {
        use super::StorageResultExt;

        let ledger = super::postgres::PostgresLedger::connect(database_url)
            .await
            .storage_err_ctx("connect")?;
        ledger.migrate().await.storage_err_ctx("migrate")?;
        Ok(Arc::new(ledger))
    }
}
