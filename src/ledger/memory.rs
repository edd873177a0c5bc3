//! In-memory ledger (for testing and single-instance deployments).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::records::{Account, CreditGrant, UsageSession};
use super::store::LedgerStore;
use super::{LedgerError, LedgerResult};
use crate::types::{AccountId, Channel, GrantId, Seconds, SessionId, Tier};

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    accounts: Arc<DashMap<AccountId, Account>>,
    sessions: Arc<DashMap<SessionId, UsageSession>>,
    grants: Arc<DashMap<GrantId, CreditGrant>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    pub fn clear(&self) {
        self.grants.clear();
        self.sessions.clear();
        self.accounts.clear();
    }

    fn require_account(&self, account_id: &AccountId) -> LedgerResult<()> {
        if self.accounts.contains_key(account_id) {
            Ok(())
        } else {
            Err(LedgerError::Constraint {
                message: format!("unknown account {}", account_id),
            })
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let mut entry = self
            .accounts
            .entry(account_id.clone())
            .or_insert_with(|| Account::new(account_id.clone(), tier, at));
        entry.tier = tier;
        entry.updated_at = at;
        Ok(entry.value().clone())
    }

    async fn ensure_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let entry = self
            .accounts
            .entry(account_id.clone())
            .or_insert_with(|| Account::new(account_id.clone(), tier, at));
        Ok(entry.value().clone())
    }

    async fn load_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.accounts.get(account_id).map(|a| a.value().clone()))
    }

    async fn insert_session(&self, session: &UsageSession) -> LedgerResult<()> {
        self.require_account(&session.account_id)?;
        if self.sessions.contains_key(&session.session_id) {
            return Err(LedgerError::Constraint {
                message: format!("duplicate session {}", session.session_id),
            });
        }
        self.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> LedgerResult<Option<UsageSession>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn accrue(
        &self,
        id: &SessionId,
        seconds: Seconds,
        ceiling: Seconds,
    ) -> LedgerResult<Option<UsageSession>> {
        // The shard write lock held by `get_mut` makes this read-modify-write atomic.
        Ok(self.sessions.get_mut(id).map(|mut session| {
            session.active_seconds = session.accrued_value(seconds, ceiling);
            session.value().clone()
        }))
    }

    async fn stop_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<UsageSession>> {
        Ok(self.sessions.get_mut(id).map(|mut session| {
            if session.stopped_at.is_none() {
                session.stopped_at = Some(at);
            }
            session.value().clone()
        }))
    }

    async fn sessions_started_since(
        &self,
        account_id: &AccountId,
        since: DateTime<Utc>,
    ) -> LedgerResult<Vec<UsageSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| &s.account_id == account_id && s.started_at >= since)
            .map(|s| s.value().clone())
            .collect())
    }

    async fn insert_grant(&self, grant: &CreditGrant) -> LedgerResult<()> {
        self.require_account(&grant.account_id)?;
        self.grants.insert(grant.grant_id, grant.clone());
        Ok(())
    }

    async fn active_grants(
        &self,
        account_id: &AccountId,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<CreditGrant>> {
        Ok(self
            .grants
            .iter()
            .filter(|g| &g.account_id == account_id && g.channel == channel && !g.is_expired(at))
            .map(|g| g.value().clone())
            .collect())
    }
}
