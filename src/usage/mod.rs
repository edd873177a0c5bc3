//! Rolling-window consumption and live purchased balances.
//!
//! Nothing here is cached: the window slides with the clock, so every query
//! re-reads the ledger and re-applies the window and expiry rules.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::entitlement::EntitlementPolicy;
use crate::ledger::{LedgerResult, LedgerStore};
use crate::types::{AccountId, Channel, Seconds, Tier};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Purchased seconds per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedBalances {
    pub text: Seconds,
    pub tts: Seconds,
}

impl PurchasedBalances {
    pub fn get(&self, channel: Channel) -> Seconds {
        match channel {
            Channel::Text => self.text,
            Channel::Tts => self.tts,
        }
    }
}

#[derive(Clone)]
pub struct UsageAggregator {
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<EntitlementPolicy>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl UsageAggregator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        policy: Arc<EntitlementPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            policy,
            clock,
            window: Duration::days(DEFAULT_WINDOW_DAYS),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Seconds consumed by sessions started inside the trailing window.
    pub async fn consumed_in_window(&self, account_id: &AccountId) -> LedgerResult<Seconds> {
        self.consumed_at(account_id, self.clock.now()).await
    }

    pub async fn consumed_at(
        &self,
        account_id: &AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Seconds> {
        let since = now - self.window;
        let sessions = self.ledger.sessions_started_since(account_id, since).await?;
        Ok(sessions
            .iter()
            .filter(|s| s.started_within(since, now))
            .fold(0, |acc: Seconds, s| acc.saturating_add(s.active_seconds)))
    }

    pub async fn purchased_balance(
        &self,
        account_id: &AccountId,
        channel: Channel,
    ) -> LedgerResult<Seconds> {
        self.purchased_at(account_id, channel, self.clock.now())
            .await
    }

    pub async fn purchased_at(
        &self,
        account_id: &AccountId,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> LedgerResult<Seconds> {
        let grants = self.ledger.active_grants(account_id, channel, now).await?;
        Ok(grants
            .iter()
            .filter(|g| g.account_id == *account_id && g.channel == channel)
            .fold(0, |acc: Seconds, g| acc.saturating_add(g.usable_seconds(now))))
    }

    pub async fn balances(&self, account_id: &AccountId) -> LedgerResult<PurchasedBalances> {
        self.balances_at(account_id, self.clock.now()).await
    }

    pub async fn balances_at(
        &self,
        account_id: &AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<PurchasedBalances> {
        Ok(PurchasedBalances {
            text: self.purchased_at(account_id, Channel::Text, now).await?,
            tts: self.purchased_at(account_id, Channel::Tts, now).await?,
        })
    }

    /// `max(0, pool(tier) - consumed)`.
    pub async fn included_remaining(
        &self,
        account_id: &AccountId,
        tier: Tier,
    ) -> LedgerResult<Seconds> {
        self.included_at(account_id, tier, self.clock.now()).await
    }

    pub async fn included_at(
        &self,
        account_id: &AccountId,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> LedgerResult<Seconds> {
        let consumed = self.consumed_at(account_id, now).await?;
        Ok(self.policy.monthly_pool(tier).saturating_sub(consumed))
    }
}

impl std::fmt::Debug for UsageAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAggregator")
            .field("ledger", &self.ledger.name())
            .field("window", &self.window)
            .finish()
    }
}
