//! Rows of the three ledger tables.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Channel, GrantId, Mode, Seconds, SessionId, Tier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: AccountId,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(account_id: AccountId, tier: Tier, at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            tier,
            created_at: at,
            updated_at: at,
        }
    }
}

/// One bounded period of interactive usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSession {
    pub session_id: SessionId,
    pub account_id: AccountId,
    /// Tier reported when the session started.
    pub tier: Tier,
    /// Mode reported when the session started.
    pub mode: Mode,
    pub uses_audio_channel: bool,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub active_seconds: Seconds,
}

impl UsageSession {
    pub fn new(
        account_id: AccountId,
        tier: Tier,
        mode: Mode,
        uses_audio_channel: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            account_id,
            tier,
            mode,
            uses_audio_channel,
            started_at,
            stopped_at: None,
            active_seconds: 0,
        }
    }

    pub fn channel(&self) -> Channel {
        Channel::for_session(self.uses_audio_channel)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    pub fn remaining(&self, cap: Seconds) -> Seconds {
        cap.saturating_sub(self.active_seconds)
    }

    /// Inclusive on both ends.
    pub fn started_within(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.started_at >= since && self.started_at <= until
    }

    /// Counter value after accruing `seconds` under `ceiling`.
    ///
    /// Never lower than the current value, even when the ceiling has dropped
    /// below it.
    pub fn accrued_value(&self, seconds: Seconds, ceiling: Seconds) -> Seconds {
        self.active_seconds
            .max(self.active_seconds.saturating_add(seconds).min(ceiling))
    }
}

/// A purchased allotment of extra seconds on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditGrant {
    pub grant_id: GrantId,
    pub account_id: AccountId,
    pub channel: Channel,
    pub seconds_remaining: Seconds,
    pub sku: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CreditGrant {
    pub fn new(
        account_id: AccountId,
        channel: Channel,
        sku: impl Into<String>,
        seconds: Seconds,
        created_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            grant_id: GrantId::new(),
            account_id,
            channel,
            seconds_remaining: seconds,
            sku: sku.into(),
            created_at,
            expires_at: created_at + validity,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn usable_seconds(&self, now: DateTime<Utc>) -> Seconds {
        if self.is_expired(now) {
            0
        } else {
            self.seconds_remaining
        }
    }
}
