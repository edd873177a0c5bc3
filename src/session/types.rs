//! Request and outcome shapes for session operations.

use serde::{Deserialize, Serialize};

use crate::ledger::UsageSession;
use crate::types::{AccountId, Mode, Seconds, SessionId, Tier};
use crate::usage::PurchasedBalances;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub account_id: AccountId,
    pub tier: Tier,
    pub mode: Mode,
    pub uses_audio_channel: bool,
}

impl StartRequest {
    pub fn new(account_id: AccountId, tier: Tier, mode: Mode, uses_audio_channel: bool) -> Self {
        Self {
            account_id,
            tier,
            mode,
            uses_audio_channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub session_id: SessionId,
    pub cap_seconds: Seconds,
    pub included_remaining_30d: Seconds,
    pub purchased_text_seconds: Seconds,
    pub purchased_tts_seconds: Seconds,
}

/// One accounting heartbeat.
///
/// `tier` and `mode` are the caller's current claim; the cap is recomputed
/// from them on every tick rather than frozen at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickRequest {
    pub session_id: SessionId,
    /// Negative values accrue nothing.
    pub delta_seconds: i64,
    pub is_active: bool,
    pub tier: Tier,
    pub mode: Mode,
}

impl TickRequest {
    pub fn new(
        session_id: SessionId,
        delta_seconds: i64,
        is_active: bool,
        tier: Tier,
        mode: Mode,
    ) -> Self {
        Self {
            session_id,
            delta_seconds,
            is_active,
            tier,
            mode,
        }
    }

    /// Seconds this tick may add to the counter.
    pub fn accruable_seconds(&self) -> Seconds {
        if self.is_active {
            Seconds::try_from(self.delta_seconds).unwrap_or(0)
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    pub remaining_session_seconds: Seconds,
    pub included_remaining_30d: Seconds,
    pub purchased_text_seconds: Seconds,
    pub purchased_tts_seconds: Seconds,
}

/// Where a session stands against its cap and its account's balances.
///
/// `Capped` and `Exhausted` are reported, never enforced by termination:
/// the next tick is refused instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Created,
    Active,
    Capped,
    Exhausted,
}

impl SessionPhase {
    pub fn derive(
        session: &UsageSession,
        cap: Seconds,
        included: Seconds,
        balances: &PurchasedBalances,
    ) -> Self {
        if session.remaining(cap) == 0 {
            SessionPhase::Capped
        } else if included == 0 && balances.get(session.channel()) == 0 {
            SessionPhase::Exhausted
        } else if session.active_seconds == 0 {
            SessionPhase::Created
        } else {
            SessionPhase::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session: UsageSession,
    pub phase: SessionPhase,
    /// Cap for the tier and mode recorded at start.
    pub cap_seconds: Seconds,
    pub remaining_session_seconds: Seconds,
    pub included_remaining_30d: Seconds,
    pub purchased_text_seconds: Seconds,
    pub purchased_tts_seconds: Seconds,
}
