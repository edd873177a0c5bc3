//! Session start/tick orchestration.
//!
//! Every gate is evaluated against state read at the start of the call;
//! nothing is cached between calls.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{Instrument, debug, info, warn};

use super::types::{
    SessionPhase, SessionStatus, StartOutcome, StartRequest, TickOutcome, TickRequest,
};
use crate::clock::Clock;
use crate::entitlement::EntitlementPolicy;
use crate::ledger::{LedgerStore, UsageSession};
use crate::observability::{MeterMetrics, MeterSpan};
use crate::types::{AccountId, SessionId, Tier};
use crate::usage::{PurchasedBalances, UsageAggregator};
use crate::{Error, Result};

#[derive(Clone)]
pub struct SessionController {
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<EntitlementPolicy>,
    usage: UsageAggregator,
    clock: Arc<dyn Clock>,
    metrics: Arc<MeterMetrics>,
}

impl SessionController {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        policy: Arc<EntitlementPolicy>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MeterMetrics>,
    ) -> Self {
        let usage = UsageAggregator::new(ledger.clone(), policy.clone(), clock.clone());
        Self {
            ledger,
            policy,
            usage,
            clock,
            metrics,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.usage = self.usage.with_window(window);
        self
    }

    pub fn usage(&self) -> &UsageAggregator {
        &self.usage
    }

    pub fn policy(&self) -> &EntitlementPolicy {
        &self.policy
    }

    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome> {
        let span = MeterSpan::start(&request.account_id, request.tier, request.mode);
        let result = self
            .open(request, &span)
            .instrument(span.span().clone())
            .await;
        span.finish(&self.metrics);
        result
    }

    async fn open(&self, request: StartRequest, span: &MeterSpan) -> Result<StartOutcome> {
        let StartRequest {
            account_id,
            tier,
            mode,
            uses_audio_channel,
        } = request;
        let now = self.clock.now();

        self.ledger.upsert_account(&account_id, tier, now).await?;

        if !self.policy.is_entitled(tier, mode) {
            self.metrics.not_entitled.inc();
            warn!(account_id = %account_id, tier = %tier, mode = %mode, "Session refused: not entitled");
            return Err(Error::NotEntitled { tier, mode });
        }
        let cap = self.policy.session_cap(tier, mode);

        let session = UsageSession::new(account_id, tier, mode, uses_audio_channel, now);
        self.ledger.insert_session(&session).await?;
        span.record_session(&session.session_id);
        self.metrics.sessions_started.inc();
        self.metrics.open_sessions.inc();

        let (included, balances) = self.budgets(&session.account_id, tier, now).await?;

        info!(
            session_id = %session.session_id,
            account_id = %session.account_id,
            tier = %tier,
            mode = %mode,
            channel = %session.channel(),
            cap_seconds = cap,
            included_remaining = included,
            "Session started"
        );

        Ok(StartOutcome {
            session_id: session.session_id,
            cap_seconds: cap,
            included_remaining_30d: included,
            purchased_text_seconds: balances.text,
            purchased_tts_seconds: balances.tts,
        })
    }

    pub async fn tick(&self, request: TickRequest) -> Result<TickOutcome> {
        let span = MeterSpan::tick(
            &request.session_id,
            request.delta_seconds,
            request.is_active,
        );
        let result = self
            .advance(request, &span)
            .instrument(span.span().clone())
            .await;
        span.finish(&self.metrics);
        result
    }

    async fn advance(&self, request: TickRequest, span: &MeterSpan) -> Result<TickOutcome> {
        let now = self.clock.now();
        let session = self.require(&request.session_id).await?;
        self.metrics.ticks_total.inc();

        let cap = self.policy.session_cap(request.tier, request.mode);
        if session.remaining(cap) == 0 {
            self.metrics.session_cap_reached.inc();
            warn!(
                session_id = %session.session_id,
                account_id = %session.account_id,
                cap_seconds = cap,
                active_seconds = session.active_seconds,
                "Tick refused: session cap reached"
            );
            return Err(Error::SessionCapReached {
                session_id: session.session_id,
                cap_seconds: cap,
            });
        }

        let channel = session.channel();
        let included = self
            .usage
            .included_at(&session.account_id, request.tier, now)
            .await?;
        if included == 0
            && self
                .usage
                .purchased_at(&session.account_id, channel, now)
                .await?
                == 0
        {
            self.metrics.balance_exhausted.inc();
            warn!(
                session_id = %session.session_id,
                account_id = %session.account_id,
                channel = %channel,
                "Tick refused: included and purchased balances exhausted"
            );
            return Err(Error::BalanceExhausted {
                account_id: session.account_id,
                channel,
            });
        }

        let seconds = request.accruable_seconds();
        let session = if seconds > 0 && !session.is_stopped() {
            let before = session.active_seconds;
            let updated = self.require_accrual(&session.session_id, seconds, cap).await?;
            let accrued = updated.active_seconds.saturating_sub(before).min(seconds);
            self.metrics.seconds_accrued.add(accrued);
            debug!(
                session_id = %updated.session_id,
                accrued,
                active_seconds = updated.active_seconds,
                cap_seconds = cap,
                "Accrued"
            );
            updated
        } else {
            session
        };

        let remaining = session.remaining(cap);
        span.record_remaining(remaining);
        let (included, balances) = self
            .budgets(&session.account_id, request.tier, now)
            .await?;

        Ok(TickOutcome {
            remaining_session_seconds: remaining,
            included_remaining_30d: included,
            purchased_text_seconds: balances.text,
            purchased_tts_seconds: balances.tts,
        })
    }

    /// Mark the session stopped. Later stops return the record unchanged.
    pub async fn stop(&self, session_id: &SessionId) -> Result<UsageSession> {
        let session = self.require(session_id).await?;
        if session.is_stopped() {
            return Ok(session);
        }

        let stopped = self
            .ledger
            .stop_session(session_id, self.clock.now())
            .await?
            .ok_or_else(|| self.not_found(session_id))?;
        self.metrics.sessions_stopped.inc();
        self.metrics.open_sessions.dec();
        info!(
            session_id = %stopped.session_id,
            account_id = %stopped.account_id,
            active_seconds = stopped.active_seconds,
            "Session stopped"
        );
        Ok(stopped)
    }

    /// Read-only view using the tier and mode recorded at start.
    pub async fn status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        let now = self.clock.now();
        let session = self.require(session_id).await?;
        let cap = self.policy.session_cap(session.tier, session.mode);
        let (included, balances) = self
            .budgets(&session.account_id, session.tier, now)
            .await?;

        Ok(SessionStatus {
            phase: SessionPhase::derive(&session, cap, included, &balances),
            cap_seconds: cap,
            remaining_session_seconds: session.remaining(cap),
            included_remaining_30d: included,
            purchased_text_seconds: balances.text,
            purchased_tts_seconds: balances.tts,
            session,
        })
    }

    async fn budgets(
        &self,
        account_id: &AccountId,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<(u64, PurchasedBalances)> {
        let included = self.usage.included_at(account_id, tier, now).await?;
        let balances = self.usage.balances_at(account_id, now).await?;
        Ok((included, balances))
    }

    async fn require(&self, session_id: &SessionId) -> Result<UsageSession> {
        self.ledger
            .load_session(session_id)
            .await?
            .ok_or_else(|| self.not_found(session_id))
    }

    async fn require_accrual(
        &self,
        session_id: &SessionId,
        seconds: u64,
        cap: u64,
    ) -> Result<UsageSession> {
        self.ledger
            .accrue(session_id, seconds.min(cap), cap)
            .await?
            .ok_or_else(|| self.not_found(session_id))
    }

    fn not_found(&self, session_id: &SessionId) -> Error {
        self.metrics.session_not_found.inc();
        debug!(session_id = %session_id, "Session not found");
        Error::NotFound {
            session_id: *session_id,
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("ledger", &self.ledger.name())
            .field("window", &self.usage.window())
            .finish()
    }
}
