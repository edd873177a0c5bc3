//! Engine facade wiring policy, ledger, aggregator, controller and issuer
//! around one clock and one metrics registry.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::MeterSettings;
use crate::credit::{CreditIssuer, DEFAULT_GRANT_VALIDITY_DAYS, GrantOutcome, SkuCatalog};
use crate::entitlement::EntitlementPolicy;
use crate::ledger::{LedgerFactory, LedgerStore, UsageSession};
use crate::observability::MeterMetrics;
use crate::session::{
    SessionController, SessionStatus, StartOutcome, StartRequest, TickOutcome, TickRequest,
};
use crate::types::{AccountId, Channel, Seconds, SessionId, Tier};
use crate::usage::{DEFAULT_WINDOW_DAYS, UsageAggregator};
use crate::Result;

/// Remaining budgets for an account, independent of any session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub included_remaining_30d: Seconds,
    pub purchased_text_seconds: Seconds,
    pub purchased_tts_seconds: Seconds,
}

#[derive(Clone)]
pub struct MeterEngine {
    ledger: Arc<dyn LedgerStore>,
    sessions: SessionController,
    credit: CreditIssuer,
    clock: Arc<dyn Clock>,
    metrics: Arc<MeterMetrics>,
}

impl MeterEngine {
    pub fn builder() -> MeterEngineBuilder {
        MeterEngineBuilder::default()
    }

    /// Default tables over an in-memory ledger and the system clock.
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    pub fn from_settings(settings: MeterSettings, ledger: Arc<dyn LedgerStore>) -> Self {
        Self::builder()
            .ledger(ledger)
            .policy(settings.policy)
            .catalog(settings.catalog)
            .window(settings.window)
            .grant_validity(settings.grant_validity)
            .build()
    }

    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome> {
        self.sessions.start(request).await
    }

    pub async fn tick(&self, request: TickRequest) -> Result<TickOutcome> {
        self.sessions.tick(request).await
    }

    pub async fn stop(&self, session_id: &SessionId) -> Result<UsageSession> {
        self.sessions.stop(session_id).await
    }

    pub async fn status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        self.sessions.status(session_id).await
    }

    pub async fn grant(
        &self,
        account_id: &AccountId,
        sku: &str,
        channel: Channel,
    ) -> Result<GrantOutcome> {
        self.credit.grant(account_id, sku, channel).await
    }

    pub async fn summary(&self, account_id: &AccountId, tier: Tier) -> Result<UsageSummary> {
        let now = self.clock.now();
        let usage = self.usage();
        let included = usage.included_at(account_id, tier, now).await?;
        let balances = usage.balances_at(account_id, now).await?;
        Ok(UsageSummary {
            included_remaining_30d: included,
            purchased_text_seconds: balances.text,
            purchased_tts_seconds: balances.tts,
        })
    }

    pub fn usage(&self) -> &UsageAggregator {
        self.sessions.usage()
    }

    pub fn policy(&self) -> &EntitlementPolicy {
        self.sessions.policy()
    }

    pub fn catalog(&self) -> &SkuCatalog {
        self.credit.catalog()
    }

    pub fn metrics(&self) -> &Arc<MeterMetrics> {
        &self.metrics
    }

    pub fn ledger_name(&self) -> &str {
        self.ledger.name()
    }
}

impl std::fmt::Debug for MeterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterEngine")
            .field("ledger", &self.ledger.name())
            .field("sessions", &self.sessions)
            .field("credit", &self.credit)
            .finish()
    }
}

pub struct MeterEngineBuilder {
    ledger: Option<Arc<dyn LedgerStore>>,
    policy: EntitlementPolicy,
    catalog: SkuCatalog,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<MeterMetrics>>,
    window: Duration,
    grant_validity: Duration,
}

impl Default for MeterEngineBuilder {
    fn default() -> Self {
        Self {
            ledger: None,
            policy: EntitlementPolicy::default(),
            catalog: SkuCatalog::with_defaults(),
            clock: None,
            metrics: None,
            window: Duration::days(DEFAULT_WINDOW_DAYS),
            grant_validity: Duration::days(DEFAULT_GRANT_VALIDITY_DAYS),
        }
    }
}

impl MeterEngineBuilder {
    pub fn ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn policy(mut self, policy: EntitlementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn catalog(mut self, catalog: SkuCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MeterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn grant_validity(mut self, validity: Duration) -> Self {
        self.grant_validity = validity;
        self
    }

    pub fn build(self) -> MeterEngine {
        let ledger = self.ledger.unwrap_or_else(LedgerFactory::memory);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let metrics = self.metrics.unwrap_or_default();
        let policy = Arc::new(self.policy);

        let sessions =
            SessionController::new(ledger.clone(), policy, clock.clone(), metrics.clone())
                .with_window(self.window);
        let credit = CreditIssuer::new(
            ledger.clone(),
            Arc::new(self.catalog),
            clock.clone(),
            metrics.clone(),
        )
        .with_validity(self.grant_validity);

        MeterEngine {
            ledger,
            sessions,
            credit,
            clock,
            metrics,
        }
    }
}
