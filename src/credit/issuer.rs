//! Records purchased credit grants.
//!
//! Payment confirmation happens upstream; by the time `grant` is called the
//! funds are assumed settled.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, warn};

use super::catalog::SkuCatalog;
use crate::clock::Clock;
use crate::ledger::{CreditGrant, LedgerStore};
use crate::observability::{MeterMetrics, MeterSpan};
use crate::types::{AccountId, Channel, GrantId, Seconds, Tier};
use crate::{Error, Result};

pub const DEFAULT_GRANT_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantOutcome {
    pub grant_id: GrantId,
    pub seconds_granted: Seconds,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CreditIssuer {
    ledger: Arc<dyn LedgerStore>,
    catalog: Arc<SkuCatalog>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MeterMetrics>,
    validity: Duration,
}

impl CreditIssuer {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        catalog: Arc<SkuCatalog>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MeterMetrics>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            clock,
            metrics,
            validity: Duration::days(DEFAULT_GRANT_VALIDITY_DAYS),
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn catalog(&self) -> &SkuCatalog {
        &self.catalog
    }

    pub async fn grant(
        &self,
        account_id: &AccountId,
        sku: &str,
        channel: Channel,
    ) -> Result<GrantOutcome> {
        let span = MeterSpan::grant(account_id, sku);
        let result = self
            .issue(account_id, sku, channel)
            .instrument(span.span().clone())
            .await;
        span.finish(&self.metrics);
        result
    }

    async fn issue(
        &self,
        account_id: &AccountId,
        sku: &str,
        channel: Channel,
    ) -> Result<GrantOutcome> {
        let Some(entry) = self.catalog.get(sku) else {
            self.metrics.unknown_sku.inc();
            warn!(account_id = %account_id, sku, "Grant rejected: unknown SKU");
            return Err(Error::UnknownSku {
                sku: sku.to_string(),
            });
        };

        if let Some(implied) = entry.channel.filter(|implied| *implied != channel) {
            warn!(
                account_id = %account_id,
                sku,
                requested = %channel,
                implied = %implied,
                "Grant channel differs from the channel implied by the SKU"
            );
        }

        let now = self.clock.now();
        self.ledger
            .ensure_account(account_id, Tier::Trial, now)
            .await?;

        let grant = CreditGrant::new(
            account_id.clone(),
            channel,
            entry.sku.clone(),
            entry.seconds,
            now,
            self.validity,
        );
        self.ledger.insert_grant(&grant).await?;

        self.metrics.grants_issued.inc();
        self.metrics.seconds_granted.add(grant.seconds_remaining);
        info!(
            account_id = %account_id,
            grant_id = %grant.grant_id,
            sku,
            channel = %channel,
            seconds = grant.seconds_remaining,
            expires_at = %grant.expires_at,
            "Credit granted"
        );

        Ok(GrantOutcome {
            grant_id: grant.grant_id,
            seconds_granted: grant.seconds_remaining,
            expires_at: grant.expires_at,
        })
    }
}

impl std::fmt::Debug for CreditIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditIssuer")
            .field("ledger", &self.ledger.name())
            .field("catalog_size", &self.catalog.len())
            .field("validity", &self.validity)
            .finish()
    }
}
