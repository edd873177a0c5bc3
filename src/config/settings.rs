//! Typed engine settings read from a [`ConfigProvider`].
//!
//! Every key is optional; missing keys keep the built-in tables.
//!
//! | Key | Type | Default |
//! |---|---|---|
//! | `policy.cap.<mode>` | seconds | 900 / 1800 / 3600 |
//! | `policy.cap_override.<tier>.<mode>` | seconds | `trial.friend = 600` |
//! | `policy.pool.<tier>` | seconds | 600 / 900 / 2700 / 6300 |
//! | `policy.disabled.<mode>` | bool | `false` |
//! | `credit.sku.<sku>` | seconds | built-in catalog |
//! | `usage.window_days` | days | 30 |
//! | `credit.validity_days` | days | 365 |
//! | `server.addr` | socket address | `0.0.0.0:8080` |
//! | `database.url` | string | unset (in-memory ledger) |

use std::net::SocketAddr;

use chrono::Duration;
use tracing::debug;

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigError, ConfigResult, ValidationErrors};
use crate::credit::{DEFAULT_GRANT_VALIDITY_DAYS, SkuCatalog, SkuEntry};
use crate::entitlement::{EntitlementPolicy, EntitlementPolicyBuilder};
use crate::types::{Mode, Seconds, Tier};
use crate::usage::DEFAULT_WINDOW_DAYS;

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

const SKU_PREFIX: &str = "credit.sku.";

#[derive(Debug, Clone)]
pub struct MeterSettings {
    pub policy: EntitlementPolicy,
    pub catalog: SkuCatalog,
    pub window: Duration,
    pub grant_validity: Duration,
    pub server_addr: SocketAddr,
    pub database_url: Option<String>,
}

impl MeterSettings {
    pub async fn load(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        let mut errors = Vec::new();

        let policy = load_policy(provider).await?;
        let catalog = load_catalog(provider).await?;

        let window_days = provider
            .get::<i64>("usage.window_days")
            .await?
            .unwrap_or(DEFAULT_WINDOW_DAYS);
        if window_days <= 0 {
            errors.push(ConfigError::invalid(
                "usage.window_days",
                "must be greater than zero",
            ));
        }

        let validity_days = provider
            .get::<i64>("credit.validity_days")
            .await?
            .unwrap_or(DEFAULT_GRANT_VALIDITY_DAYS);
        if validity_days <= 0 {
            errors.push(ConfigError::invalid(
                "credit.validity_days",
                "must be greater than zero",
            ));
        }

        let raw_addr = provider
            .get_raw("server.addr")
            .await?
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());
        let server_addr = match raw_addr.trim().parse::<SocketAddr>() {
            Ok(addr) => Some(addr),
            Err(e) => {
                errors.push(ConfigError::invalid("server.addr", e.to_string()));
                None
            }
        };

        let database_url = provider
            .get_raw("database.url")
            .await?
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        match server_addr {
            Some(server_addr) if errors.is_empty() => Ok(Self {
                policy,
                catalog,
                window: Duration::days(window_days),
                grant_validity: Duration::days(validity_days),
                server_addr,
                database_url,
            }),
            _ => Err(ConfigError::ValidationErrors(ValidationErrors(errors))),
        }
    }
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            policy: EntitlementPolicy::default(),
            catalog: SkuCatalog::with_defaults(),
            window: Duration::days(DEFAULT_WINDOW_DAYS),
            grant_validity: Duration::days(DEFAULT_GRANT_VALIDITY_DAYS),
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
        }
    }
}

async fn load_policy(provider: &dyn ConfigProvider) -> ConfigResult<EntitlementPolicy> {
    let mut builder = EntitlementPolicyBuilder::new().with_defaults();

    for mode in Mode::ALL {
        if let Some(seconds) = seconds_at(provider, &format!("policy.cap.{mode}")).await? {
            builder = builder.cap(mode, seconds);
        }
    }

    for tier in Tier::ALL {
        for mode in Mode::ALL {
            let key = format!("policy.cap_override.{tier}.{mode}");
            if let Some(seconds) = seconds_at(provider, &key).await? {
                builder = builder.cap_override(tier, mode, seconds);
            }
        }
        if let Some(seconds) = seconds_at(provider, &format!("policy.pool.{tier}")).await? {
            builder = builder.pool(tier, seconds);
        }
    }

    // Disabled modes win over any configured cap.
    for mode in Mode::ALL {
        let key = format!("policy.disabled.{mode}");
        if provider.get::<bool>(&key).await?.unwrap_or(false) {
            debug!(mode = %mode, "Mode disabled by configuration");
            builder = builder.without_mode(mode);
        }
    }

    Ok(builder.build())
}

async fn load_catalog(provider: &dyn ConfigProvider) -> ConfigResult<SkuCatalog> {
    let mut catalog = SkuCatalog::with_defaults();

    let mut keys = provider.list_keys(SKU_PREFIX).await?;
    keys.extend(catalog.entries().map(|e| format!("{SKU_PREFIX}{}", e.sku)));
    keys.sort();
    keys.dedup();

    for key in keys {
        let Some(sku) = key.strip_prefix(SKU_PREFIX).filter(|s| !s.is_empty()) else {
            continue;
        };
        if let Some(seconds) = seconds_at(provider, &key).await? {
            debug!(sku, seconds, "Catalog entry from configuration");
            let entry = match catalog.get(sku) {
                Some(existing) => SkuEntry {
                    seconds,
                    ..existing.clone()
                },
                None => SkuEntry::new(sku, seconds),
            };
            catalog.insert(entry);
        }
    }

    Ok(catalog)
}

async fn seconds_at(provider: &dyn ConfigProvider, key: &str) -> ConfigResult<Option<Seconds>> {
    provider.get::<Seconds>(key).await
}
