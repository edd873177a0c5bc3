//! PostgreSQL ledger backend.
//!
//! Enable with the `postgres` feature flag.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::records::{Account, CreditGrant, UsageSession};
use super::store::LedgerStore;
use super::{LedgerError, LedgerResult, StorageResultExt};
use crate::types::{AccountId, Channel, GrantId, Mode, Seconds, SessionId, Tier};

#[derive(Clone, Debug)]
pub struct PostgresLedgerConfig {
    pub table_prefix: String,
}

impl Default for PostgresLedgerConfig {
    fn default() -> Self {
        Self {
            table_prefix: "meter_".to_string(),
        }
    }
}

impl PostgresLedgerConfig {
    pub fn prefix(mut self, prefix: impl Into<String>) -> LedgerResult<Self> {
        let prefix = prefix.into();
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LedgerError::Storage {
                message: format!(
                    "Invalid table prefix '{}': only ASCII alphanumeric and underscore allowed",
                    prefix
                ),
            });
        }
        self.table_prefix = prefix;
        Ok(self)
    }

    fn accounts(&self) -> String {
        format!("{}accounts", self.table_prefix)
    }

    fn sessions(&self) -> String {
        format!("{}sessions", self.table_prefix)
    }

    fn grants(&self) -> String {
        format!("{}credit_grants", self.table_prefix)
    }
}

pub struct PostgresLedger {
    pool: Arc<PgPool>,
    config: PostgresLedgerConfig,
}

impl PostgresLedger {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::with_pool(Arc::new(pool)))
    }

    pub fn with_pool(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            config: PostgresLedgerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PostgresLedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        let accounts = self.config.accounts();
        let sessions = self.config.sessions();
        let grants = self.config.grants();

        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {accounts} (
                    account_id VARCHAR(255) PRIMARY KEY,
                    tier VARCHAR(64) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL
                )
                "#
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {sessions} (
                    session_id UUID PRIMARY KEY,
                    account_id VARCHAR(255) NOT NULL REFERENCES {accounts} (account_id),
                    tier VARCHAR(64) NOT NULL,
                    mode VARCHAR(64) NOT NULL,
                    uses_audio_channel BOOLEAN NOT NULL,
                    started_at TIMESTAMPTZ NOT NULL,
                    stopped_at TIMESTAMPTZ,
                    active_seconds BIGINT NOT NULL DEFAULT 0 CHECK (active_seconds >= 0)
                )
                "#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{sessions}_account_started ON {sessions} (account_id, started_at)"
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {grants} (
                    grant_id UUID PRIMARY KEY,
                    account_id VARCHAR(255) NOT NULL REFERENCES {accounts} (account_id),
                    channel VARCHAR(16) NOT NULL,
                    seconds_remaining BIGINT NOT NULL CHECK (seconds_remaining >= 0),
                    sku VARCHAR(128) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    expires_at TIMESTAMPTZ NOT NULL
                )
                "#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{grants}_account_channel ON {grants} (account_id, channel, expires_at)"
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(&*self.pool).await?;
        }
        Ok(())
    }

    fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
        let account_id: String = row.try_get("account_id").storage_err()?;
        let tier: String = row.try_get("tier").storage_err()?;
        Ok(Account {
            account_id: parse_account_id(&account_id)?,
            tier: Tier::from(tier),
            created_at: row.try_get("created_at").storage_err()?,
            updated_at: row.try_get("updated_at").storage_err()?,
        })
    }

    fn session_from_row(row: &PgRow) -> LedgerResult<UsageSession> {
        let session_id: Uuid = row.try_get("session_id").storage_err()?;
        let account_id: String = row.try_get("account_id").storage_err()?;
        let tier: String = row.try_get("tier").storage_err()?;
        let mode: String = row.try_get("mode").storage_err()?;
        let active_seconds: i64 = row.try_get("active_seconds").storage_err()?;
        Ok(UsageSession {
            session_id: SessionId::from(session_id),
            account_id: parse_account_id(&account_id)?,
            tier: Tier::from(tier),
            mode: Mode::from(mode),
            uses_audio_channel: row.try_get("uses_audio_channel").storage_err()?,
            started_at: row.try_get("started_at").storage_err()?,
            stopped_at: row.try_get("stopped_at").storage_err()?,
            active_seconds: to_seconds(active_seconds)?,
        })
    }

    fn grant_from_row(row: &PgRow) -> LedgerResult<CreditGrant> {
        let grant_id: Uuid = row.try_get("grant_id").storage_err()?;
        let account_id: String = row.try_get("account_id").storage_err()?;
        let channel: String = row.try_get("channel").storage_err()?;
        let seconds_remaining: i64 = row.try_get("seconds_remaining").storage_err()?;
        Ok(CreditGrant {
            grant_id: GrantId::from(grant_id),
            account_id: parse_account_id(&account_id)?,
            channel: channel
                .parse::<Channel>()
                .map_err(|message| LedgerError::Corrupt { message })?,
            seconds_remaining: to_seconds(seconds_remaining)?,
            sku: row.try_get("sku").storage_err()?,
            created_at: row.try_get("created_at").storage_err()?,
            expires_at: row.try_get("expires_at").storage_err()?,
        })
    }
}

fn parse_account_id(raw: &str) -> LedgerResult<AccountId> {
    AccountId::parse(raw).ok_or_else(|| LedgerError::Corrupt {
        message: "blank account_id".to_string(),
    })
}

fn to_seconds(value: i64) -> LedgerResult<Seconds> {
    Seconds::try_from(value).map_err(|_| LedgerError::Corrupt {
        message: format!("negative seconds value {}", value),
    })
}

fn to_column(value: Seconds) -> LedgerResult<i64> {
    i64::try_from(value).map_err(|_| LedgerError::Constraint {
        message: format!("seconds value {} out of range", value),
    })
}

/// A single tick never adds more than the ceiling, so `int8` arithmetic in
/// the accrual statement cannot overflow.
fn accrual_step(seconds: Seconds, ceiling: Seconds) -> LedgerResult<i64> {
    to_column(seconds.min(ceiling))
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn upsert_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let query = format!(
            r#"
            INSERT INTO {} (account_id, tier, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (account_id) DO UPDATE SET
                tier = EXCLUDED.tier,
                updated_at = EXCLUDED.updated_at
            RETURNING account_id, tier, created_at, updated_at
            "#,
            self.config.accounts()
        );

        let row = sqlx::query(&query)
            .bind(account_id.as_str())
            .bind(tier.as_str())
            .bind(at)
            .fetch_one(&*self.pool)
            .await
            .storage_err_ctx("upsert account")?;

        Self::account_from_row(&row)
    }

    async fn ensure_account(
        &self,
        account_id: &AccountId,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let query = format!(
            r#"
            INSERT INTO {} (account_id, tier, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (account_id) DO NOTHING
            "#,
            self.config.accounts()
        );

        sqlx::query(&query)
            .bind(account_id.as_str())
            .bind(tier.as_str())
            .bind(at)
            .execute(&*self.pool)
            .await
            .storage_err_ctx("ensure account")?;

        self.load_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::Storage {
                message: format!("account {} vanished after insert", account_id),
            })
    }

    async fn load_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>> {
        let query = format!(
            "SELECT account_id, tier, created_at, updated_at FROM {} WHERE account_id = $1",
            self.config.accounts()
        );

        let row = sqlx::query(&query)
            .bind(account_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .storage_err()?;

        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn insert_session(&self, session: &UsageSession) -> LedgerResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (session_id, account_id, tier, mode, uses_audio_channel,
                            started_at, stopped_at, active_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.config.sessions()
        );

        sqlx::query(&query)
            .bind(session.session_id.as_uuid())
            .bind(session.account_id.as_str())
            .bind(session.tier.as_str())
            .bind(session.mode.as_str())
            .bind(session.uses_audio_channel)
            .bind(session.started_at)
            .bind(session.stopped_at)
            .bind(to_column(session.active_seconds)?)
            .execute(&*self.pool)
            .await
            .storage_err_ctx("insert session")?;

        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> LedgerResult<Option<UsageSession>> {
        let query = format!("SELECT * FROM {} WHERE session_id = $1", self.config.sessions());

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .storage_err()?;

        row.as_ref().map(Self::session_from_row).transpose()
    }

    async fn accrue(
        &self,
        id: &SessionId,
        seconds: Seconds,
        ceiling: Seconds,
    ) -> LedgerResult<Option<UsageSession>> {
        let query = format!(
            r#"
            UPDATE {} SET
                active_seconds = GREATEST(
                    active_seconds,
                    active_seconds + LEAST($2, GREATEST($3 - active_seconds, 0))
                )
            WHERE session_id = $1
            RETURNING *
            "#,
            self.config.sessions()
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(accrual_step(seconds, ceiling)?)
            .bind(to_column(ceiling)?)
            .fetch_optional(&*self.pool)
            .await
            .storage_err_ctx("accrue")?;

        row.as_ref().map(Self::session_from_row).transpose()
    }

    async fn stop_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<UsageSession>> {
        let query = format!(
            r#"
            UPDATE {} SET stopped_at = COALESCE(stopped_at, $2)
            WHERE session_id = $1
            RETURNING *
            "#,
            self.config.sessions()
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .storage_err_ctx("stop session")?;

        row.as_ref().map(Self::session_from_row).transpose()
    }

    async fn sessions_started_since(
        &self,
        account_id: &AccountId,
        since: DateTime<Utc>,
    ) -> LedgerResult<Vec<UsageSession>> {
        let query = format!(
            "SELECT * FROM {} WHERE account_id = $1 AND started_at >= $2",
            self.config.sessions()
        );

        let rows = sqlx::query(&query)
            .bind(account_id.as_str())
            .bind(since)
            .fetch_all(&*self.pool)
            .await
            .storage_err()?;

        rows.iter().map(Self::session_from_row).collect()
    }

    async fn insert_grant(&self, grant: &CreditGrant) -> LedgerResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (grant_id, account_id, channel, seconds_remaining, sku,
                            created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            self.config.grants()
        );

        sqlx::query(&query)
            .bind(grant.grant_id.as_uuid())
            .bind(grant.account_id.as_str())
            .bind(grant.channel.as_str())
            .bind(to_column(grant.seconds_remaining)?)
            .bind(&grant.sku)
            .bind(grant.created_at)
            .bind(grant.expires_at)
            .execute(&*self.pool)
            .await
            .storage_err_ctx("insert grant")?;

        Ok(())
    }

    async fn active_grants(
        &self,
        account_id: &AccountId,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<CreditGrant>> {
        let query = format!(
            "SELECT * FROM {} WHERE account_id = $1 AND channel = $2 AND expires_at > $3",
            self.config.grants()
        );

        let rows = sqlx::query(&query)
            .bind(account_id.as_str())
            .bind(channel.as_str())
            .bind(at)
            .fetch_all(&*self.pool)
            .await
            .storage_err()?;

        rows.iter().map(Self::grant_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_prefix_validation() {
        let config = PostgresLedgerConfig::default().prefix("tenant_a_").unwrap();
        assert_eq!(config.sessions(), "tenant_a_sessions");
        assert_eq!(config.grants(), "tenant_a_credit_grants");

        assert!(PostgresLedgerConfig::default().prefix("bad; DROP").is_err());
    }

    #[test]
    fn test_seconds_column_conversion() {
        assert_eq!(to_column(600).unwrap(), 600);
        assert!(to_column(u64::MAX).is_err());
        assert_eq!(to_seconds(42).unwrap(), 42);
        assert!(matches!(to_seconds(-1), Err(LedgerError::Corrupt { .. })));
    }

    #[test]
    fn test_accrual_step_bounded_by_ceiling() {
        assert_eq!(accrual_step(i64::MAX as u64, 600).unwrap(), 600);
        assert_eq!(accrual_step(u64::MAX, 3600).unwrap(), 3600);
        assert_eq!(accrual_step(45, 600).unwrap(), 45);
        assert_eq!(accrual_step(0, 0).unwrap(), 0);
    }
}
