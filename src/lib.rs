//! # usage-meter
//!
//! Usage metering and entitlement engine for time-boxed conversational
//! sessions.
//!
//! The engine answers one question on every tick: is more usage permitted,
//! and how much is left? It tracks three budgets:
//!
//! - a per-session cap derived from `(tier, mode)`,
//! - a rolling 30-day included pool derived from the tier,
//! - purchased top-up credit per channel (`text`, `tts`) with expiry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use usage_meter::{MeterEngine, Mode, StartRequest, Tier, TickRequest};
//! use usage_meter::types::AccountId;
//!
//! # async fn example() -> Result<(), usage_meter::Error> {
//! let engine = MeterEngine::in_memory();
//! let account = AccountId::parse("acct-42").expect("non-empty id");
//!
//! let started = engine
//!     .start(StartRequest::new(account, Tier::Trial, Mode::Friend, false))
//!     .await?;
//!
//! let tick = engine
//!     .tick(TickRequest::new(started.session_id, 15, true, Tier::Trial, Mode::Friend))
//!     .await?;
//! println!("{}s left in this session", tick.remaining_session_seconds);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod clock;
pub mod config;
pub mod credit;
pub mod engine;
pub mod entitlement;
pub mod ledger;
pub mod observability;
pub mod prelude;
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;
pub mod session;
pub mod types;
pub mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CompositeConfigProvider, ConfigBuilder, ConfigError, ConfigProvider, ConfigProviderExt,
    EnvConfigProvider, MemoryConfigProvider, MeterSettings,
};
pub use credit::{CreditIssuer, GrantOutcome, SkuCatalog, SkuEntry};
pub use engine::{MeterEngine, MeterEngineBuilder, UsageSummary};
pub use entitlement::{EntitlementPolicy, EntitlementPolicyBuilder};
#[cfg(feature = "postgres")]
pub use ledger::{PostgresLedger, PostgresLedgerConfig};
pub use ledger::{
    Account, CreditGrant, LedgerError, LedgerFactory, LedgerStore, MemoryLedger, UsageSession,
};
pub use observability::{MeterMetrics, MetricsSummary, TracingConfig};
pub use session::{
    SessionController, SessionPhase, SessionStatus, StartOutcome, StartRequest, TickOutcome,
    TickRequest,
};
pub use types::{AccountId, Channel, GrantId, Mode, Seconds, SessionId, Tier};
pub use usage::{PurchasedBalances, UsageAggregator};

/// Error type for metering operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The (tier, mode) pair maps to a zero session cap.
    #[error("Tier {tier} is not entitled to mode {mode}")]
    NotEntitled { tier: Tier, mode: Mode },

    #[error("Session not found: {session_id}")]
    NotFound { session_id: SessionId },

    /// The session has used its whole cap.
    #[error("Session {session_id} reached its cap of {cap_seconds}s")]
    SessionCapReached {
        session_id: SessionId,
        cap_seconds: Seconds,
    },

    /// Both the included pool and purchased credit for the channel are empty.
    #[error("Account {account_id} has no included or purchased {channel} seconds left")]
    BalanceExhausted {
        account_id: AccountId,
        channel: Channel,
    },

    #[error("Unknown SKU: {sku}")]
    UnknownSku { sku: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Usage denied by caps or balances
    Entitlement,
    /// Caller sent something the engine cannot act on
    Client,
    /// Ledger unavailable or inconsistent; may succeed on retry
    Storage,
    Configuration,
}

impl Error {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotEntitled { .. }
            | Error::SessionCapReached { .. }
            | Error::BalanceExhausted { .. } => ErrorCategory::Entitlement,

            Error::NotFound { .. } | Error::UnknownSku { .. } | Error::InvalidRequest(_) => {
                ErrorCategory::Client
            }

            Error::Ledger(_) => ErrorCategory::Storage,

            Error::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_entitlement_denial(&self) -> bool {
        self.category() == ErrorCategory::Entitlement
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }

    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotEntitled { .. } => "NotEntitled",
            Error::NotFound { .. } => "NotFound",
            Error::SessionCapReached { .. } => "SessionCapReached",
            Error::BalanceExhausted { .. } => "BalanceExhausted",
            Error::UnknownSku { .. } => "UnknownSku",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::Ledger(_) => "Storage",
            Error::Config(_) => "Config",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotEntitled { .. } => 403,
            Error::NotFound { .. } => 404,
            Error::SessionCapReached { .. } | Error::BalanceExhausted { .. } => 402,
            Error::UnknownSku { .. } | Error::InvalidRequest(_) => 400,
            Error::Ledger(_) => 503,
            Error::Config(_) => 500,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
