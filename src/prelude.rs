//! Prelude module for convenient imports.
//!
//! ```rust
//! use usage_meter::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Engine
pub use crate::{MeterEngine, MeterEngineBuilder, UsageSummary};

// Sessions
pub use crate::session::{
    SessionPhase, SessionStatus, StartOutcome, StartRequest, TickOutcome, TickRequest,
};

// Credit
pub use crate::credit::{GrantOutcome, SkuCatalog};

// Policy and storage
pub use crate::entitlement::EntitlementPolicy;
pub use crate::ledger::{LedgerFactory, LedgerStore};

// Types
pub use crate::types::{AccountId, Channel, Mode, Seconds, SessionId, Tier};

// Time
pub use crate::clock::{Clock, ManualClock, SystemClock};
