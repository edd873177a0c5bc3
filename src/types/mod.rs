//! Core domain types shared by every metering component.

mod ids;
mod tier;

pub use ids::{AccountId, GrantId, SessionId};
pub use tier::{Channel, Mode, Tier};

/// Whole seconds of session time.
pub type Seconds = u64;
