//! Metered sessions: start, tick, stop and status.

mod controller;
mod types;

pub use controller::SessionController;
pub use types::{
    SessionPhase, SessionStatus, StartOutcome, StartRequest, TickOutcome, TickRequest,
};
