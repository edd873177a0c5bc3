//! HTTP API over [`MeterEngine`].
//!
//! Endpoints:
//! - POST /session/start - open a metered session
//! - POST /session/tick - accrue active time and re-check budgets
//! - POST /session/stop - mark a session stopped
//! - GET /session/:id - session record and phase
//! - POST /credit/grant - record purchased credit
//! - GET /credit/catalog - purchasable SKUs
//! - GET /usage/summary - remaining budgets for an account
//! - GET /health - liveness plus a metrics snapshot

mod error;
mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::{GrantBody, HealthResponse, StartBody, StopBody, SummaryQuery, TickBody};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::engine::MeterEngine;

pub struct AppState {
    pub engine: MeterEngine,
}

impl AppState {
    pub fn new(engine: MeterEngine) -> Self {
        Self { engine }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/session/start", post(routes::start_session))
        .route("/session/tick", post(routes::tick_session))
        .route("/session/stop", post(routes::stop_session))
        .route("/session/:session_id", get(routes::session_status))
        .route("/credit/grant", post(routes::grant_credit))
        .route("/credit/catalog", get(routes::list_catalog))
        .route("/usage/summary", get(routes::usage_summary))
        .with_state(state)
}
