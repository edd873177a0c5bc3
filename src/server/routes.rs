use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::credit::{GrantOutcome, SkuEntry};
use crate::engine::UsageSummary;
use crate::ledger::UsageSession;
use crate::observability::MetricsSummary;
use crate::session::{SessionStatus, StartOutcome, StartRequest, TickOutcome, TickRequest};
use crate::types::{AccountId, Channel, Mode, SessionId, Tier};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    pub account_id: String,
    pub tier: Tier,
    pub mode: Mode,
    #[serde(default)]
    pub uses_audio_channel: bool,
}

/// Ids are taken as strings so a malformed id reads as an unknown session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickBody {
    pub session_id: String,
    pub delta_seconds: i64,
    pub is_active: bool,
    pub tier: Tier,
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBody {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBody {
    pub account_id: String,
    pub sku: String,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub account_id: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger: String,
    pub metrics: MetricsSummary,
}

fn account_id(raw: &str) -> Result<AccountId, ApiError> {
    AccountId::parse(raw).ok_or_else(|| ApiError::invalid("accountId must not be blank"))
}

fn session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).ok_or_else(|| ApiError::UnknownSession(raw.to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid(rejection.body_text()))
}

pub(super) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ledger: state.engine.ledger_name().to_string(),
        metrics: state.engine.metrics().snapshot(),
    })
}

pub(super) async fn start_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartBody>, JsonRejection>,
) -> ApiResult<StartOutcome> {
    let request = body(payload)?;
    let account_id = account_id(&request.account_id)?;
    let outcome = state
        .engine
        .start(StartRequest::new(
            account_id,
            request.tier,
            request.mode,
            request.uses_audio_channel,
        ))
        .await?;
    Ok(Json(outcome))
}

pub(super) async fn tick_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TickBody>, JsonRejection>,
) -> ApiResult<TickOutcome> {
    let request = body(payload)?;
    let tick = TickRequest::new(
        session_id(&request.session_id)?,
        request.delta_seconds,
        request.is_active,
        request.tier,
        request.mode,
    );
    Ok(Json(state.engine.tick(tick).await?))
}

pub(super) async fn stop_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StopBody>, JsonRejection>,
) -> ApiResult<UsageSession> {
    let request = body(payload)?;
    let session_id = session_id(&request.session_id)?;
    Ok(Json(state.engine.stop(&session_id).await?))
}

pub(super) async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> ApiResult<SessionStatus> {
    let session_id = session_id(&raw)?;
    Ok(Json(state.engine.status(&session_id).await?))
}

pub(super) async fn grant_credit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GrantBody>, JsonRejection>,
) -> ApiResult<GrantOutcome> {
    let request = body(payload)?;
    let account_id = account_id(&request.account_id)?;
    let outcome = state
        .engine
        .grant(&account_id, &request.sku, request.channel)
        .await?;
    Ok(Json(outcome))
}

pub(super) async fn list_catalog(State(state): State<Arc<AppState>>) -> Json<Vec<SkuEntry>> {
    Json(state.engine.catalog().entries().cloned().collect())
}

pub(super) async fn usage_summary(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> ApiResult<UsageSummary> {
    let Query(query) = query.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
    let account_id = account_id(&query.account_id)?;
    Ok(Json(state.engine.summary(&account_id, query.tier).await?))
}
