use axum::{
    extract::{Path, Query as QueryParams, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::admin::AdminState;
use crate::cache::CacheStats;
use crate::monitor::{Alert, HistoryEntry, MonitorError, WatchOptions, WatchedEntity};
use crate::portfolio::{PortfolioSummary, WalletRecord};
use crate::types::{Network, Query, QueryResult};

/// Errors surfaced by admin handlers.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

impl From<MonitorError> for AdminError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::UnknownEntity(_) | MonitorError::UnknownAlert(_) => AdminError::NotFound(e.to_string()),
            MonitorError::UnknownNetwork(_) | MonitorError::InvalidOptions(_) => {
                AdminError::BadRequest(e.to_string())
            }
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AdminResult<T> = Result<T, AdminError>;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub queue_depth: usize,
    pub in_flight: usize,
    pub watched: usize,
    pub networks: Vec<Network>,
}

#[derive(Serialize)]
pub struct Cleared {
    pub cleared: usize,
}

#[derive(Deserialize)]
pub struct WatchRequest {
    pub network: String,
    pub address: String,
    #[serde(flatten)]
    pub options: WatchOptions,
}

#[derive(Deserialize)]
pub struct AlertsParams {
    #[serde(default)]
    pub unread: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let engine = &state.engine;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        queue_depth: engine.queue_depth(),
        in_flight: engine.in_flight(),
        watched: engine.list_watched().len(),
        networks: engine.networks(),
    })
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(state.engine.get_cache_stats())
}

pub async fn clear_cache(State(state): State<AdminState>) -> Json<Cleared> {
    let cleared = state.engine.get_cache_stats().total;
    state.engine.clear_cache();
    Json(Cleared { cleared })
}

pub async fn clear_queue(State(state): State<AdminState>) -> Json<Cleared> {
    Json(Cleared { cleared: state.engine.clear_queue() })
}

pub async fn query_one(
    State(state): State<AdminState>,
    Path((network, address)): Path<(String, String)>,
) -> Json<QueryResult> {
    Json(state.engine.query(network, address).await)
}

pub async fn query_many(
    State(state): State<AdminState>,
    Json(queries): Json<Vec<Query>>,
) -> Json<Vec<QueryResult>> {
    Json(state.engine.query_many(queries).await)
}

pub async fn summarize_portfolio(
    State(state): State<AdminState>,
    Json(wallets): Json<Vec<WalletRecord>>,
) -> Json<PortfolioSummary> {
    Json(state.engine.summarize_portfolio(&wallets).await)
}

pub async fn list_watched(State(state): State<AdminState>) -> Json<Vec<WatchedEntity>> {
    Json(state.engine.list_watched())
}

pub async fn watch(
    State(state): State<AdminState>,
    Json(req): Json<WatchRequest>,
) -> AdminResult<(StatusCode, Json<WatchedEntity>)> {
    let entity = state.engine.watch(req.network, req.address, req.options)?;
    Ok((StatusCode::CREATED, Json(entity)))
}

pub async fn unwatch(State(state): State<AdminState>, Path(id): Path<Uuid>) -> AdminResult<StatusCode> {
    if state.engine.unwatch(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(MonitorError::UnknownEntity(id).into())
    }
}

pub async fn get_history(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> AdminResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.engine.get_history(id)?))
}

pub async fn export_history_csv(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> AdminResult<impl IntoResponse> {
    let csv = state.engine.export_history_csv(id)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

pub async fn get_alerts(
    State(state): State<AdminState>,
    QueryParams(params): QueryParams<AlertsParams>,
) -> Json<Vec<Alert>> {
    Json(state.engine.get_alerts(params.unread))
}

pub async fn acknowledge_alert(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> AdminResult<StatusCode> {
    state.engine.acknowledge_alert(id)?;
    Ok(StatusCode::NO_CONTENT)
}
