//! Admin HTTP API.
//!
//! # Routes
//! ```text
//! GET    /admin/status                      version, queue depth, watch count
//! GET    /admin/cache                       cache stats
//! POST   /admin/cache/clear                 clear the result cache
//! POST   /admin/queue/clear                 cancel queued queries
//! GET    /admin/query/{network}/{address}   run one query
//! POST   /admin/query                       run many queries
//! POST   /admin/portfolio                   summarize wallets
//! GET    /admin/watch                       list watched entities
//! POST   /admin/watch                       start watching
//! DELETE /admin/watch/{id}                  stop watching
//! GET    /admin/watch/{id}/history          balance history
//! GET    /admin/watch/{id}/history.csv      balance history as CSV
//! GET    /admin/alerts?unread=true          alerts
//! POST   /admin/alerts/{id}/ack             acknowledge an alert
//! ```
//! Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::BalanceEngine;
use crate::lifecycle::Shutdown;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin router.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<BalanceEngine>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache))
        .route("/admin/cache/clear", post(clear_cache))
        .route("/admin/queue/clear", post(clear_queue))
        .route("/admin/query", post(query_many))
        .route("/admin/query/{network}/{address}", get(query_one))
        .route("/admin/portfolio", post(summarize_portfolio))
        .route("/admin/watch", get(list_watched).post(watch))
        .route("/admin/watch/{id}", delete(unwatch))
        .route("/admin/watch/{id}/history", get(get_history))
        .route("/admin/watch/{id}/history.csv", get(export_history_csv))
        .route("/admin/alerts", get(get_alerts))
        .route("/admin/alerts/{id}/ack", post(acknowledge_alert))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AdminState, shutdown: Shutdown) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
