//! HTTP trigger for operator-initiated replacements.
//!
//! A single route stamps "now" as the force watermark; the admission loop
//! picks the new watermark up on its next tick. The endpoint carries no
//! authentication and is expected to live on a restricted network.

use std::sync::Arc;

use axum::extract::State as HandlerState;
use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::operator::state::{State, StateStore};

/// Port the trigger endpoint listens on.
pub const FORCE_UPDATE_PORT: u16 = 8080;

#[derive(Clone)]
struct ForceContext {
    state: Arc<RwLock<State>>,
    store: StateStore,
}

/// Serves `/forceUpdate` until the process dies.
pub async fn run_force_update_server(state: Arc<RwLock<State>>, store: StateStore) -> Result<()> {
    let context = ForceContext { state, store };
    let app = Router::new()
        .route("/forceUpdate", any(force_update))
        .with_state(context);
    let listener = TcpListener::bind(("0.0.0.0", FORCE_UPDATE_PORT)).await?;
    info!(port = FORCE_UPDATE_PORT, "force update endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn force_update(HandlerState(ctx): HandlerState<ForceContext>) -> (StatusCode, String) {
    let now = Utc::now();
    let snapshot = {
        let mut state = ctx.state.write().await;
        state.last_accepted_creation_time = now;
        *state
    };
    if let Err(e) = ctx.store.save(&snapshot).await {
        warn!(error = %e, "failed to persist force watermark");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error persisting force update watermark: {e}\n"),
        );
    }
    info!(watermark = %now, "forcing replacement of nodes created before watermark");
    (
        StatusCode::OK,
        format!("Forcing update for nodes created before: {now}\n"),
    )
}
