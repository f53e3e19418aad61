//! Tracked agent routes.

use crate::state::AppState;
use agentscope_core::{AgentscopeError, TmuxError};
use agentscope_types::{AgentSnapshot, Vendor};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn error_response(e: AgentscopeError) -> (StatusCode, String) {
    let status = match &e {
        AgentscopeError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AgentscopeError::TmuxError(TmuxError::NotFound(_)) => StatusCode::SERVICE_UNAVAILABLE,
        AgentscopeError::TmuxError(_) => StatusCode::BAD_GATEWAY,
        AgentscopeError::ChannelClosed => StatusCode::SERVICE_UNAVAILABLE,
        AgentscopeError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentListResponse {
    pub agents: Vec<AgentSnapshot>,
    pub waiting_count: usize,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AgentListResponse>, (StatusCode, String)> {
    let agents = state.monitor.snapshot().await.map_err(error_response)?;
    let waiting_count = agents.iter().filter(|a| a.is_waiting).count();
    Ok(Json(AgentListResponse {
        agents,
        waiting_count,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub vendor: Vendor,
    pub project_dir: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub session_id: Uuid,
}

pub async fn launch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LaunchRequest>,
) -> Result<(StatusCode, Json<LaunchResponse>), (StatusCode, String)> {
    if !req.project_dir.is_dir() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} is not a directory", req.project_dir.display()),
        ));
    }
    let session_id = state
        .monitor
        .launch(req.vendor, req.project_dir)
        .await
        .map_err(|e| {
            warn!(target: "agentscope::api", error = %e, "Launch failed");
            error_response(e)
        })?;
    info!(target: "agentscope::api", %session_id, vendor = %req.vendor, "Launched agent");
    Ok((StatusCode::CREATED, Json(LaunchResponse { session_id })))
}

pub async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.monitor.close(id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReattachResponse {
    pub session_id: Uuid,
    /// `None` when no terminal hosting the agent could be found.
    pub terminal: Option<String>,
}

pub async fn reattach(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReattachResponse>, (StatusCode, String)> {
    let terminal = state.monitor.reattach(id).await.map_err(error_response)?;
    Ok(Json(ReattachResponse {
        session_id: id,
        terminal,
    }))
}
