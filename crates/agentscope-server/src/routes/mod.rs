//! HTTP route handlers.

pub mod agents;

use crate::state::AppState;
use agentscope_core::Focus;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body of `POST /api/focus`. Both fields empty clears focus.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub terminal: Option<String>,
}

impl From<FocusRequest> for Focus {
    fn from(req: FocusRequest) -> Self {
        match (req.session_id, req.terminal) {
            (Some(id), _) => Focus::Session(id),
            (None, Some(name)) => Focus::Terminal(name),
            (None, None) => Focus::None,
        }
    }
}

pub async fn focus(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FocusRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .monitor
        .focus(req.into())
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run the external-session scan immediately.
pub async fn scan(State(state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .monitor
        .scan_now()
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
