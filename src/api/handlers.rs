use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::broadcast::hub::BroadcastHub;
use crate::store::InfoRegister;

const DASHBOARD_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
pub struct ApiState {
    pub hub: Arc<BroadcastHub>,
    pub info: InfoRegister,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub rate_history_len: usize,
    pub quote_history_len: usize,
    pub connections: usize,
}

// GET / - dashboard page
async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// POST /api/status - administrative command seam: replace the status text
async fn set_status(
    State(state): State<ApiState>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    let trimmed = request.text.trim();
    if trimmed.is_empty() {
        warn!("Rejected empty status text");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                success: false,
                message: "Status text cannot be empty".to_string(),
            }),
        ));
    }

    state.info.set(normalize_status_text(trimmed));
    info!("Status text updated ({} chars)", trimmed.len());

    Ok(Json(StatusResponse {
        success: true,
        message: "Status text updated".to_string(),
    }))
}

// GET /api/stats - operational visibility
async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        rate_history_len: state.hub.rate_history().len(),
        quote_history_len: state.hub.quote_history().len(),
        connections: state.hub.registry().count(),
    })
}

/// The dashboard renders the status text as HTML: preserve double spaces and
/// line breaks the way the original admin command did.
fn normalize_status_text(text: &str) -> String {
    text.replace("  ", "&nbsp;&nbsp;").replace('\n', "<br>")
}

pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", post(set_status))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_status_text() {
        assert_eq!(
            normalize_status_text("gold  stable\ntoday"),
            "gold&nbsp;&nbsp;stable<br>today"
        );
        assert_eq!(normalize_status_text("plain"), "plain");
    }
}
