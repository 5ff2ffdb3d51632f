use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// `GET /rank` — the current default rank table as `{"pkg:type[:cc]":
/// index}` (§4.1, §4.9).
pub async fn get(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.rank_table.default_as_json())
}

/// `GET /rank/update` — synchronously reloads the rank table and, since
/// it's loaded from disk the same way, the block list (§4.1, §S.1, §4.9).
pub async fn update(State(state): State<AppState>) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = match state.rank_table.reload() {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("rank table reload failed: {e}");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };
    let blocked = match state.blocklist.reload() {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("block list reload failed: {e}");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };
    Ok(Json(
        json!({ "status": "ok", "rank_entries": entries, "blocked_entries": blocked }),
    ))
}
