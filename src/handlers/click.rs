use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::context_store::CallbackStage;
use crate::models::event::EventKind;
use crate::profiler::ProfileEvent;
use crate::utils::split_tracker_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    pub param: String,
    pub final_url: Option<String>,
}

/// `GET /click` — 302s to `final_url` when present, otherwise acks with
/// 200; either way the click is resolved and emitted in the background
/// (§4.5, §4.9).
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<ClickQuery>,
) -> impl IntoResponse {
    state.profiler.record(ProfileEvent::Click);

    let redirect = query
        .final_url
        .filter(|url| !url.is_empty())
        .map(|url| found_redirect(&url));

    let Some((request_id, index)) = split_tracker_id(&query.param) else {
        tracing::warn!("malformed click param: {}", query.param);
        return redirect.unwrap_or_else(|| super::ack().into_response());
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let ctx = match state.context_store.load(&request_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("click context lookup failed for {request_id}: {e}");
                return;
            }
        };
        let Some(creative) = ctx.creatives.get(index) else {
            tracing::warn!("click index {index} out of range for {request_id}");
            return;
        };

        let record = match state.cache.fetch_one(creative.ad_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("click record lookup failed for ad {}: {e}", creative.ad_id);
                return;
            }
        };

        if let Err(e) = state
            .context_store
            .extend(&request_id, CallbackStage::Click)
            .await
        {
            tracing::warn!("click context extend failed: {e}");
        }
        state.events.emit_event(&ctx, &record, EventKind::Click, 0.0);
    });

    redirect.unwrap_or_else(|| super::ack().into_response())
}

/// A plain 302, since `axum::response::Redirect` only offers 303/307/308
/// and the original advertiser-facing click redirect is a 302.
fn found_redirect(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}
