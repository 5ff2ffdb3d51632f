use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::context_store::CallbackStage;
use crate::models::event::EventKind;
use crate::profiler::ProfileEvent;
use crate::utils::split_tracker_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ImpressionQuery {
    pub param: String,
}

/// `GET /impression` — responds immediately, then resolves the tracker
/// token back to its saved context after a short grace period for the
/// `/request` save to land, increments the frequency counter, extends
/// the context TTL, and emits the impression event (§4.6, §4.9).
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<ImpressionQuery>,
) -> impl IntoResponse {
    state.profiler.record(ProfileEvent::Impression);

    let Some((request_id, index)) = split_tracker_id(&query.param) else {
        tracing::warn!("malformed impression param: {}", query.param);
        return super::ack();
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let ctx = match state.context_store.load(&request_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("impression context lookup failed for {request_id}: {e}");
                return;
            }
        };
        let Some(creative) = ctx.creatives.get(index) else {
            tracing::warn!("impression index {index} out of range for {request_id}");
            return;
        };

        let record = match state.cache.fetch_one(creative.ad_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("impression record lookup failed for ad {}: {e}", creative.ad_id);
                return;
            }
        };

        if let Err(e) = state.frequency.incr(&ctx.cid, record.model_sign1).await {
            tracing::warn!("impression frequency incr failed: {e}");
        }
        if let Err(e) = state
            .context_store
            .extend(&request_id, CallbackStage::Impression)
            .await
        {
            tracing::warn!("impression context extend failed: {e}");
        }
        state
            .events
            .emit_event(&ctx, &record, EventKind::Impression, 0.0);
    });

    super::ack()
}
