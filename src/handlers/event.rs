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
pub struct ConversionQuery {
    pub param: String,
    #[serde(default)]
    pub price: f64,
}

/// `GET /event` — the conversion (postback) callback; same async
/// resolve-and-emit shape as impression/click, carrying the advertiser's
/// reported price (§4.6, §4.9).
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<ConversionQuery>,
) -> impl IntoResponse {
    state.profiler.record(ProfileEvent::Conversion);

    let Some((request_id, index)) = split_tracker_id(&query.param) else {
        tracing::warn!("malformed conversion param: {}", query.param);
        return super::ack();
    };

    let price = query.price;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let ctx = match state.context_store.load(&request_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("conversion context lookup failed for {request_id}: {e}");
                return;
            }
        };
        let Some(creative) = ctx.creatives.get(index) else {
            tracing::warn!("conversion index {index} out of range for {request_id}");
            return;
        };

        let record = match state.cache.fetch_one(creative.ad_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("conversion record lookup failed for ad {}: {e}", creative.ad_id);
                return;
            }
        };

        if let Err(e) = state
            .context_store
            .extend(&request_id, CallbackStage::Conversion)
            .await
        {
            tracing::warn!("conversion context extend failed: {e}");
        }
        state
            .events
            .emit_event(&ctx, &record, EventKind::Conversion, price);
    });

    super::ack()
}
