use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::models::inventory::InventoryRecord;
use crate::models::request::{ParsedRequest, RequestQuery, SelectedCreative};
use crate::profiler::ProfileEvent;
use crate::tracker::build_tracker_urls;
use crate::AppState;

#[derive(Debug, Serialize)]
struct AdItem {
    bundle_id: String,
    click_url: String,
    creative_url: String,
    icon_url: String,
    impression_url: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct RequestResponse {
    ad: Vec<AdItem>,
    error_code: i32,
    error_message: &'static str,
}

fn ad_item(req: &ParsedRequest, record: &InventoryRecord, index: usize, state: &AppState) -> AdItem {
    let urls = build_tracker_urls(
        req,
        record,
        index,
        &state.config.click_address,
        &state.config.callback_address,
    );
    AdItem {
        bundle_id: record.package_name.clone(),
        click_url: urls.click_url,
        creative_url: record.banner_url.clone(),
        icon_url: record.icon_url.clone(),
        impression_url: urls.impression_url,
        title: record.label.clone(),
    }
}

/// `GET /request` — selects up to `limit` creatives for the caller's
/// country, responds synchronously, then asynchronously persists the
/// request context and emits the request event (§4.9).
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<RequestQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request_id = Uuid::new_v4().simple().to_string();
    let country_code = state.geoip.country_code(query.ip.as_deref().unwrap_or(""));
    let mut req = ParsedRequest::from_query(query, request_id, country_code);

    let snapshot = state.cache.snapshot();
    let Some(bucket) = snapshot.get(&req.country_code).cloned() else {
        // Unknown country: §7/§8 S3 — empty body, no context save, no event.
        return Ok(String::new().into_response());
    };
    let frequencies = state.frequency.mget_frequencies(&req.cid, &bucket).await;

    let limit = req.limit.max(0) as usize;
    let selected = state
        .selection
        .select(&mut req, &bucket, &frequencies, &state.blocklist, limit);

    req.creatives = selected
        .iter()
        .map(|r| SelectedCreative {
            ad_id: r.ad_id,
            frequency: r.frequency,
        })
        .collect();

    let ads: Vec<AdItem> = selected
        .iter()
        .enumerate()
        .map(|(index, record)| ad_item(&req, record, index, &state))
        .collect();

    let response = RequestResponse {
        ad: ads,
        error_code: 0,
        error_message: "success",
    };

    state.profiler.record(ProfileEvent::Request);
    state.events.emit_request(&req);

    let context_store = state.context_store.clone();
    let request_timeout = state.config.redis_join_request_timeout;
    let saved = req.clone();
    tokio::spawn(async move {
        if let Err(e) = context_store.save(&saved, request_timeout).await {
            tracing::warn!("failed to save request context: {e}");
        }
    });

    Ok(Json(response).into_response())
}
