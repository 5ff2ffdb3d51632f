pub mod click;
pub mod event;
pub mod impression;
pub mod rank;
pub mod request;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct AckResponse {
    error_code: i32,
    error_message: &'static str,
}

/// Shared success body for the callback handlers: any failure just logs
/// and returns this benign JSON so the ad network on the other end never
/// retries a callback it already "used" (§7 "handlers never crash the
/// process").
pub(crate) fn ack() -> Json<AckResponse> {
    Json(AckResponse {
        error_code: 0,
        error_message: "success",
    })
}
