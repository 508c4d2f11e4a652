//! Webhook endpoint
//!
//! Accepts a push delivery on any path, authenticates it and dispatches the
//! matching hook command. Once the signature and payload check out the
//! response is always `200 hook processed`: whether a command was found or
//! started is only visible in the log.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::{
    services::{hook::SIGNATURE_HEADER, payload::extract_push_event},
    utils::{AppError, AppResult},
    AppState,
};

pub const PROCESSED: &str = "hook processed";

pub async fn handle_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<(StatusCode, &'static str)> {
    // Oversized bodies fail here, before any JSON parsing
    let data = to_bytes(body, state.config.server.max_body_bytes)
        .await
        .map_err(|e| AppError::bad_request(format!("error reading body: {}", e)))?;

    if data.is_empty() {
        return Err(AppError::MissingBody);
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|v| v.to_str().unwrap_or_default());
    state.hooks.authenticate(&data, signature)?;

    let event = extract_push_event(&data)?;

    tracing::info!(
        repository = %event.repository,
        git_ref = %event.git_ref,
        "Received push webhook"
    );

    state.hooks.dispatch(&event, data).await;

    Ok((StatusCode::OK, PROCESSED))
}
