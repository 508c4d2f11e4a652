//! API routes and handlers

use axum::Router;

use crate::AppState;

mod hook;

pub use hook::{handle_hook, PROCESSED};

/// Webhook routes: every path and method lands on the hook endpoint
pub fn routes() -> Router<AppState> {
    Router::new().fallback(hook::handle_hook)
}
