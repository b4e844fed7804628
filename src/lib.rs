//! Text to PowerPoint, built from the user's own template.
//!
//! A request carries free-form text, an optional style hint and a template.
//! An LLM provider turns the text into a slide plan, and the plan is rendered
//! into the template's layouts, reusing its pictures.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod prompt;
pub mod providers;
pub mod state;
pub mod template;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;

use crate::handlers::{
    generate_handler, health_handler, metrics_handler, preview_handler, security_headers,
};
use crate::state::AppState;

// Room for the text fields on top of the template
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the router with every route and layer.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes + FORM_OVERHEAD_BYTES;
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/generate", post(generate_handler))
        .route("/preview", post(preview_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::map_response(security_headers))
        .with_state(state)
}
