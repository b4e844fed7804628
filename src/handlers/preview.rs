use axum::Json;
use axum::extract::{Multipart, State};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::form::read_fields;
use crate::error::Result;
use crate::metrics::{FAILURES_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::PreviewResponse;
use crate::pipeline::preview_plan;
use crate::providers::build_provider;
use crate::state::AppState;

// post handler: form in, slide plan out (no template needed)
pub async fn preview_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let result = preview(&state, multipart).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    if let Err(err) = &result {
        FAILURES_TOTAL.inc();
        warn!(kind = err.kind(), error = %err, "preview failed");
    }
    result
}

async fn preview(state: &AppState, multipart: Multipart) -> Result<Json<PreviewResponse>> {
    let request = read_fields(multipart, state.max_upload_bytes)
        .await?
        .validate(state.max_upload_bytes, false)?;
    info!(provider = %request.provider, model = ?request.model, "preview requested");

    let provider = build_provider(request.provider, &request.api_key, state.client.clone());
    let plan = preview_plan(&request, provider.as_ref()).await?;

    Ok(Json(PreviewResponse {
        ok: true,
        slides: plan.slides,
        dropped: plan.dropped,
    }))
}
