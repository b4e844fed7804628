use axum::extract::{Multipart, State};
use axum::http::{HeaderName, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::form::read_fields;
use crate::error::Result;
use crate::metrics::{FAILURES_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL, SLIDES_RENDERED};
use crate::pipeline::generate_deck;
use crate::providers::build_provider;
use crate::state::AppState;

const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const RENDER_NOTICES: HeaderName = HeaderName::from_static("x-render-notices");

// post handler: form in, .pptx out
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let result = generate(&state, multipart).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    if let Err(err) = &result {
        FAILURES_TOTAL.inc();
        warn!(kind = err.kind(), error = %err, "generation failed");
    }
    result
}

async fn generate(state: &AppState, multipart: Multipart) -> Result<Response> {
    let request = read_fields(multipart, state.max_upload_bytes)
        .await?
        .validate(state.max_upload_bytes, true)?;
    info!(
        provider = %request.provider,
        model = ?request.model,
        include_notes = request.include_notes,
        text_chars = request.text.chars().count(),
        "generation requested"
    );

    let provider = build_provider(request.provider, &request.api_key, state.client.clone());
    let deck = generate_deck(request, provider.as_ref(), state.image_policy).await?;

    SLIDES_RENDERED.inc_by(deck.slide_count as f64);
    for notice in &deck.notices {
        debug!(%notice, "render notice");
    }

    let filename = output_filename(Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, PPTX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (RENDER_NOTICES, deck.notices.len().to_string()),
        ],
        deck.bytes,
    )
        .into_response())
}

/// `text-to-pptx-YYYYMMDD-HHMMSS.pptx`, in UTC.
pub fn output_filename(now: DateTime<Utc>) -> String {
    format!("text-to-pptx-{}.pptx", now.format("%Y%m%d-%H%M%S"))
}
