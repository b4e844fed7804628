//! One request, end to end: compose, plan, render.

use tokio::task;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{GenerationRequest, SlidePlan};
use crate::planner::plan_slides;
use crate::prompt::compose_prompt;
use crate::providers::TextGenerator;
use crate::template::{ImagePolicy, RenderOptions, RenderedDeck, Template};

pub(crate) const TEMPLATE_REQUIRED: &str = "A template file (.pptx or .potx) is required.";

/// Turns a validated request into a rendered deck.
///
/// The template is opened before the provider is called, so a broken upload
/// never costs a model call.
#[instrument(skip_all, fields(provider = provider.provider_name(), model = ?request.model, include_notes = request.include_notes))]
pub async fn generate_deck(
    request: GenerationRequest,
    provider: &dyn TextGenerator,
    image_policy: ImagePolicy,
) -> Result<RenderedDeck> {
    let GenerationRequest {
        text,
        guidance,
        model,
        include_notes,
        template,
        ..
    } = request;
    let upload = template.ok_or_else(|| AppError::InputValidation(TEMPLATE_REQUIRED.into()))?;

    let prompt = compose_prompt(&text, guidance.as_deref(), include_notes)?;
    let template = run_blocking(move || Template::open(&upload.bytes)).await?;

    let plan = plan_slides(provider, &prompt, model.as_deref(), include_notes).await?;
    if plan.dropped > 0 {
        info!(dropped = plan.dropped, "plan entries without a usable shape were dropped");
    }

    let options = RenderOptions {
        include_notes,
        image_policy,
    };
    run_blocking(move || template.render(&plan.slides, &options)).await
}

/// Composes and plans without rendering.
#[instrument(skip_all, fields(provider = provider.provider_name(), model = ?request.model))]
pub async fn preview_plan(
    request: &GenerationRequest,
    provider: &dyn TextGenerator,
) -> Result<SlidePlan> {
    let prompt = compose_prompt(
        &request.text,
        request.guidance.as_deref(),
        request.include_notes,
    )?;
    plan_slides(
        provider,
        &prompt,
        request.model.as_deref(),
        request.include_notes,
    )
    .await
}

// Package work is CPU bound; keep it off the async workers
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(work).await.map_err(|err| {
        warn!(error = %err, "template task failed");
        AppError::Render("The presentation could not be written.".into())
    })?
}
