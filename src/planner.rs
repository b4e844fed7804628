//! Turns provider output into a validated slide plan.
//!
//! One provider call, then at most one lenient repair of the text and at
//! most one corrective re-prompt. Nothing is retried beyond that.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::metrics::CORRECTIVE_PROMPTS;
use crate::models::{MAX_SLIDES, SlidePlan, SlidePlanEntry};
use crate::prompt::corrective_prompt;
use crate::providers::TextGenerator;

const UNUSABLE_PLAN: &str =
    "The model did not return a usable slide plan. Please try again, or try another model.";

/// Why a provider answer could not be read as a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    NotJson,
    NoSlideArray,
}

/// How a plan was recovered from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    Repaired,
}

/// Asks `provider` for a plan and validates it.
#[instrument(skip(provider, prompt), fields(provider = provider.provider_name(), prompt_len = prompt.len()))]
pub async fn plan_slides(
    provider: &dyn TextGenerator,
    prompt: &str,
    model: Option<&str>,
    include_notes: bool,
) -> Result<SlidePlan> {
    let raw = provider.generate(prompt, model).await?;

    let entries = match parse_plan(&raw) {
        Ok((entries, mode)) => {
            debug!(?mode, "plan parsed");
            entries
        }
        Err(failure) => {
            warn!(?failure, response_len = raw.len(), "plan unreadable, sending corrective prompt");
            CORRECTIVE_PROMPTS.inc();
            let retry = provider
                .generate(&corrective_prompt(prompt, &raw), model)
                .await?;
            match parse_plan(&retry) {
                Ok((entries, mode)) => {
                    debug!(?mode, "plan parsed after corrective prompt");
                    entries
                }
                Err(failure) => {
                    warn!(?failure, "corrective prompt did not yield a plan");
                    return Err(AppError::PlanGeneration(UNUSABLE_PLAN.into()));
                }
            }
        }
    };

    let plan = validate_entries(entries, include_notes);
    if plan.slides.is_empty() {
        return Err(AppError::PlanGeneration(
            "No slides returned by provider.".into(),
        ));
    }
    info!(slides = plan.slides.len(), dropped = plan.dropped, "slide plan ready");
    Ok(plan)
}

/// Strict parse first, then one lenient repair.
pub fn parse_plan(raw: &str) -> std::result::Result<(Vec<Value>, ParseMode), ParseFailure> {
    match parse_strict(raw.trim()) {
        Ok(entries) => return Ok((entries, ParseMode::Strict)),
        Err(failure) => debug!(?failure, "strict parse failed, attempting repair"),
    }
    let mut failure = ParseFailure::NotJson;
    for candidate in repair_candidates(raw) {
        match parse_strict(candidate) {
            Ok(entries) => return Ok((entries, ParseMode::Repaired)),
            // JSON without slides says more than no JSON at all
            Err(ParseFailure::NoSlideArray) => failure = ParseFailure::NoSlideArray,
            Err(ParseFailure::NotJson) => {}
        }
    }
    Err(failure)
}

fn parse_strict(text: &str) -> std::result::Result<Vec<Value>, ParseFailure> {
    let value: Value = serde_json::from_str(text).map_err(|_| ParseFailure::NotJson)?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("slides") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ParseFailure::NoSlideArray),
        },
        _ => Err(ParseFailure::NoSlideArray),
    }
}

/// Cuts possible JSON payloads out of surrounding prose or code fences.
///
/// Both the outermost `{...}` and the outermost `[...]` region are offered,
/// whichever opens first leading, so a stray bracket in leading prose does
/// not hide the plan. Empty when no bracketed region exists.
pub fn repair_candidates(raw: &str) -> Vec<&str> {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (```json) up to the first newline
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    let array_first = s
        .find(['[', '{'])
        .is_some_and(|start| s[start..].starts_with('['));
    let regions = if array_first {
        [region(s, '[', ']'), region(s, '{', '}')]
    } else {
        [region(s, '{', '}'), region(s, '[', ']')]
    };
    regions.into_iter().flatten().collect()
}

// From the first `open` to the last `close`
fn region(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

/// Keeps well-formed entries, counting the rest, and caps the plan length.
pub fn validate_entries(raw: Vec<Value>, include_notes: bool) -> SlidePlan {
    let total = raw.len();
    let mut slides: Vec<SlidePlanEntry> = raw
        .into_iter()
        .filter_map(|value| to_entry(value, include_notes))
        .collect();
    let dropped = total - slides.len();
    if dropped > 0 {
        warn!(dropped, "discarded malformed slide entries");
    }
    if slides.len() > MAX_SLIDES {
        info!(planned = slides.len(), kept = MAX_SLIDES, "truncating slide plan");
        slides.truncate(MAX_SLIDES);
    }
    SlidePlan { slides, dropped }
}

fn to_entry(value: Value, include_notes: bool) -> Option<SlidePlanEntry> {
    let Value::Object(map) = value else {
        return None;
    };

    let title = map.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let bullets = match map.get("bullets") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => {
            vec![single.trim().to_string()]
        }
        _ => Vec::new(),
    };

    let layout = ["layout", "layout_hint"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string);

    let notes = if include_notes {
        map.get("notes")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Some(SlidePlanEntry {
        title: title.to_string(),
        bullets,
        layout,
        notes,
    })
}
