//! Error taxonomy for the generation pipeline.
//!
//! Every message here can reach an end user, so none of them carries the API
//! key, raw provider payloads or internal detail.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Result type for request-level operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Request-level failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad user input; no provider call was made
    #[error("{0}")]
    InputValidation(String),

    /// Provider failed or its output could not be turned into a plan
    #[error("{0}")]
    PlanGeneration(String),

    /// Upload is not a usable presentation package
    #[error("{0}")]
    TemplateRead(String),

    /// Writing the output package failed
    #[error("{0}")]
    Render(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InputValidation(_) => StatusCode::BAD_REQUEST,
            AppError::PlanGeneration(_) => StatusCode::BAD_GATEWAY,
            AppError::TemplateRead(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InputValidation(_) => "input_validation",
            AppError::PlanGeneration(_) => "plan_generation",
            AppError::TemplateRead(_) => "template_read",
            AppError::Render(_) => "render",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Failure at the provider boundary.
///
/// The pipeline treats every variant the same way; the split exists so the
/// user gets a useful hint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("the provider rejected the API key")]
    Auth,

    #[error("the provider is rate limiting requests, try again shortly")]
    RateLimited,

    #[error("could not reach the provider ({0})")]
    Transport(String),

    #[error("the provider returned HTTP {0}")]
    Status(u16),

    #[error("the provider response had no text content")]
    MalformedResponse,
}

impl ProviderError {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ProviderError::Auth,
            429 => ProviderError::RateLimited,
            other => ProviderError::Status(other),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors may embed the request URL; keep the category only
        let what = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_decode() {
            "unreadable response"
        } else {
            "request failed"
        };
        ProviderError::Transport(what.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::PlanGeneration(format!("LLM provider error: {err}."))
    }
}

/// Failure while reading or writing the OOXML package.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<quick_xml::Error> for PackageError {
    fn from(err: quick_xml::Error) -> Self {
        PackageError::Xml(err.to_string())
    }
}

impl From<std::str::Utf8Error> for PackageError {
    fn from(err: std::str::Utf8Error) -> Self {
        PackageError::Xml(err.to_string())
    }
}

impl From<std::fmt::Error> for PackageError {
    fn from(err: std::fmt::Error) -> Self {
        PackageError::Xml(err.to_string())
    }
}
