use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::prompt::truncate_chars;

// Hard ceiling on slides in a plan
pub const MAX_SLIDES: usize = 30;

// Longest provider name echoed back in an error
const MAX_PROVIDER_ECHO: usize = 40;

// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    AiPipe,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::AiPipe => "aipipe",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "aipipe" => Ok(ProviderKind::AiPipe),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" | "google-gemini" => Ok(ProviderKind::Gemini),
            other => {
                let shown: String = truncate_chars(other, MAX_PROVIDER_ECHO)
                    .chars()
                    .filter(|c| !c.is_control())
                    .collect();
                Err(AppError::InputValidation(format!(
                    "Unsupported provider: {shown}"
                )))
            }
        }
    }
}

/// Everything one generation request carries.
///
/// Lives only for the duration of the request; the key and text are never
/// logged. `Debug` is implemented by hand so they can't leak through `{:?}`.
#[derive(Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub guidance: Option<String>,
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub api_key: String,
    pub include_notes: bool,
    pub template: Option<TemplateUpload>,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("text_len", &self.text.len())
            .field("has_guidance", &self.guidance.is_some())
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("include_notes", &self.include_notes)
            .field("template", &self.template)
            .finish()
    }
}

// Uploaded template file
#[derive(Clone)]
pub struct TemplateUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for TemplateUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateUpload")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One slide as planned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePlanEntry {
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SlidePlanEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bullets: Vec::new(),
            layout: None,
            notes: None,
        }
    }

    pub fn with_bullets<I, S>(mut self, bullets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bullets = bullets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// Validated plan plus how many raw entries were rejected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlidePlan {
    pub slides: Vec<SlidePlanEntry>,
    pub dropped: usize,
}

// Preview endpoint response
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub ok: bool,
    pub slides: Vec<SlidePlanEntry>,
    pub dropped: usize,
}

// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_are_case_insensitive_with_aliases() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(" Google-Gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("aipipe".parse::<ProviderKind>().unwrap(), ProviderKind::AiPipe);
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn unknown_provider_echo_is_bounded() {
        let long = format!("x{}\u{1b}[31m", "y".repeat(500));
        let err = long.parse::<ProviderKind>().unwrap_err();
        let message = err.to_string();
        assert!(message.len() < 80, "{message}");
        assert!(!message.contains('\u{1b}'));

        let err = "\u{7}beep".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported provider: beep");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let req = GenerationRequest {
            text: "quarterly numbers are confidential".into(),
            guidance: None,
            provider: ProviderKind::Anthropic,
            model: None,
            api_key: "sk-very-secret-key-1234567890".into(),
            include_notes: false,
            template: None,
        };
        let dbg = format!("{req:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(!dbg.contains("confidential"));
        assert!(dbg.contains("<redacted>"));
    }
}
