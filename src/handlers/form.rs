use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::error::{AppError, Result};
use crate::models::{GenerationRequest, ProviderKind, TemplateUpload};
use crate::pipeline::TEMPLATE_REQUIRED;

// Shortest key any supported provider issues
const API_KEY_MIN_LEN: usize = 20;

const TEMPLATE_EXTENSIONS: &[&str] = &[".pptx", ".potx"];

// Raw form fields, before validation
#[derive(Default)]
pub struct FormFields {
    pub input_text: Option<String>,
    pub guidance: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub include_notes: Option<String>,
    pub template: Option<TemplateUpload>,
}

/// Reads the multipart body into [`FormFields`]. Unknown fields are ignored.
pub async fn read_fields(mut multipart: Multipart, max_upload_bytes: usize) -> Result<FormFields> {
    let mut fields = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, max_upload_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "templateFile" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| multipart_error(err, max_upload_bytes))?;
            // An untouched file input still sends an empty part
            if filename.is_empty() && bytes.is_empty() {
                continue;
            }
            fields.template = Some(TemplateUpload {
                filename,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| multipart_error(err, max_upload_bytes))?;
        match name.as_str() {
            "inputText" => fields.input_text = Some(value),
            "guidance" => fields.guidance = Some(value),
            "provider" => fields.provider = Some(value),
            "model" => fields.model = Some(value),
            "apiKey" => fields.api_key = Some(value),
            "includeNotes" => fields.include_notes = Some(value),
            _ => {}
        }
    }
    Ok(fields)
}

fn multipart_error(err: MultipartError, max_upload_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_upload_bytes)
    } else {
        AppError::InputValidation("The form could not be read.".into())
    }
}

fn too_large(max_upload_bytes: usize) -> AppError {
    AppError::InputValidation(format!(
        "Template file is too large (max {} MB).",
        max_upload_bytes / (1024 * 1024)
    ))
}

impl FormFields {
    /// Checks every field and builds the request. Nothing here touches the network.
    pub fn validate(self, max_upload_bytes: usize, require_template: bool) -> Result<GenerationRequest> {
        let text = self.input_text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::InputValidation("Input text is required.".into()));
        }

        let api_key = self.api_key.unwrap_or_default().trim().to_string();
        check_api_key(&api_key)?;

        let provider = match non_blank(self.provider) {
            Some(name) => name.parse::<ProviderKind>()?,
            None => ProviderKind::OpenAi,
        };

        let template = match self.template {
            Some(upload) => Some(check_template(upload, max_upload_bytes)?),
            None if require_template => {
                return Err(AppError::InputValidation(TEMPLATE_REQUIRED.into()));
            }
            None => None,
        };

        Ok(GenerationRequest {
            text,
            guidance: non_blank(self.guidance),
            provider,
            model: non_blank(self.model),
            api_key,
            include_notes: self.include_notes.as_deref().is_some_and(is_checked),
            template,
        })
    }
}

/// Rejects keys that are obviously not raw API keys.
pub fn check_api_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::InputValidation("API key is required.".into()));
    }
    let looks_wrong = key.chars().count() < API_KEY_MIN_LEN
        || key.chars().any(char::is_whitespace)
        || key.to_ascii_lowercase().starts_with("bearer")
        || key.to_ascii_lowercase().contains("http");
    if looks_wrong {
        return Err(AppError::InputValidation(
            "The API key does not look valid. Paste the raw key without a \"Bearer\" prefix.".into(),
        ));
    }
    Ok(())
}

fn check_template(upload: TemplateUpload, max_upload_bytes: usize) -> Result<TemplateUpload> {
    let lower = upload.filename.to_ascii_lowercase();
    if !TEMPLATE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(AppError::InputValidation(
            "Unsupported file type. Upload a .pptx or .potx template.".into(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::InputValidation("The template file is empty.".into()));
    }
    if upload.bytes.len() > max_upload_bytes {
        return Err(too_large(max_upload_bytes));
    }
    Ok(upload)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}
