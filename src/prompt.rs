//! Prompt composition for the slide planner.

use crate::error::{AppError, Result};
use crate::models::MAX_SLIDES;

// Longest source text forwarded to a provider, in characters
pub const MAX_SOURCE_CHARS: usize = 15_000;

// Longest guidance line forwarded, in characters
pub const MAX_GUIDANCE_CHARS: usize = 1_000;

// Longest echo of a bad response inside the corrective prompt
const MAX_ECHO_CHARS: usize = 4_000;

const LAYOUT_VOCABULARY: &str =
    "title_and_content|title_only|section_header|two_content|quote|comparison|timeline|process|overview|summary";

/// Builds the single prompt sent to the provider.
///
/// Fails only when `text` is blank.
pub fn compose_prompt(text: &str, guidance: Option<&str>, include_notes: bool) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InputValidation("Input text is required.".into()));
    }

    let guidance = guidance
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(|g| truncate_chars(g, MAX_GUIDANCE_CHARS))
        .unwrap_or("(none)");

    let notes_rule = if include_notes {
        "- Add a \"notes\" field (string) with speaker notes for every slide."
    } else {
        "- Do not include a \"notes\" field."
    };

    let mut prompt = String::with_capacity(text.len().min(MAX_SOURCE_CHARS * 4) + 1024);
    prompt.push_str("You are a slide planner. Convert the provided text into a JSON slide plan.\n");
    prompt.push_str("Follow these rules:\n");
    prompt.push_str("- Respect the GUIDANCE line for tone and structure if provided.\n");
    prompt.push_str(&format!(
        "- Choose a reasonable number of slides (min 4, max {MAX_SLIDES}) based on content. Never return more than {MAX_SLIDES} slides.\n"
    ));
    prompt.push_str("- Each slide must include: \"title\" (string) and \"bullets\" (array of short strings).\n");
    prompt.push_str(&format!(
        "- Optionally add \"layout\" (string), one of: {LAYOUT_VOCABULARY}.\n"
    ));
    prompt.push_str(notes_rule);
    prompt.push('\n');
    prompt.push_str("- Use concise, scannable bullets. Avoid paragraphs.\n");
    prompt.push_str("- Do not include images or graphics; the template's own images are reused.\n");
    prompt.push_str("- Output strictly valid JSON only, no prose, no code fences: either a JSON array of slide objects or an object whose \"slides\" key holds that array.\n\n");
    prompt.push_str("Example:\n");
    prompt.push_str("[{\"title\": \"string\", \"bullets\": [\"string\"], \"layout\": \"title_and_content\"");
    if include_notes {
        prompt.push_str(", \"notes\": \"string\"");
    }
    prompt.push_str("}]\n\n");
    prompt.push_str("GUIDANCE (optional): ");
    prompt.push_str(guidance);
    prompt.push_str("\n\nSOURCE TEXT:\n");
    prompt.push_str(truncate_chars(text, MAX_SOURCE_CHARS));
    prompt.push('\n');

    Ok(prompt)
}

/// Follow-up prompt used once when the first answer was not valid JSON.
pub fn corrective_prompt(original: &str, bad_response: &str) -> String {
    format!(
        "{original}\n\nYour previous answer was not valid JSON:\n{}\n\n\
         Return only valid JSON matching the schema above: a JSON array of objects with \
         \"title\" and \"bullets\". No explanations, no code fences.\n",
        truncate_chars(bad_response, MAX_ECHO_CHARS)
    )
}

// Cuts at a char boundary
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_a_validation_error() {
        let err = compose_prompt("   \n", None, false).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }

    #[test]
    fn prompt_embeds_text_and_guidance_verbatim() {
        let p = compose_prompt("Rust ownership explained.", Some("investor pitch"), false).unwrap();
        assert!(p.contains("SOURCE TEXT:\nRust ownership explained."));
        assert!(p.contains("GUIDANCE (optional): investor pitch"));
        assert!(p.contains("max 30"));
        assert!(p.contains("\"bullets\""));
        assert!(p.contains("Do not include a \"notes\" field"));
    }

    #[test]
    fn missing_guidance_reads_none() {
        let p = compose_prompt("text", Some("  "), true).unwrap();
        assert!(p.contains("GUIDANCE (optional): (none)"));
        assert!(p.contains("speaker notes"));
        assert!(p.contains("\"notes\": \"string\""));
    }

    #[test]
    fn oversized_text_is_capped() {
        let long = "é".repeat(MAX_SOURCE_CHARS + 500);
        let p = compose_prompt(&long, None, false).unwrap();
        let count = p.matches('é').count();
        assert_eq!(count, MAX_SOURCE_CHARS);
    }

    #[test]
    fn corrective_prompt_restates_contract() {
        let p = corrective_prompt("ORIGINAL", "Sure! Here are slides");
        assert!(p.starts_with("ORIGINAL"));
        assert!(p.contains("Sure! Here are slides"));
        assert!(p.contains("Return only valid JSON"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
