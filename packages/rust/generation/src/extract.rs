//! Pull a JSON document out of free-form model output.

use contentgen_shared::{ContentGenError, Result};

/// Parse the JSON object or array contained in `text`.
///
/// Accepts bare JSON, fenced blocks (```json ... ```) and JSON surrounded by
/// prose. Anything else is a parse error, which callers treat as retryable.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    let trimmed = strip_fences(text.trim());

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| ContentGenError::parse(format!("generated text is not valid JSON: {e}"))),
        _ => Err(ContentGenError::parse("generated text contains no JSON document")),
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
