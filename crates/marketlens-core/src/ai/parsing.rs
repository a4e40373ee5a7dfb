//! JSON parsing helpers for generation responses
//!
//! Models often wrap the JSON payload in prose or markdown code fences, so
//! the object is located between the first `{` and the last `}`.

use serde::Deserialize;

use super::types::{GeneratedInsight, GenerationError, GenerationResult};

/// Loose shape accepted from the model before validation
#[derive(Debug, Deserialize)]
struct RawGeneratedInsight {
    insight_text: Option<String>,
    recommendations: Option<Vec<String>>,
}

/// Parse and validate an `{insight_text, recommendations}` object
pub fn parse_generated_insight(response: &str) -> GenerationResult<GeneratedInsight> {
    let json_str = extract_json_object(response)?;

    let raw: RawGeneratedInsight = serde_json::from_str(json_str).map_err(|e| {
        GenerationError::MalformedResponse(format!(
            "Invalid JSON from model: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })?;

    let insight_text = raw
        .insight_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GenerationError::MalformedResponse("missing insight_text".into()))?;

    let recommendations: Vec<String> = raw
        .recommendations
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if recommendations.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "missing recommendations".into(),
        ));
    }

    Ok(GeneratedInsight {
        insight_text,
        recommendations,
    })
}

/// Slice out the outermost JSON object
pub fn extract_json_object(response: &str) -> GenerationResult<&str> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(GenerationError::MalformedResponse(format!(
            "No JSON found in model response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
