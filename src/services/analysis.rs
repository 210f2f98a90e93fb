//! Analysis pipeline: raw image bytes → validated [`AnalysisResult`].
//!
//! The model's reply is handled in two phases: a permissive text-cleanup
//! phase limited to code-fence stripping and outer-brace extraction, then
//! strict schema validation that never trusts the classification tag beyond
//! membership in the closed set.

use std::str::FromStr;

use garde::Validate;
use serde::Deserialize;

use crate::models::analysis::{AnalysisResult, Ingredient, RiskClass};
use crate::services::inference::{InferenceClient, InferenceError};
use crate::services::references::ReferenceClient;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("inference service call failed: {0}")]
    Transport(#[from] InferenceError),

    #[error("could not extract JSON from model response")]
    ParseFailure,

    #[error("model response violated the ingredient schema: {0}")]
    Schema(String),
}

/// Run the full pipeline for one label image.
pub async fn analyze_image(
    inference: &InferenceClient,
    references: &ReferenceClient,
    image_bytes: &[u8],
) -> Result<AnalysisResult, AnalysisError> {
    let raw = inference.describe_label(image_bytes).await?;

    let value = extract_json(&raw).ok_or_else(|| {
        tracing::warn!(raw = %raw, "model response was not parseable JSON");
        AnalysisError::ParseFailure
    })?;

    let mut result = validate_result(value)?;

    // Enrichment is per-ingredient and best-effort: one ingredient's lookup
    // failure must not cost another its citations, or the job its result.
    for ingredient in &mut result.ingredients {
        ingredient.papers = references.lookup(&ingredient.name).await;
    }

    Ok(result)
}

/// Phase one: recover a JSON value from model text that may be fenced in
/// markdown or wrapped in prose.
fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_code_fence(raw);

    if let Ok(value) = serde_json::from_str(cleaned) {
        return Some(value);
    }

    extract_braced_object(cleaned).and_then(|candidate| serde_json::from_str(candidate).ok())
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Locate the first top-level `{...}` object, tracking string and escape
/// state so braces inside string literals do not confuse the depth count.
fn extract_braced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Deserialize)]
struct RawAnalysis {
    ingredients: Vec<RawIngredient>,
}

#[derive(Deserialize)]
struct RawIngredient {
    name: String,
    classification: String,
    explanation: String,
}

/// Phase two: strict shape validation. Rejects rather than coercing, so
/// downstream display logic can rely on the closed classification set.
fn validate_result(value: serde_json::Value) -> Result<AnalysisResult, AnalysisError> {
    let raw: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| AnalysisError::Schema(format!("unexpected response shape: {e}")))?;

    let mut ingredients = Vec::with_capacity(raw.ingredients.len());
    for entry in raw.ingredients {
        let classification = RiskClass::from_str(&entry.classification).map_err(|_| {
            AnalysisError::Schema(format!(
                "classification '{}' for '{}' is outside high_risk | moderate_risk | healthy",
                entry.classification, entry.name
            ))
        })?;

        let ingredient = Ingredient {
            name: entry.name,
            classification,
            explanation: entry.explanation,
            papers: Vec::new(),
        };
        ingredient
            .validate()
            .map_err(|e| AnalysisError::Schema(format!("invalid ingredient entry: {e}")))?;

        ingredients.push(ingredient);
    }

    Ok(AnalysisResult { ingredients })
}
