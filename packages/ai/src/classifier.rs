//! Severity classification of a single complaint.
//!
//! The model is asked for one JSON object with a `score` and a `category`.
//! Anything that goes wrong between the request and a valid answer is
//! logged and replaced by [`Classification::fallback`].

use async_trait::async_trait;
use route_safety_corridor::scan::HazardClassifier;
use route_safety_corridor_models::{Classification, HazardRecord};

use crate::AiError;
use crate::providers::{ChatOptions, LlmProvider, Message, StopReason};

/// Categories the model is asked to choose from.
pub const CATEGORIES: &[&str] = &[
    "Noise",
    "Road Hazard",
    "Utility Issue",
    "Crime/Safety Concern",
    "Sanitation",
    "Encampment/Assistance Call",
    "Other",
];

const SYSTEM_PROMPT: &str = "You are a helpful safety analyst that only outputs valid JSON.";

/// [`HazardClassifier`] backed by a chat model.
pub struct LlmHazardClassifier {
    provider: Box<dyn LlmProvider>,
    options: ChatOptions,
}

impl LlmHazardClassifier {
    /// Wraps `provider` with low-temperature JSON-mode options.
    #[must_use]
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            options: ChatOptions {
                json_output: true,
                ..ChatOptions::default()
            },
        }
    }

    /// Classifies `hazard`, surfacing provider and parsing failures.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the provider request fails or the reply is not
    /// a usable classification.
    pub async fn try_classify(&self, hazard: &HazardRecord) -> Result<Classification, AiError> {
        let messages = [Message::user(build_prompt(hazard))];
        let response = self
            .provider
            .chat(SYSTEM_PROMPT, &messages, &self.options)
            .await?;

        if response.stop_reason == StopReason::MaxTokens {
            log::debug!("Classification reply hit the token limit");
        }

        parse_classification(&response.text)
    }
}

#[async_trait]
impl HazardClassifier for LlmHazardClassifier {
    async fn classify(&self, hazard: &HazardRecord) -> Classification {
        match self.try_classify(hazard).await {
            Ok(classification) => {
                log::debug!(
                    "'{}' / '{}' classified as {} ({})",
                    hazard.complaint_type,
                    hazard.descriptor,
                    classification.category,
                    classification.score
                );
                classification
            }
            Err(e) => {
                log::warn!(
                    "Failed to classify '{}' / '{}': {e}",
                    hazard.complaint_type,
                    hazard.descriptor
                );
                Classification::fallback()
            }
        }
    }
}

fn build_prompt(hazard: &HazardRecord) -> String {
    let categories = CATEGORIES
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a safety analyst. Your job is to assess the potential danger or disruption \
         of a 311 report in NYC.\n\n\
         Analyze the following report and provide ONLY a single, valid JSON object with \
         'score' (an integer from 1 to 10, where 1 is a minor inconvenience and 10 is a \
         severe, immediate danger) and 'category'.\n\n\
         Possible categories are: {categories}.\n\n\
         Report Details:\n\
         - Complaint Type: \"{}\"\n\
         - Descriptor: \"{}\"\n\n\
         JSON Response:",
        hazard.complaint_type, hazard.descriptor
    )
}

/// Extracts a [`Classification`] from a model reply.
///
/// The reply may wrap the object in prose or a code fence; the outermost
/// `{...}` is used. `score` may be an integer, a float, or a numeric
/// string, and is clamped into the valid range.
///
/// # Errors
///
/// Returns [`AiError::InvalidClassification`] if no object is found, the
/// score is missing or non-numeric, or the category is missing or blank.
pub fn parse_classification(text: &str) -> Result<Classification, AiError> {
    let invalid = |message: &str| AiError::InvalidClassification {
        message: message.to_string(),
    };

    let start = text.find('{').ok_or_else(|| invalid("no JSON object in reply"))?;
    let end = text.rfind('}').ok_or_else(|| invalid("no JSON object in reply"))?;
    if end < start {
        return Err(invalid("no JSON object in reply"));
    }

    let value: serde_json::Value = serde_json::from_str(&text[start..=end])?;

    let score = match value.get("score") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| invalid("missing or non-numeric score"))?;

    let category = value
        .get("category")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| invalid("missing category"))?;

    Ok(Classification::new(to_score(score), category))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
