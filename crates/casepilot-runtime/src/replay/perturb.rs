//! Fact-preserving rewrites of a customer message.

use casepilot_core::{CasepilotError, Result};
use casepilot_llm::{LlmProvider, LlmRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::prompts;

const FRAMINGS: [(&str, &str); 5] = [
    ("Hi support team, I need help with the following: ", ""),
    ("To whom it may concern, ", " Please advise on next steps."),
    (
        "Hello, I'm reaching out regarding an issue. ",
        " Appreciate your assistance.",
    ),
    ("I wanted to follow up on this matter urgently. ", ""),
    ("Good day. I have a concern I need resolved: ", " Thank you."),
];

/// Where a set of perturbations came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerturbationSource {
    /// Paraphrased by the reasoning backend.
    Model,
    /// Built from fixed framings because the backend path failed.
    Template { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Perturbations {
    pub texts: Vec<String>,
    pub source: PerturbationSource,
}

/// Generates paraphrases through the reasoning backend, falling back to templates.
pub struct Paraphraser {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl Paraphraser {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    /// Exactly `n` perturbations of `original`. Never fails.
    pub async fn generate(&self, original: &str, n: usize) -> Perturbations {
        match self.paraphrase(original, n).await {
            Ok(texts) => Perturbations {
                texts,
                source: PerturbationSource::Model,
            },
            Err(e) => {
                match e {
                    CasepilotError::MalformedResponse(ref reason) => {
                        warn!(%reason, "paraphrase reply could not be parsed")
                    }
                    ref other => warn!(error = %other, "paraphrase backend call failed"),
                }
                info!(n, "using template perturbations");
                Perturbations {
                    texts: template_perturbations(original, n),
                    source: PerturbationSource::Template {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    async fn paraphrase(&self, original: &str, n: usize) -> Result<Vec<String>> {
        let request = LlmRequest::prompt(
            &self.model,
            prompts::paraphrase_prompt(original, n),
            self.max_tokens,
        );
        let response = self.provider.complete(&request).await?;
        let raw = response.message.text_content();
        extract_string_array(&raw, n).ok_or_else(|| {
            let preview: String = raw.trim().chars().take(100).collect();
            CasepilotError::MalformedResponse(format!("no array of {n} paraphrases in: {preview}"))
        })
    }
}

/// The first `n` entries of the first JSON array in `raw` holding at least
/// `n` non-blank strings. Surrounding prose is skipped.
pub fn extract_string_array(raw: &str, n: usize) -> Option<Vec<String>> {
    let raw = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Some(texts) = as_strings(&value, n) {
            return Some(texts);
        }
    }
    raw.match_indices('[').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => as_strings(&value, n),
            _ => None,
        }
    })
}

fn as_strings(value: &Value, n: usize) -> Option<Vec<String>> {
    let items = value.as_array()?;
    if items.len() < n {
        return None;
    }
    items
        .iter()
        .take(n)
        .map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

/// Deterministic rewrites: fixed framings around the original, numbered
/// once they cycle so all `n` outputs are distinct.
pub fn template_perturbations(original: &str, n: usize) -> Vec<String> {
    let message = original.trim();
    (0..n)
        .map(|i| {
            let (prefix, suffix) = FRAMINGS[i % FRAMINGS.len()];
            let text = format!("{prefix}{message}{suffix}");
            match i / FRAMINGS.len() {
                0 => text,
                round => format!("Follow-up {round}: {text}"),
            }
        })
        .collect()
}
