use serde::{Deserialize, Serialize};

use super::service::Suggestion;

fn default_language() -> String {
    "python".into()
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub problem_id: i64,
    pub current_code: String,
    pub problem_prompt: String,
    #[serde(default = "default_language")]
    pub language: String,
}

/// Shaped for the editor's completion provider.
#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub label: &'static str,
    pub detail: &'static str,
    #[serde(rename = "insertText")]
    pub insert_text: String,
    pub explanation: String,
}

impl From<Suggestion> for SuggestionResponse {
    fn from(s: Suggestion) -> Self {
        Self {
            label: "AI suggestion",
            detail: "AI Suggestion",
            insert_text: s.suggestion,
            explanation: s.explanation,
        }
    }
}
