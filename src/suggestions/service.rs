use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::OpenAiConfig;

/// Structured answer from the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion: String,
    pub explanation: String,
}

/// Next-line code suggestions for a student's in-progress solution.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(
        &self,
        current_code: &str,
        problem_prompt: &str,
        language: &str,
    ) -> anyhow::Result<Suggestion>;
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiSuggester {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiSuggester {
    pub fn new(cfg: &OpenAiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

fn build_messages(current_code: &str, problem_prompt: &str, language: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: format!(
                "You are a helpful and concise programming assistant specialized in {}. \
                 Only give next line suggestions. You are going to assist the user in \
                 finishing this problem. {}",
                language, problem_prompt
            ),
        },
        ChatMessage {
            role: "user",
            content: format!(
                "give me a suggestion for the next line of this code: {}",
                current_code
            ),
        },
    ]
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "code_response",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "suggestion": { "type": "string" },
                    "explanation": { "type": "string" }
                },
                "required": ["suggestion", "explanation"],
                "additionalProperties": false
            }
        }
    })
}

fn parse_suggestion(resp: ChatResponse) -> anyhow::Result<Suggestion> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("completion has no content")?;
    serde_json::from_str(&content).context("completion is not a suggestion object")
}

#[async_trait]
impl SuggestionService for OpenAiSuggester {
    async fn suggest(
        &self,
        current_code: &str,
        problem_prompt: &str,
        language: &str,
    ) -> anyhow::Result<Suggestion> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY is not configured")?;

        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(current_code, problem_prompt, language),
            response_format: response_schema(),
        };

        let resp = self
            .client
            .post(self.chat_completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .context("send chat completion")?
            .error_for_status()
            .context("chat completion status")?
            .json::<ChatResponse>()
            .await
            .context("decode chat completion")?;

        let suggestion = parse_suggestion(resp)?;
        debug!(model = %self.model, "suggestion received");
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(api_key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: api_key.map(Into::into),
            base_url: "http://127.0.0.1:9/v1/".into(),
            model: "gpt-4o".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn prompts_carry_code_and_problem() {
        let msgs = build_messages("def add(a, b):", "add two numbers", "python");
        assert_eq!(msgs[0].role, "system");
        assert!(msgs[0].content.contains("specialized in python"));
        assert!(msgs[0].content.ends_with("add two numbers"));
        assert_eq!(msgs[1].role, "user");
        assert!(msgs[1].content.ends_with("def add(a, b):"));
    }

    #[test]
    fn url_has_no_double_slash() {
        let s = OpenAiSuggester::new(&cfg(None)).unwrap();
        assert_eq!(s.chat_completions_url(), "http://127.0.0.1:9/v1/chat/completions");
    }

    #[test]
    fn parses_structured_content() {
        let raw = r#"{"choices":[{"message":{"content":"{\"suggestion\":\"return a + b\",\"explanation\":\"sum\"}"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(raw).unwrap();
        let s = parse_suggestion(resp).unwrap();
        assert_eq!(s.suggestion, "return a + b");
        assert_eq!(s.explanation, "sum");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_suggestion(resp).is_err());
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let s = OpenAiSuggester::new(&cfg(None)).unwrap();
        let err = s.suggest("x", "y", "python").await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
