use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::traits::{CategoryOracle, OracleError, OracleRequest, OracleResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Bounded wait for one oracle call; a slower answer counts as a failure.
const ORACLE_TIMEOUT: Duration = Duration::from_secs(8);

const TOOL_NAME: &str = "assign_categories";

/// Claude-backed categorization oracle. Forces a tool call so the response
/// arrives as structured JSON rather than prose.
pub struct ClaudeOracle {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl ClaudeOracle {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, OracleError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| OracleError::Unavailable(e.to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl CategoryOracle for ClaudeOracle {
    async fn categorize(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let schema = serde_json::to_value(schemars::schema_for!(OracleResponse))
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let wire = ChatRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: build_prompt(request),
            }],
            tools: vec![ToolDefinition {
                name: TOOL_NAME.to_string(),
                description: "Assign category labels to the entity.".to_string(),
                input_schema: schema,
            }],
            tool_choice: serde_json::json!({ "type": "tool", "name": TOOL_NAME }),
        };

        debug!(model = %self.model, title = %request.title, "Oracle categorization request");

        let url = format!("{}/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(ORACLE_TIMEOUT)
            .headers(self.headers()?)
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!("{status}: {error_text}")));
        }

        let chat: ChatResponse = response.json().await?;
        for block in chat.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input)
                    .map_err(|e| OracleError::Malformed(e.to_string()));
            }
        }

        Err(OracleError::Malformed(
            "no tool_use block in oracle response".to_string(),
        ))
    }
}

const SYSTEM_PROMPT: &str = "You categorize entities for a relationship graph. \
Respond only through the assign_categories tool.";

fn build_prompt(request: &OracleRequest) -> String {
    let candidates = if request.candidates.is_empty() {
        "(none yet)".to_string()
    } else {
        request
            .candidates
            .iter()
            .map(|c| format!("- {} (held by {} entities)", c.label, c.strength))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Entity: "{title}"

Existing category labels, strongest first:
{candidates}

Assign at most 3 category labels to this entity. The system keeps at most {budget} distinct labels overall, so:
1. Prefer reusing existing labels — shared labels are what connect entities.
2. Only mint a new label when it is broad enough to apply to many other entities.
3. If all {budget} slots are taken, a new label should logically displace the weakest existing one.

Return the labels plus a one-or-two sentence explanation."#,
        title = request.title,
        candidates = candidates,
        budget = request.budget,
    )
}

// --- Wire types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<WireMessage>,
    tools: Vec<ToolDefinition>,
    tool_choice: Value,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        #[allow(dead_code)]
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_common::LabelStrength;

    #[test]
    fn prompt_lists_candidates_and_budget() {
        let request = OracleRequest {
            title: "Ada Lovelace".to_string(),
            candidates: vec![
                LabelStrength {
                    label: "mathematics".to_string(),
                    strength: 4,
                },
                LabelStrength {
                    label: "computing".to_string(),
                    strength: 2,
                },
            ],
            budget: 5,
        };

        let prompt = build_prompt(&request);
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("- mathematics (held by 4 entities)"));
        assert!(prompt.contains("at most 5 distinct labels"));
    }

    #[test]
    fn prompt_handles_empty_candidate_table() {
        let request = OracleRequest {
            title: "First Entity".to_string(),
            candidates: vec![],
            budget: 5,
        };
        assert!(build_prompt(&request).contains("(none yet)"));
    }

    #[test]
    fn tool_use_block_deserializes() {
        let raw = serde_json::json!({
            "content": [
                {"type": "text", "text": "thinking"},
                {"type": "tool_use", "name": "assign_categories",
                 "input": {"labels": ["computing"], "explanation": "pioneer"}}
            ]
        });
        let chat: ChatResponse = serde_json::from_value(raw).unwrap();
        let found = chat.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        assert!(found);
    }
}
