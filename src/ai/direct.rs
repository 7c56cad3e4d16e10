//! Direct mode: calls an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::ai::prompt::{
    GENERATION_SYSTEM_PROMPT, explanation_prompt, extract_sql, generation_prompt,
};
use crate::ai::{
    ExplainRequest, Generation, GenerationRequest, PROBE_TIMEOUT, ProviderError, SqlBackend,
    truncate_body,
};
use crate::config::AiConfig;

#[derive(Debug)]
pub struct DirectBackend {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Shape the system prompt asks the model to emit. `sql_query` is accepted
/// as an alias because several hosted models prefer that key.
#[derive(Deserialize)]
struct DirectGeneration {
    #[serde(alias = "sql_query")]
    sql: String,
    #[serde(default)]
    explanation: String,
}

impl DirectBackend {
    pub fn from_config(config: &AiConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Config("direct mode requires an API key".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Connection(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        structured: bool,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.1,
            max_tokens: 1000,
            response_format: structured.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!(
                "chat completions returned {}: {}",
                status,
                truncate_body(&body, 300)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(format!("invalid chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Response("chat response had no choices".to_string()))
    }
}

#[async_trait]
impl SqlBackend for DirectBackend {
    fn name(&self) -> &str {
        "direct"
    }

    async fn generate_sql(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<Generation, ProviderError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: GENERATION_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: generation_prompt(request),
            },
        ];

        let content = self.chat(messages, true).await?;
        debug!(model = %self.model, "received generation response");

        let generation = match serde_json::from_str::<DirectGeneration>(&content) {
            Ok(parsed) => Generation {
                sql: parsed.sql,
                explanation: parsed.explanation,
            },
            Err(_) => Generation {
                sql: extract_sql(&content),
                explanation: String::new(),
            },
        };

        if generation.sql.trim().is_empty() {
            return Err(ProviderError::Response(
                "model response contained no SQL".to_string(),
            ));
        }

        Ok(generation)
    }

    async fn explain_results(
        &self,
        request: &ExplainRequest<'_>,
    ) -> Result<String, ProviderError> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: explanation_prompt(request),
        }];

        let explanation = self.chat(messages, false).await?;
        if explanation.trim().is_empty() {
            return Err(ProviderError::Response(
                "model returned an empty explanation".to_string(),
            ));
        }

        Ok(explanation.trim().to_string())
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(&self.api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("probe failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Response(format!(
                "models endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
