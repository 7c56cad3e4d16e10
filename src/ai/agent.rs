//! Agent mode: delegates generation to a sidecar agent service over HTTP.
//!
//! The agent owns its own prompting and model choice; this backend only
//! speaks its wire contract: `POST /generate-sql`, `POST /explain-results`,
//! and `GET /health` for probes.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::prompt::EXPLANATION_SAMPLE_ROWS;
use crate::ai::{
    ExplainRequest, Generation, GenerationRequest, PROBE_TIMEOUT, ProviderError, SqlBackend,
    truncate_body,
};
use crate::config::AiConfig;
use crate::db::executor::Row;

#[derive(Debug)]
pub struct AgentBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct AgentGenerateRequest<'a> {
    query: &'a str,
    schema_info: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    jira_context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_context: Option<&'a str>,
}

#[derive(Deserialize)]
struct AgentGenerateResponse {
    sql_query: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Serialize)]
struct AgentExplainRequest<'a> {
    query: &'a str,
    sql: &'a str,
    results: &'a [Row],
    #[serde(skip_serializing_if = "Option::is_none")]
    jira_context: Option<&'a str>,
}

#[derive(Deserialize)]
struct AgentExplainResponse {
    explanation: String,
}

impl AgentBackend {
    pub fn from_config(config: &AiConfig) -> Result<Self, ProviderError> {
        let base_url = config.agent_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::Config(
                "agent mode requires an agent URL".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Connection(format!("failed to build client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ProviderError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::Connection(format!("agent request to {} failed: {}", path, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!(
                "agent {} returned {}: {}",
                path,
                status,
                truncate_body(&body, 300)
            )));
        }

        response.json().await.map_err(|e| {
            ProviderError::Response(format!("invalid agent response from {}: {}", path, e))
        })
    }
}

#[async_trait]
impl SqlBackend for AgentBackend {
    fn name(&self) -> &str {
        "agent"
    }

    async fn generate_sql(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<Generation, ProviderError> {
        let payload = AgentGenerateRequest {
            query: request.question,
            schema_info: request.schema,
            jira_context: request.jira_context,
            additional_context: request.additional_context,
        };

        let response: AgentGenerateResponse = self.post("/generate-sql", &payload).await?;
        if response.sql_query.trim().is_empty() {
            return Err(ProviderError::Response(
                "agent returned an empty SQL query".to_string(),
            ));
        }

        Ok(Generation {
            sql: response.sql_query,
            explanation: response.explanation,
        })
    }

    async fn explain_results(
        &self,
        request: &ExplainRequest<'_>,
    ) -> Result<String, ProviderError> {
        let sample = &request.rows[..request.rows.len().min(EXPLANATION_SAMPLE_ROWS)];
        let payload = AgentExplainRequest {
            query: request.question,
            sql: request.sql,
            results: sample,
            jira_context: request.jira_context,
        };

        let response: AgentExplainResponse = self.post("/explain-results", &payload).await?;
        if response.explanation.trim().is_empty() {
            return Err(ProviderError::Response(
                "agent returned an empty explanation".to_string(),
            ));
        }

        Ok(response.explanation)
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("probe failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Response(format!(
                "agent health endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
