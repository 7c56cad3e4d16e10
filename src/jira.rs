//! Optional Jira integration: fetches issues over the REST v2 API and
//! renders them as plain-text context for SQL generation.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::ai::{PROBE_TIMEOUT, truncate_body};
use crate::config::JiraConfig;

const ISSUE_FIELDS: &str = "summary,description,status,issuetype,priority,created,updated";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("jira request failed: {0}")]
    Connection(String),
    #[error("jira issue {0} was not found")]
    IssueNotFound(String),
    #[error("jira response error: {0}")]
    Response(String),
}

pub struct JiraClient {
    client: Client,
    base_url: String,
    user_email: String,
    api_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JiraIssue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

#[derive(Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Deserialize)]
struct RawFields {
    summary: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<NamedField>,
    #[serde(default, rename = "issuetype")]
    issue_type: Option<NamedField>,
    #[serde(default)]
    priority: Option<NamedField>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

impl From<RawIssue> for JiraIssue {
    fn from(raw: RawIssue) -> Self {
        Self {
            key: raw.key,
            summary: raw.fields.summary,
            status: raw
                .fields
                .status
                .map(|f| f.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            issue_type: raw
                .fields
                .issue_type
                .map(|f| f.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            priority: raw.fields.priority.map(|f| f.name),
            description: raw.fields.description.filter(|d| !d.trim().is_empty()),
            created: raw.fields.created,
            updated: raw.fields.updated,
        }
    }
}

impl JiraIssue {
    /// Renders the issue as the context block handed to SQL generation.
    pub fn to_context(&self) -> String {
        let mut context = format!("Jira Issue: {} - {}", self.key, self.summary);
        context.push_str(&format!("\nStatus: {}", self.status));
        context.push_str(&format!("\nType: {}", self.issue_type));
        if let Some(priority) = &self.priority {
            context.push_str(&format!("\nPriority: {}", priority));
        }
        if let Some(description) = &self.description {
            context.push_str(&format!("\nDescription: {}", description));
        }
        context
    }
}

impl JiraClient {
    /// Returns `None` when the tracker is not configured. Credentials are
    /// held privately and never surface in errors or logs.
    pub fn from_config(config: &JiraConfig) -> Result<Option<Self>, JiraError> {
        let (Some(base_url), Some(user_email), Some(api_token)) =
            (&config.base_url, &config.user_email, &config.api_token)
        else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| JiraError::Connection(format!("failed to build client: {}", e)))?;

        Ok(Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_email: user_email.clone(),
            api_token: api_token.clone(),
        }))
    }

    pub async fn fetch_issue(&self, key: &str) -> Result<JiraIssue, JiraError> {
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", ISSUE_FIELDS)])
            .basic_auth(&self.user_email, Some(&self.api_token))
            .send()
            .await
            .map_err(|e| JiraError::Connection(format!("issue fetch failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(JiraError::IssueNotFound(key.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JiraError::Response(format!(
                "issue fetch returned {}: {}",
                status,
                truncate_body(&body, 300)
            )));
        }

        let raw: RawIssue = response
            .json()
            .await
            .map_err(|e| JiraError::Response(format!("invalid issue payload: {}", e)))?;

        debug!(issue = %raw.key, "fetched jira issue");
        Ok(raw.into())
    }

    pub async fn probe(&self) -> Result<(), JiraError> {
        let response = self
            .client
            .get(format!("{}/rest/api/2/myself", self.base_url))
            .basic_auth(&self.user_email, Some(&self.api_token))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| JiraError::Connection(format!("probe failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(JiraError::Response(format!(
                "myself endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
