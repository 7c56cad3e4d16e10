pub mod agent;
pub mod direct;
pub mod mock;
pub mod prompt;
pub mod router;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::db::executor::Row;

/// Budget for backend reachability probes; generation calls get the longer
/// per-client timeout from config.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("backend connection error: {0}")]
    Connection(String),

    #[error("backend response error: {0}")]
    Response(String),

    #[error("backend configuration error: {0}")]
    Config(String),
}

/// The configured backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    Direct,
    Agent,
}

impl AiMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "direct" => Some(Self::Direct),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an answer was produced, as reported to callers. A fallback success is
/// tagged distinctly so operators can see the preferred path failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "direct-fallback")]
    DirectFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Agent => "agent",
            Self::DirectFallback => "direct-fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request, with context already assembled.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub jira_context: Option<&'a str>,
    pub additional_context: Option<&'a str>,
}

/// What a backend returns for a generation call. The explanation may be
/// empty when the backend answered free-form.
#[derive(Debug, Clone)]
pub struct Generation {
    pub sql: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExplainRequest<'a> {
    pub question: &'a str,
    pub sql: &'a str,
    pub rows: &'a [Row],
    pub jira_context: Option<&'a str>,
}

#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Stable name used in logs and the degradation registry.
    fn name(&self) -> &str;

    async fn generate_sql(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<Generation, ProviderError>;

    async fn explain_results(&self, request: &ExplainRequest<'_>)
    -> Result<String, ProviderError>;

    /// Cheap reachability check for the health monitor.
    async fn probe(&self) -> Result<(), ProviderError>;
}

/// Upstream bodies can be large or sensitive; only a prefix ever reaches
/// logs or error messages.
pub(crate) fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        body.to_string()
    } else {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_names_only() {
        assert_eq!(AiMode::parse("agent"), Some(AiMode::Agent));
        assert_eq!(AiMode::parse("direct"), Some(AiMode::Direct));
        assert_eq!(AiMode::parse("hybrid"), None);
    }

    #[test]
    fn provenance_serializes_with_fallback_marker() {
        assert_eq!(
            serde_json::to_value(Provenance::DirectFallback).unwrap(),
            serde_json::json!("direct-fallback")
        );
        assert_eq!(
            serde_json::to_value(Provenance::Agent).unwrap(),
            serde_json::json!("agent")
        );
    }

    #[test]
    fn body_truncation_respects_char_boundaries() {
        assert_eq!(truncate_body("short", 10), "short");
        let truncated = truncate_body("aaaaéé", 5);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 8);
    }
}
