//! Routes generation and explanation calls across the configured backends.
//!
//! The candidate list is fixed at startup from config. Agent mode tries the
//! agent first and may fall back to the direct backend once; direct mode
//! never falls back to the agent.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::agent::AgentBackend;
use crate::ai::direct::DirectBackend;
use crate::ai::prompt::extract_sql;
use crate::ai::{
    AiMode, ExplainRequest, GenerationRequest, Provenance, ProviderError, SqlBackend,
};
use crate::config::AiConfig;
use crate::health::HealthRegistry;

pub struct Candidate {
    pub provenance: Provenance,
    pub backend: Arc<dyn SqlBackend>,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub sql: String,
    pub explanation: String,
    pub provenance: Provenance,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no AI backend is configured for {0} mode")]
    NoCandidates(AiMode),
    #[error("all AI backends failed: {0}")]
    Exhausted(String),
}

pub struct ModeRouter {
    mode: AiMode,
    candidates: Vec<Candidate>,
    registry: Arc<HealthRegistry>,
}

impl std::fmt::Debug for ModeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeRouter")
            .field("mode", &self.mode)
            .field("candidates", &self.candidates.len())
            .finish_non_exhaustive()
    }
}

impl ModeRouter {
    pub fn from_config(
        config: &AiConfig,
        registry: Arc<HealthRegistry>,
    ) -> Result<Self, ProviderError> {
        let mode = AiMode::parse(&config.mode)
            .ok_or_else(|| ProviderError::Config(format!("unknown AI mode: {}", config.mode)))?;

        // A missing key or URL leaves that backend out of the candidate list
        // rather than failing startup; the health report carries the gap.
        let direct = match DirectBackend::from_config(config) {
            Ok(backend) => Some(Arc::new(backend) as Arc<dyn SqlBackend>),
            Err(ProviderError::Config(reason)) => {
                warn!(%reason, "direct backend unavailable");
                None
            }
            Err(e) => return Err(e),
        };

        let mut candidates = Vec::new();
        match mode {
            AiMode::Agent => {
                match AgentBackend::from_config(config) {
                    Ok(backend) => candidates.push(Candidate {
                        provenance: Provenance::Agent,
                        backend: Arc::new(backend),
                    }),
                    Err(ProviderError::Config(reason)) => {
                        warn!(%reason, "agent backend unavailable");
                    }
                    Err(e) => return Err(e),
                }
                if let Some(backend) = direct {
                    candidates.push(Candidate {
                        provenance: Provenance::DirectFallback,
                        backend,
                    });
                }
            }
            AiMode::Direct => {
                if let Some(backend) = direct {
                    candidates.push(Candidate {
                        provenance: Provenance::Direct,
                        backend,
                    });
                }
            }
        }

        Ok(Self {
            mode,
            candidates,
            registry,
        })
    }

    pub fn with_candidates(
        mode: AiMode,
        candidates: Vec<Candidate>,
        registry: Arc<HealthRegistry>,
    ) -> Self {
        Self {
            mode,
            candidates,
            registry,
        }
    }

    pub fn mode(&self) -> AiMode {
        self.mode
    }

    pub fn is_configured(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// The backend a request will try first, if any is configured.
    pub fn preferred(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationResult, RouteError> {
        if self.candidates.is_empty() {
            return Err(RouteError::NoCandidates(self.mode));
        }

        let mut failures = Vec::new();
        for candidate in &self.candidates {
            match candidate.backend.generate_sql(request).await {
                Ok(generation) => {
                    if candidate.provenance == Provenance::DirectFallback {
                        info!(
                            backend = candidate.backend.name(),
                            "preferred backend failed, fallback produced the query"
                        );
                    }
                    return Ok(GenerationResult {
                        sql: clean_sql(&generation.sql),
                        explanation: generation.explanation,
                        provenance: candidate.provenance,
                    });
                }
                Err(e) => {
                    warn!(
                        backend = candidate.backend.name(),
                        error = %e,
                        "backend failed to generate SQL"
                    );
                    self.registry
                        .mark_degraded(candidate.backend.name(), e.to_string());
                    failures.push(format!("{}: {}", candidate.backend.name(), e));
                }
            }
        }

        Err(RouteError::Exhausted(failures.join("; ")))
    }

    pub async fn explain(
        &self,
        request: &ExplainRequest<'_>,
    ) -> Result<(String, Provenance), RouteError> {
        if self.candidates.is_empty() {
            return Err(RouteError::NoCandidates(self.mode));
        }

        let mut failures = Vec::new();
        for candidate in &self.candidates {
            match candidate.backend.explain_results(request).await {
                Ok(explanation) => return Ok((explanation, candidate.provenance)),
                Err(e) => {
                    warn!(
                        backend = candidate.backend.name(),
                        error = %e,
                        "backend failed to explain results"
                    );
                    self.registry
                        .mark_degraded(candidate.backend.name(), e.to_string());
                    failures.push(format!("{}: {}", candidate.backend.name(), e));
                }
            }
        }

        Err(RouteError::Exhausted(failures.join("; ")))
    }
}

/// Backends occasionally wrap the statement in markdown fences even when
/// asked for structured output.
fn clean_sql(sql: &str) -> String {
    if sql.contains("```") {
        extract_sql(sql)
    } else {
        sql.trim().to_string()
    }
}
