//! The question-to-answer pipeline: assemble context, fetch the schema,
//! generate SQL, guard it, execute it, and explain the results. Each stage
//! has its own failure rule; only the stages that make an answer impossible
//! abort the request.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ai::router::{ModeRouter, RouteError};
use crate::ai::{ExplainRequest, GenerationRequest, Provenance};
use crate::db::executor::{self, ExecError, ExecutionOutput, QueryLimits, Row};
use crate::db::guard;
use crate::db::introspect;
use crate::db::pool::DbPool;
use crate::error::ApiError;
use crate::health::HealthRegistry;
use crate::jira::JiraClient;

/// Where returned rows came from. Synthetic rows stand in when the database
/// rejected the statement, so the caller can always tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultSource {
    #[serde(rename = "database")]
    Database,
    #[serde(rename = "synthetic")]
    Synthetic,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryInput<'a> {
    pub question: &'a str,
    pub jira_issue_key: Option<&'a str>,
    pub additional_context: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct GenerateData {
    pub sql: String,
    pub explanation: String,
    pub mode: Provenance,
}

#[derive(Debug, Serialize)]
pub struct ExecuteData {
    pub sql: String,
    pub results: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub truncated: bool,
    pub source: ResultSource,
    pub explanation: String,
    pub mode: Provenance,
}

#[derive(Debug)]
pub struct GenerateOutcome {
    pub data: GenerateData,
    pub message: String,
}

#[derive(Debug)]
pub struct ExecuteOutcome {
    pub data: ExecuteData,
    pub message: String,
}

pub struct Pipeline {
    pool: DbPool,
    router: Arc<ModeRouter>,
    jira: Option<Arc<JiraClient>>,
    registry: Arc<HealthRegistry>,
    limits: QueryLimits,
}

impl Pipeline {
    pub fn new(
        pool: DbPool,
        router: Arc<ModeRouter>,
        jira: Option<Arc<JiraClient>>,
        registry: Arc<HealthRegistry>,
        limits: QueryLimits,
    ) -> Self {
        Self {
            pool,
            router,
            jira,
            registry,
            limits,
        }
    }

    /// Generate SQL for a question without touching the data.
    pub async fn generate(&self, input: QueryInput<'_>) -> Result<GenerateOutcome, ApiError> {
        let question = validated_question(input.question)?;
        let jira_context = self.assemble_jira_context(input.jira_issue_key).await;
        let schema = self.fetch_schema().await?;

        let generation = self
            .generate_sql(
                question,
                &schema,
                jira_context.as_deref(),
                input.additional_context,
            )
            .await?;

        let explanation = if generation.explanation.trim().is_empty() {
            "No explanation provided.".to_string()
        } else {
            generation.explanation
        };

        info!(mode = %generation.provenance, "generated SQL");
        Ok(GenerateOutcome {
            data: GenerateData {
                sql: generation.sql,
                explanation,
                mode: generation.provenance,
            },
            message: "SQL generated successfully.".to_string(),
        })
    }

    /// Generate SQL, run it, and explain the results.
    pub async fn execute(&self, input: QueryInput<'_>) -> Result<ExecuteOutcome, ApiError> {
        let question = validated_question(input.question)?;
        let jira_context = self.assemble_jira_context(input.jira_issue_key).await;
        let schema = self.fetch_schema().await?;

        let generation = self
            .generate_sql(
                question,
                &schema,
                jira_context.as_deref(),
                input.additional_context,
            )
            .await?;

        guard::check(&generation.sql).map_err(|rejection| ApiError::UnsafeQuery {
            sql: generation.sql.clone(),
            reason: rejection.to_string(),
        })?;

        let (output, source) =
            match executor::run_select(&self.pool, &generation.sql, self.limits).await {
                Ok(output) => (output, ResultSource::Database),
                Err(ExecError::Timeout(ms)) => return Err(ApiError::QueryTimeout(ms)),
                Err(ExecError::PoolExhausted(detail)) => {
                    return Err(ApiError::unavailable(format!(
                        "database is at capacity: {}",
                        detail
                    )));
                }
                Err(ExecError::Worker(detail)) => return Err(ApiError::internal(detail)),
                Err(ExecError::Statement(detail)) => {
                    warn!(error = %detail, "execution failed, substituting sample rows");
                    self.registry
                        .mark_degraded("database", format!("query execution failed: {}", detail));
                    (synthetic_output(&generation.sql), ResultSource::Synthetic)
                }
            };

        let explain_request = ExplainRequest {
            question,
            sql: &generation.sql,
            rows: &output.rows,
            jira_context: jira_context.as_deref(),
        };
        let (explanation, explained) = match self.router.explain(&explain_request).await {
            Ok((explanation, _)) => (explanation, true),
            Err(e) => {
                warn!(error = %e, "explanation failed after execution");
                (
                    "Could not generate an explanation for these results.".to_string(),
                    false,
                )
            }
        };

        let message = match (source, explained) {
            (ResultSource::Database, true) => "Query executed successfully.",
            (ResultSource::Database, false) => {
                "Query executed successfully, but explanation failed."
            }
            (ResultSource::Synthetic, _) => "Database execution failed; showing sample results.",
        };

        info!(
            mode = %generation.provenance,
            rows = output.row_count,
            elapsed_ms = output.elapsed_ms,
            source = ?source,
            "query answered"
        );
        Ok(ExecuteOutcome {
            data: ExecuteData {
                sql: generation.sql,
                results: output.rows,
                row_count: output.row_count,
                execution_time_ms: output.elapsed_ms,
                truncated: output.truncated,
                source,
                explanation,
                mode: generation.provenance,
            },
            message: message.to_string(),
        })
    }

    /// Best effort: a missing tracker or failed fetch logs a warning and the
    /// question proceeds without issue context.
    async fn assemble_jira_context(&self, issue_key: Option<&str>) -> Option<String> {
        let key = issue_key?.trim();
        if key.is_empty() {
            return None;
        }
        let Some(jira) = &self.jira else {
            warn!(issue = key, "issue context requested but jira is not configured");
            return None;
        };

        match jira.fetch_issue(key).await {
            Ok(issue) => {
                debug!(issue = key, "assembled jira context");
                Some(issue.to_context())
            }
            Err(e) => {
                warn!(issue = key, error = %e, "proceeding without jira context");
                None
            }
        }
    }

    async fn fetch_schema(&self) -> Result<String, ApiError> {
        let snapshot = introspect::snapshot(&self.pool)
            .await
            .map_err(|e| ApiError::SchemaUnavailable(e.to_string()))?;
        if snapshot.is_empty() {
            warn!("generating against an empty database");
        }
        Ok(snapshot.to_prompt_text())
    }

    async fn generate_sql(
        &self,
        question: &str,
        schema: &str,
        jira_context: Option<&str>,
        additional_context: Option<&str>,
    ) -> Result<crate::ai::router::GenerationResult, ApiError> {
        let request = GenerationRequest {
            question,
            schema,
            jira_context,
            additional_context,
        };
        self.router.generate(&request).await.map_err(|e| match e {
            RouteError::NoCandidates(_) | RouteError::Exhausted(_) => {
                ApiError::unavailable(e.to_string())
            }
        })
    }
}

fn validated_question(question: &str) -> Result<&str, ApiError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("query must not be blank"));
    }
    Ok(trimmed)
}

fn synthetic_output(sql: &str) -> ExecutionOutput {
    let rows = executor::synthetic_rows(sql);
    let columns = rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    let row_count = rows.len();
    ExecutionOutput {
        columns,
        rows,
        row_count,
        truncated: false,
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiMode;
    use crate::ai::mock::MockBackend;
    use crate::ai::router::Candidate;
    use crate::config::DatabaseConfig;
    use crate::db::pool::build_pool;
    use crate::db::seed;
    use std::time::Duration;

    async fn pipeline_with(backend: MockBackend) -> (Pipeline, Arc<HealthRegistry>) {
        pipeline_with_limits(
            backend,
            QueryLimits {
                max_rows: 500,
                timeout: Duration::from_secs(10),
            },
        )
        .await
    }

    async fn pipeline_with_limits(
        backend: MockBackend,
        limits: QueryLimits,
    ) -> (Pipeline, Arc<HealthRegistry>) {
        let pool = build_pool(&DatabaseConfig {
            path: ":memory:".to_string(),
            pool_size: 1,
            acquire_timeout_secs: 5,
            max_result_rows: 500,
            query_timeout_ms: 10_000,
            seed_demo: true,
        })
        .unwrap();
        seed::seed_if_empty(&pool).await.unwrap();

        let registry = Arc::new(HealthRegistry::new());
        let router = Arc::new(ModeRouter::with_candidates(
            AiMode::Agent,
            vec![Candidate {
                provenance: Provenance::Agent,
                backend: Arc::new(backend),
            }],
            registry.clone(),
        ));
        let pipeline = Pipeline::new(pool, router, None, registry.clone(), limits);
        (pipeline, registry)
    }

    fn input(question: &str) -> QueryInput<'_> {
        QueryInput {
            question,
            jira_issue_key: None,
            additional_context: None,
        }
    }

    #[tokio::test]
    async fn generate_returns_sql_without_executing() {
        let (pipeline, _) = pipeline_with(MockBackend::new("agent")).await;
        let outcome = pipeline.generate(input("show all customers")).await.unwrap();

        assert_eq!(outcome.data.sql, "SELECT * FROM customers");
        assert_eq!(outcome.data.mode, Provenance::Agent);
        assert!(!outcome.data.explanation.is_empty());
    }

    #[tokio::test]
    async fn blank_questions_are_rejected() {
        let (pipeline, _) = pipeline_with(MockBackend::new("agent")).await;
        let err = pipeline.execute(input("   ")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn execute_answers_from_seeded_tables() {
        let (pipeline, _) = pipeline_with(MockBackend::new("agent")).await;
        let outcome = pipeline.execute(input("show all customers")).await.unwrap();

        assert_eq!(outcome.data.source, ResultSource::Database);
        assert_eq!(outcome.data.row_count, 3);
        assert!(!outcome.data.truncated);
        assert_eq!(outcome.message, "Query executed successfully.");
        assert!(outcome.data.explanation.contains("3 rows"));
    }

    #[tokio::test]
    async fn unsafe_generations_are_rejected_with_the_sql() {
        let (pipeline, _) =
            pipeline_with(MockBackend::scripted("agent", "DROP TABLE customers")).await;
        let err = pipeline.execute(input("drop everything")).await.unwrap_err();

        match err {
            ApiError::UnsafeQuery { sql, .. } => assert_eq!(sql, "DROP TABLE customers"),
            other => panic!("expected UnsafeQuery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_statements_degrade_to_sample_rows() {
        let (pipeline, registry) = pipeline_with(MockBackend::scripted(
            "agent",
            "SELECT * FROM order_history",
        ))
        .await;
        let outcome = pipeline.execute(input("order history")).await.unwrap();

        assert_eq!(outcome.data.source, ResultSource::Synthetic);
        assert!(outcome.data.row_count > 0);
        assert_eq!(
            outcome.message,
            "Database execution failed; showing sample results."
        );
        assert!(registry.degradation("database").is_some());
    }

    #[tokio::test]
    async fn over_budget_execution_maps_to_query_timeout() {
        let (pipeline, _) = pipeline_with_limits(
            MockBackend::new("agent"),
            QueryLimits {
                max_rows: 500,
                timeout: Duration::from_millis(0),
            },
        )
        .await;

        let err = pipeline.execute(input("show all customers")).await.unwrap_err();
        assert!(matches!(err, ApiError::QueryTimeout(0)));
    }

    #[tokio::test]
    async fn explanation_failure_still_returns_results() {
        let (pipeline, _) = pipeline_with(MockBackend::without_explanations("agent")).await;
        let outcome = pipeline.execute(input("show all customers")).await.unwrap();

        assert_eq!(outcome.data.source, ResultSource::Database);
        assert_eq!(outcome.data.row_count, 3);
        assert_eq!(
            outcome.message,
            "Query executed successfully, but explanation failed."
        );
        assert_eq!(
            outcome.data.explanation,
            "Could not generate an explanation for these results."
        );
    }

    #[tokio::test]
    async fn missing_tracker_does_not_block_the_question() {
        let (pipeline, _) = pipeline_with(MockBackend::new("agent")).await;
        let outcome = pipeline
            .execute(QueryInput {
                question: "show all customers",
                jira_issue_key: Some("SALES-42"),
                additional_context: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.data.row_count, 3);
    }

    #[tokio::test]
    async fn exhausted_backends_map_to_unavailable() {
        let (pipeline, _) = pipeline_with(MockBackend::unreachable("agent")).await;
        let err = pipeline.execute(input("show all customers")).await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }
}
