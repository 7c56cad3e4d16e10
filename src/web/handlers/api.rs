//! API handlers. Each one is a thin adapter: decode the request, call the
//! pipeline or a collaborator, wrap the outcome in the response envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::db::introspect::{self, SchemaSnapshot};
use crate::error::ApiError;
use crate::health::{HealthSnapshot, OverallStatus};
use crate::jira::{JiraClient, JiraError, JiraIssue};
use crate::pipeline::{ExecuteData, GenerateData, QueryInput};
use crate::web::response::ApiResponse;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SqlQueryRequest {
    pub query: String,
    #[serde(default)]
    pub jira_issue_key: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
}

impl SqlQueryRequest {
    fn as_input(&self) -> QueryInput<'_> {
        QueryInput {
            question: &self.query,
            jira_issue_key: self.jira_issue_key.as_deref(),
            additional_context: self.additional_context.as_deref(),
        }
    }
}

/// Liveness banner at the root; deliberately independent of the probes.
pub async fn index() -> Json<Value> {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Always HTTP 200; degradation lives in the body, not the status code.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthSnapshot>> {
    let snapshot = state.monitor.check().await;
    let message = match snapshot.status {
        OverallStatus::Ok => "All services are operational.",
        OverallStatus::Degraded => "One or more services are degraded.",
    };
    Json(ApiResponse::ok(snapshot, message))
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SqlQueryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GenerateData>>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    debug!(query = %request.query, "generate request");
    let outcome = state.pipeline.generate(request.as_input()).await?;
    Ok(Json(ApiResponse::ok(outcome.data, outcome.message)))
}

pub async fn execute_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SqlQueryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ExecuteData>>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    debug!(query = %request.query, "execute request");
    let outcome = state.pipeline.execute(request.as_input()).await?;
    Ok(Json(ApiResponse::ok(outcome.data, outcome.message)))
}

pub async fn db_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SchemaSnapshot>>, ApiError> {
    let snapshot = introspect::snapshot(&state.pool)
        .await
        .map_err(|e| ApiError::SchemaUnavailable(e.to_string()))?;
    Ok(Json(ApiResponse::ok(
        snapshot,
        "Schema retrieved successfully.",
    )))
}

pub async fn jira_issue(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<JiraIssue>>, ApiError> {
    let issue = tracker(&state)?.fetch_issue(&key).await.map_err(jira_error)?;
    Ok(Json(ApiResponse::ok(
        issue,
        format!("Fetched issue {}.", key),
    )))
}

pub async fn jira_context(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let issue = tracker(&state)?.fetch_issue(&key).await.map_err(jira_error)?;
    Ok(Json(ApiResponse::ok(
        json!({ "key": issue.key, "context": issue.to_context() }),
        format!("Built context for issue {}.", key),
    )))
}

/// Envelope-shaped 404 for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("resource not found")
}

fn tracker(state: &AppState) -> Result<&Arc<JiraClient>, ApiError> {
    state
        .jira
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Jira integration is not configured"))
}

/// Undecodable bodies are the caller's fault, not ours: 400, not 422.
fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::validation(format!("invalid request body: {}", rejection.body_text()))
}

fn jira_error(e: JiraError) -> ApiError {
    match e {
        JiraError::IssueNotFound(key) => ApiError::not_found(format!("jira issue {} not found", key)),
        JiraError::Connection(detail) => {
            ApiError::unavailable(format!("jira is unreachable: {}", detail))
        }
        JiraError::Response(detail) => ApiError::internal(format!("jira error: {}", detail)),
    }
}
