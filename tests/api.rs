//! End-to-end tests over the HTTP surface, with mock AI backends and a
//! seeded in-memory DuckDB behind the real router.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use serde_json::{Value, json};
use tower::ServiceExt;

use askdb::ai::mock::MockBackend;
use askdb::ai::router::{Candidate, ModeRouter};
use askdb::ai::{AiMode, Provenance};
use askdb::config::AppConfig;
use askdb::db::guard;
use askdb::db::pool::build_pool;
use askdb::db::seed;
use askdb::health::HealthRegistry;
use askdb::web::routes::build_router;
use askdb::web::state::AppState;

const BODY_LIMIT: usize = 1_048_576;

fn memory_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = ":memory:".to_string();
    config.database.pool_size = 1;
    config.database.seed_demo = true;
    config
}

async fn app_with(config: AppConfig, candidates: Vec<Candidate>) -> Router {
    let pool = build_pool(&config.database).expect("build pool");
    seed::seed_if_empty(&pool).await.expect("seed demo schema");

    let registry = Arc::new(HealthRegistry::new());
    let router = Arc::new(ModeRouter::with_candidates(
        AiMode::Agent,
        candidates,
        registry.clone(),
    ));
    let state = AppState::assemble(config, pool, router, None, registry);
    build_router(Arc::new(state))
}

async fn agent_app() -> Router {
    app_with(
        memory_config(),
        vec![Candidate {
            provenance: Provenance::Agent,
            backend: Arc::new(MockBackend::new("agent")),
        }],
    )
    .await
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn root_banner_reports_up() {
    let app = agent_app().await;
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_is_always_200_with_status_in_body() {
    let app = agent_app().await;
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["mode"], "agent");
    assert_eq!(body["data"]["services"]["database"]["status"], "healthy");
    assert_eq!(body["data"]["services"]["jira"]["status"], "not configured");
}

#[tokio::test]
async fn health_stays_200_when_the_backend_is_down() {
    let app = app_with(
        memory_config(),
        vec![Candidate {
            provenance: Provenance::Agent,
            backend: Arc::new(MockBackend::unreachable("agent")),
        }],
    )
    .await;

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(
        body["data"]["services"]["ai_backend"]["status"],
        "unavailable"
    );
}

#[tokio::test]
async fn generate_returns_sql_with_preferred_provenance() {
    let app = agent_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sql/generate",
            json!({ "query": "show all customers" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["sql"], "SELECT * FROM customers");
    assert_eq!(body["data"]["mode"], "agent");
    assert!(body["data"]["explanation"].as_str().is_some());
}

#[tokio::test]
async fn execute_runs_the_query_and_explains_it() {
    let app = agent_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sql/execute",
            json!({ "query": "show all customers" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["source"], "database");
    assert_eq!(body["data"]["row_count"], 3);
    assert_eq!(body["data"]["truncated"], false);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 3);
    assert!(body["data"]["execution_time_ms"].is_u64());
    assert!(
        body["data"]["explanation"]
            .as_str()
            .unwrap()
            .contains("3 rows")
    );
}

#[tokio::test]
async fn repeated_generation_stays_guard_valid() {
    let app = agent_app().await;

    let mut statements = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sql/generate",
                json!({ "query": "show all customers" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        statements.push(body["data"]["sql"].as_str().unwrap().to_string());
    }

    // Generation may be non-deterministic in general, so assert validity
    // against the guard rather than byte equality.
    for sql in &statements {
        assert!(guard::check(sql).is_ok());
    }
}

#[tokio::test]
async fn fallback_answers_are_tagged_distinctly() {
    let app = app_with(
        memory_config(),
        vec![
            Candidate {
                provenance: Provenance::Agent,
                backend: Arc::new(MockBackend::unreachable("agent")),
            },
            Candidate {
                provenance: Provenance::DirectFallback,
                backend: Arc::new(MockBackend::new("direct")),
            },
        ],
    )
    .await;

    let response = app
        .oneshot(post_json(
            "/api/sql/generate",
            json!({ "query": "show all customers" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["mode"], "direct-fallback");
    assert_eq!(body["data"]["sql"], "SELECT * FROM customers");
}

#[tokio::test]
async fn unreachable_backends_answer_503_with_no_data() {
    let app = app_with(
        memory_config(),
        vec![
            Candidate {
                provenance: Provenance::Agent,
                backend: Arc::new(MockBackend::unreachable("agent")),
            },
            Candidate {
                provenance: Provenance::DirectFallback,
                backend: Arc::new(MockBackend::unreachable("direct")),
            },
        ],
    )
    .await;

    let response = app
        .oneshot(post_json(
            "/api/sql/execute",
            json!({ "query": "show all customers" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn unsafe_generations_are_rejected_before_execution() {
    let app = app_with(
        memory_config(),
        vec![Candidate {
            provenance: Provenance::Agent,
            backend: Arc::new(MockBackend::scripted("agent", "DROP TABLE customers")),
        }],
    )
    .await;

    let response = app
        .oneshot(post_json(
            "/api/sql/execute",
            json!({ "query": "remove the customers table" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["sql"], "DROP TABLE customers");
    assert!(body["data"]["reason"].as_str().is_some());
}

#[tokio::test]
async fn row_ceiling_truncates_and_flags_the_result() {
    let mut config = memory_config();
    config.database.max_result_rows = 2;

    let app = app_with(
        config,
        vec![Candidate {
            provenance: Provenance::Agent,
            backend: Arc::new(MockBackend::new("agent")),
        }],
    )
    .await;

    let response = app
        .oneshot(post_json(
            "/api/sql/execute",
            json!({ "query": "show all customers" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["row_count"], 2);
    assert_eq!(body["data"]["truncated"], true);
}

#[tokio::test]
async fn failed_execution_returns_flagged_sample_rows() {
    let app = app_with(
        memory_config(),
        vec![Candidate {
            provenance: Provenance::Agent,
            backend: Arc::new(MockBackend::scripted(
                "agent",
                "SELECT * FROM order_history",
            )),
        }],
    )
    .await;

    let response = app
        .oneshot(post_json(
            "/api/sql/execute",
            json!({ "query": "order history" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["source"], "synthetic");
    assert!(body["message"].as_str().unwrap().contains("sample"));
}

#[tokio::test]
async fn blank_questions_are_bad_requests() {
    let app = agent_app().await;
    let response = app
        .oneshot(post_json("/api/sql/generate", json!({ "query": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("blank"));
}

#[tokio::test]
async fn missing_query_field_is_a_bad_request() {
    let app = agent_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sql/generate",
            json!({ "jira_issue_key": "SALES-42" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn schema_endpoint_reports_tables_and_relationships() {
    let app = agent_app().await;
    let response = app.oneshot(get("/api/db/schema")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let tables = body["data"]["tables"].as_array().unwrap();
    let names: Vec<&str> = tables
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"customers"));
    assert!(names.contains(&"orders"));
    assert!(names.contains(&"products"));

    let customers = tables.iter().find(|t| t["name"] == "customers").unwrap();
    let id = customers["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "id")
        .unwrap();
    assert_eq!(id["is_primary_key"], true);
    assert_eq!(id["is_nullable"], false);

    let relationships = body["data"]["relationships"].as_array().unwrap();
    assert!(relationships.iter().any(|r| {
        r["from"] == "orders.customer_id" && r["to"] == "customers.id"
    }));
}

#[tokio::test]
async fn jira_routes_without_credentials_are_unavailable() {
    let app = agent_app().await;
    let response = app.oneshot(get("/api/jira/issues/SALES-42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn unknown_routes_get_the_envelope_404() {
    let app = agent_app().await;
    let response = app.oneshot(get("/api/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
}
