//! Shared application state, built once at startup.

use std::sync::Arc;

use thiserror::Error;

use crate::ai::ProviderError;
use crate::ai::router::ModeRouter;
use crate::config::AppConfig;
use crate::db::executor::QueryLimits;
use crate::db::pool::DbPool;
use crate::health::{HealthMonitor, HealthRegistry};
use crate::jira::{JiraClient, JiraError};
use crate::pipeline::Pipeline;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("AI backend setup failed: {0}")]
    Ai(#[from] ProviderError),

    #[error("jira client setup failed: {0}")]
    Jira(#[from] JiraError),
}

pub struct AppState {
    pub config: AppConfig,
    pub pool: DbPool,
    pub jira: Option<Arc<JiraClient>>,
    pub pipeline: Pipeline,
    pub monitor: HealthMonitor,
}

impl AppState {
    /// Wires the full state from config: backend candidates, the optional
    /// tracker client, the pipeline, and the health monitor.
    pub fn new(config: AppConfig, pool: DbPool) -> Result<Self, StateError> {
        let registry = Arc::new(HealthRegistry::new());
        let router = Arc::new(ModeRouter::from_config(&config.ai, registry.clone())?);
        let jira = JiraClient::from_config(&config.jira)?.map(Arc::new);
        Ok(Self::assemble(config, pool, router, jira, registry))
    }

    /// Assembly from pre-built parts; the integration tests use this with
    /// mock backends in the router.
    pub fn assemble(
        config: AppConfig,
        pool: DbPool,
        router: Arc<ModeRouter>,
        jira: Option<Arc<JiraClient>>,
        registry: Arc<HealthRegistry>,
    ) -> Self {
        let limits = QueryLimits::from_config(&config.database);
        let pipeline = Pipeline::new(
            pool.clone(),
            router.clone(),
            jira.clone(),
            registry.clone(),
            limits,
        );
        let monitor = HealthMonitor::new(pool.clone(), router, jira.clone(), registry);

        Self {
            config,
            pool,
            jira,
            pipeline,
            monitor,
        }
    }
}
