//! Health reporting: live probes of each subsystem plus a registry of
//! degradations observed while serving real requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::time::timeout;

use crate::ai::router::ModeRouter;
use crate::ai::{AiMode, PROBE_TIMEOUT};
use crate::db::pool::DbPool;
use crate::jira::JiraClient;

/// Records subsystems that failed while handling a request. The next health
/// check reports the failure once, then the flag clears; a subsystem that
/// keeps failing keeps getting re-flagged.
#[derive(Default)]
pub struct HealthRegistry {
    degraded: Mutex<HashMap<String, String>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_degraded(&self, subsystem: &str, reason: impl Into<String>) {
        if let Ok(mut degraded) = self.degraded.lock() {
            degraded.insert(subsystem.to_string(), reason.into());
        }
    }

    pub fn degradation(&self, subsystem: &str) -> Option<String> {
        self.degraded
            .lock()
            .ok()
            .and_then(|degraded| degraded.get(subsystem).cloned())
    }

    pub fn clear(&self, subsystem: &str) -> Option<String> {
        self.degraded
            .lock()
            .ok()
            .and_then(|mut degraded| degraded.remove(subsystem))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubsystemStatus {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "degraded")]
    Degraded,
    #[serde(rename = "unavailable")]
    Unavailable,
    #[serde(rename = "not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubsystemHealth {
    pub status: SubsystemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubsystemHealth {
    fn healthy() -> Self {
        Self {
            status: SubsystemStatus::Healthy,
            detail: None,
        }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: SubsystemStatus::Degraded,
            detail: Some(detail.into()),
        }
    }

    fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: SubsystemStatus::Unavailable,
            detail: Some(detail.into()),
        }
    }

    fn not_configured() -> Self {
        Self {
            status: SubsystemStatus::NotConfigured,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "degraded")]
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: OverallStatus,
    pub mode: AiMode,
    pub uptime_seconds: u64,
    pub services: BTreeMap<String, SubsystemHealth>,
}

pub struct HealthMonitor {
    pool: DbPool,
    router: Arc<ModeRouter>,
    jira: Option<Arc<JiraClient>>,
    registry: Arc<HealthRegistry>,
    started_at: DateTime<Utc>,
}

impl HealthMonitor {
    pub fn new(
        pool: DbPool,
        router: Arc<ModeRouter>,
        jira: Option<Arc<JiraClient>>,
        registry: Arc<HealthRegistry>,
    ) -> Self {
        Self {
            pool,
            router,
            jira,
            registry,
            started_at: Utc::now(),
        }
    }

    /// Probes every subsystem concurrently and classifies each one. The
    /// overall status ignores the issue tracker: it is advisory context,
    /// not part of the answer path.
    pub async fn check(&self) -> HealthSnapshot {
        let (database, backend, tracker) = tokio::join!(
            self.probe_database(),
            self.probe_backend(),
            self.probe_tracker()
        );

        let answer_path_ok = [&database, &backend].into_iter().all(|subsystem| {
            matches!(
                subsystem.status,
                SubsystemStatus::Healthy | SubsystemStatus::NotConfigured
            )
        });

        let mut services = BTreeMap::new();
        services.insert("gateway".to_string(), SubsystemHealth::healthy());
        services.insert("database".to_string(), database);
        services.insert("ai_backend".to_string(), backend);
        services.insert("jira".to_string(), tracker);

        HealthSnapshot {
            status: if answer_path_ok {
                OverallStatus::Ok
            } else {
                OverallStatus::Degraded
            },
            mode: self.router.mode(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            services,
        }
    }

    async fn probe_database(&self) -> SubsystemHealth {
        let pool = self.pool.clone();
        let probe = tokio::task::spawn_blocking(move || -> Result<(), String> {
            let conn = pool.get().map_err(|e| e.to_string())?;
            conn.execute("SELECT 1", []).map_err(|e| e.to_string())?;
            Ok(())
        });

        match timeout(PROBE_TIMEOUT, probe).await {
            Err(_) => SubsystemHealth::unavailable("probe timed out"),
            Ok(Err(e)) => SubsystemHealth::unavailable(format!("probe task failed: {}", e)),
            Ok(Ok(Err(reason))) => SubsystemHealth::unavailable(reason),
            Ok(Ok(Ok(()))) => self.resolve("database"),
        }
    }

    async fn probe_backend(&self) -> SubsystemHealth {
        let Some(candidate) = self.router.preferred() else {
            return SubsystemHealth::not_configured();
        };

        match timeout(PROBE_TIMEOUT, candidate.backend.probe()).await {
            Err(_) => SubsystemHealth::unavailable("probe timed out"),
            Ok(Err(e)) => SubsystemHealth::unavailable(e.to_string()),
            Ok(Ok(())) => self.resolve(candidate.backend.name()),
        }
    }

    async fn probe_tracker(&self) -> SubsystemHealth {
        let Some(jira) = &self.jira else {
            return SubsystemHealth::not_configured();
        };

        match jira.probe().await {
            Ok(()) => self.resolve("jira"),
            Err(e) => SubsystemHealth::unavailable(e.to_string()),
        }
    }

    /// A responsive subsystem that failed during real work since the last
    /// check is reported degraded exactly once.
    fn resolve(&self, subsystem: &str) -> SubsystemHealth {
        match self.registry.clear(subsystem) {
            Some(reason) => SubsystemHealth::degraded(reason),
            None => SubsystemHealth::healthy(),
        }
    }
}
