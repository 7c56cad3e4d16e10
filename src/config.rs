use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the DuckDB database file (`:memory:` for an in-memory store).
    pub path: String,
    pub pool_size: usize,
    /// How long a request may wait for a pooled connection before the call
    /// is answered with `ServiceUnavailable`.
    pub acquire_timeout_secs: u64,
    /// Row ceiling for query results; rows beyond it are dropped and the
    /// response is marked truncated.
    pub max_result_rows: usize,
    /// Wall-clock ceiling for a single statement.
    pub query_timeout_ms: u64,
    /// Create the demo retail schema when the database has no tables yet.
    pub seed_demo: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Preferred backend mode: "agent" or "direct".
    pub mode: String,
    pub model: String,
    /// Base URL of the OpenAI-compatible API (direct mode).
    pub api_url: String,
    pub api_key: Option<String>,
    /// Base URL of the agent sidecar service (agent mode).
    pub agent_url: String,
    /// Budget for a single generation or explanation call.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub user_email: Option<String>,
    pub api_token: Option<String>,
}

impl JiraConfig {
    /// The tracker integration is active only when every credential is set.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.user_email.is_some() && self.api_token.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub ai: AiConfig,
    pub jira: JiraConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the DuckDB database file
    #[arg(long)]
    pub database: Option<String>,
}

impl AppConfig {
    /// Layered load: defaults, then an optional TOML file, then `ASKDB_*`
    /// environment variables, then the conventional variable names the
    /// service has always honored, then CLI flags.
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("web.host", "0.0.0.0")?
            .set_default("web.port", 8000_i64)?
            .set_default("database.path", "askdb.duckdb")?
            .set_default("database.pool_size", 8_i64)?
            .set_default("database.acquire_timeout_secs", 5_i64)?
            .set_default("database.max_result_rows", 500_i64)?
            .set_default("database.query_timeout_ms", 10_000_i64)?
            .set_default("database.seed_demo", true)?
            .set_default("ai.mode", "agent")?
            .set_default("ai.model", "gpt-4o")?
            .set_default("ai.api_url", "https://api.openai.com/v1")?
            .set_default("ai.agent_url", "http://localhost:8080")?
            .set_default("ai.request_timeout_secs", 30_i64)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations =
                vec!["askdb.toml", "config/askdb.toml", "/etc/askdb/config.toml"];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // ASKDB_AI__MODE=direct style overrides
        config_builder =
            config_builder.add_source(config::Environment::with_prefix("ASKDB").separator("__"));

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Conventional environment names, kept for operators of the
        // pre-existing deployment.
        if let Some(v) = env_value("AI_INTERACTION_MODE") {
            config.ai.mode = v;
        }
        if let Some(v) = env_value("AI_AGENT_URL") {
            config.ai.agent_url = v;
        }
        if let Some(v) = env_value("OPENAI_API_KEY") {
            config.ai.api_key = Some(v);
        }
        if let Some(v) = env_value("OPENAI_API_URL") {
            config.ai.api_url = v;
        }
        if let Some(v) = env_value("OPENAI_MODEL") {
            config.ai.model = v;
        }
        if let Some(v) = env_value("JIRA_URL") {
            config.jira.base_url = Some(v);
        }
        if let Some(v) = env_value("JIRA_USER_EMAIL") {
            config.jira.user_email = Some(v);
        }
        if let Some(v) = env_value("JIRA_API_TOKEN") {
            config.jira.api_token = Some(v);
        }
        if let Some(v) = env_value("DUCKDB_PATH") {
            config.database.path = v;
        }
        if let Some(v) = env_value("HOST") {
            config.web.host = v;
        }
        if let Some(v) = env_value("PORT") {
            config.web.port = v
                .parse()
                .map_err(|_| ConfigError::Message(format!("invalid PORT value: {v}")))?;
        }

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }

        config.ai.mode = config.ai.mode.trim().to_lowercase();

        Ok(config)
    }

    /// Non-fatal configuration findings, logged at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.ai.mode.as_str() {
            "agent" | "direct" => {}
            other => warnings.push(format!(
                "unknown ai.mode '{other}', expected 'agent' or 'direct'; startup will fail when the backend router is built"
            )),
        }

        if self.ai.mode == "direct" && self.ai.api_key.is_none() {
            warnings.push(
                "ai.mode is 'direct' but no API key is configured; SQL generation will be unavailable"
                    .to_string(),
            );
        }

        let jira_fields = [
            self.jira.base_url.is_some(),
            self.jira.user_email.is_some(),
            self.jira.api_token.is_some(),
        ];
        if jira_fields.iter().any(|set| *set) && !self.jira.is_configured() {
            warnings.push(
                "Jira integration is partially configured (needs base URL, user email, and API token); it will be disabled"
                    .to_string(),
            );
        }

        if self.database.max_result_rows == 0 {
            warnings
                .push("database.max_result_rows is 0; every query will return no rows".to_string());
        }

        warnings
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "askdb.duckdb".to_string(),
                pool_size: 8,
                acquire_timeout_secs: 5,
                max_result_rows: 500,
                query_timeout_ms: 10_000,
                seed_demo: true,
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            ai: AiConfig {
                mode: "agent".to_string(),
                model: "gpt-4o".to_string(),
                api_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                agent_url: "http://localhost:8080".to_string(),
                request_timeout_secs: 30,
            },
            jira: JiraConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prefer_agent_mode() {
        let config = AppConfig::default();
        assert_eq!(config.ai.mode, "agent");
        assert_eq!(config.web.port, 8000);
        assert!(config.database.max_result_rows > 0);
    }

    #[test]
    fn direct_mode_without_key_is_flagged() {
        let mut config = AppConfig::default();
        config.ai.mode = "direct".to_string();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("no API key")));
    }

    #[test]
    fn unknown_mode_warns_that_startup_will_fail() {
        let mut config = AppConfig::default();
        config.ai.mode = "hybrid".to_string();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("startup will fail")));
    }

    #[test]
    fn partial_jira_config_is_flagged() {
        let mut config = AppConfig::default();
        config.jira.base_url = Some("https://example.atlassian.net".to_string());
        assert!(!config.jira.is_configured());
        assert!(config.validate().iter().any(|w| w.contains("Jira")));
    }

    #[test]
    fn full_jira_config_is_quiet() {
        let mut config = AppConfig::default();
        config.jira.base_url = Some("https://example.atlassian.net".to_string());
        config.jira.user_email = Some("ops@example.com".to_string());
        config.jira.api_token = Some("token".to_string());
        assert!(config.jira.is_configured());
        assert!(config.validate().is_empty());
    }
}
