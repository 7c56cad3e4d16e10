use std::time::Duration;

use duckdb::Connection;
use r2d2::{ManageConnection, Pool};

use crate::config::DatabaseConfig;

pub type DbPool = Pool<DuckDbConnectionManager>;

pub struct DuckDbConnectionManager {
    path: String,
}

impl DuckDbConnectionManager {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.path)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Builds the bounded connection pool.
///
/// Checkout waits are capped by `acquire_timeout_secs`; callers translate an
/// exhausted pool into a service-unavailable answer rather than queueing
/// forever. Note that every pooled connection to `:memory:` opens its own
/// private database, so in-memory use needs `pool_size = 1`.
pub fn build_pool(config: &DatabaseConfig) -> Result<DbPool, r2d2::Error> {
    Pool::builder()
        .max_size(config.pool_size.max(1) as u32)
        .connection_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .build(DuckDbConnectionManager::new(config.path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            path: ":memory:".to_string(),
            pool_size: 1,
            acquire_timeout_secs: 2,
            max_result_rows: 100,
            query_timeout_ms: 5_000,
            seed_demo: false,
        }
    }

    #[test]
    fn pool_hands_out_working_connections() {
        let pool = build_pool(&memory_config()).unwrap();
        let conn = pool.get().unwrap();
        let one: i32 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn pool_size_never_drops_to_zero() {
        let mut config = memory_config();
        config.pool_size = 0;
        let pool = build_pool(&config).unwrap();
        assert!(pool.get().is_ok());
    }
}
