//! Connection pools for the study database
//!
//! Single-node installs keep everything in one SQLite file next to the
//! binary; shared deployments point at MySQL. Both sit behind
//! [`DatabasePool`], and repositories borrow the concrete sqlx pool for the
//! driver they run on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// Grading a card writes the card and its review log in one transaction;
/// concurrent graders wait this long for the SQLite write lock.
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement and return the affected row count
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round trip to the server, used by the health endpoint
    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// Where a SQLite URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    /// Accepts `:memory:`, `sqlite:` URLs (query string ignored) and bare paths
    pub fn parse(url: &str) -> Self {
        if url == ":memory:" || url.starts_with("sqlite::memory:") {
            return Self::Memory;
        }
        let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        Self::File(PathBuf::from(path))
    }
}

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let target = SqliteTarget::parse(url);
        let (options, pool_options) = match &target {
            // Every connection to `:memory:` is a fresh database, so the
            // migrated schema only survives on a single pinned connection
            SqliteTarget::Memory => (
                SqliteConnectOptions::from_str("sqlite::memory:")?,
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
            ),
            SqliteTarget::File(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create database directory: {:?}", dir))?;
                }
                (
                    SqliteConnectOptions::new()
                        .filename(path)
                        .create_if_missing(true)
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal)
                        .busy_timeout(SQLITE_BUSY_TIMEOUT),
                    SqlitePoolOptions::new().max_connections(SQLITE_MAX_CONNECTIONS),
                )
            }
        };

        // Cascading deletes (decks, questions, exams) rely on enforced keys
        let pool = pool_options
            .connect_with(options.foreign_keys(true))
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", url))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to MySQL; a missing `mysql://` scheme is added.
    pub async fn new(url: &str) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL database")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

macro_rules! impl_database_pool {
    (@pick $pool:expr, Some) => {
        Some($pool)
    };
    (@pick $pool:expr, None) => {
        None
    };
    ($ty:ty, $driver:expr, sqlite: $sqlite:ident, mysql: $mysql:ident) => {
        #[async_trait]
        impl DatabasePool for $ty {
            async fn execute(&self, query: &str) -> Result<u64> {
                let done = sqlx::query(query)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute: {}", query))?;
                Ok(done.rows_affected())
            }

            async fn ping(&self) -> Result<()> {
                sqlx::query("SELECT 1")
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("{:?} database unreachable", $driver))?;
                Ok(())
            }

            async fn close(&self) {
                self.pool.close().await;
            }

            fn driver(&self) -> DatabaseDriver {
                $driver
            }

            fn as_sqlite(&self) -> Option<&SqlitePool> {
                impl_database_pool!(@pick &self.pool, $sqlite)
            }

            fn as_mysql(&self) -> Option<&MySqlPool> {
                impl_database_pool!(@pick &self.pool, $mysql)
            }
        }
    };
}

impl_database_pool!(
    SqliteDatabase,
    DatabaseDriver::Sqlite,
    sqlite: Some,
    mysql: None
);
impl_database_pool!(
    MysqlDatabase,
    DatabaseDriver::Mysql,
    sqlite: None,
    mysql: Some
);

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Open the pool named by the configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::new(&config.url).await?),
    };
    tracing::info!(driver = ?config.driver, "Database pool ready");
    Ok(pool)
}

/// Private in-memory database for one test; callers run the migrations.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_target_parse() {
        assert_eq!(SqliteTarget::parse(":memory:"), SqliteTarget::Memory);
        assert_eq!(SqliteTarget::parse("sqlite::memory:?cache=shared"), SqliteTarget::Memory);
        assert_eq!(
            SqliteTarget::parse("sqlite://data/medstudy.db?mode=rwc"),
            SqliteTarget::File(PathBuf::from("data/medstudy.db"))
        );
        assert_eq!(
            SqliteTarget::parse("sqlite:medstudy.db"),
            SqliteTarget::File(PathBuf::from("medstudy.db"))
        );
        assert_eq!(
            SqliteTarget::parse("/var/lib/medstudy/study.db"),
            SqliteTarget::File(PathBuf::from("/var/lib/medstudy/study.db"))
        );
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_schema_between_queries() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_sqlite().is_some());
        assert!(pool.as_mysql().is_none());
        pool.ping().await.expect("Ping should succeed");

        pool.execute("CREATE TABLE specialties (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();
        let inserted = pool
            .execute("INSERT INTO specialties (name) VALUES ('Cardiologia'), ('Nefrologia')")
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM specialties")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_foreign_key_cascades_are_enforced() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE decks (id INTEGER PRIMARY KEY)").await.unwrap();
        pool.execute(
            "CREATE TABLE cards (id INTEGER PRIMARY KEY, \
             deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE)",
        )
        .await
        .unwrap();
        pool.execute("INSERT INTO decks (id) VALUES (1)").await.unwrap();
        pool.execute("INSERT INTO cards (deck_id) VALUES (1), (1)").await.unwrap();

        assert!(pool.execute("INSERT INTO cards (deck_id) VALUES (7)").await.is_err());
        pool.execute("DELETE FROM decks WHERE id = 1").await.unwrap();
        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cards")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal_in_nested_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("medstudy.db");

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: format!("sqlite://{}", db_path.display()),
        })
        .await
        .expect("Failed to create pool");
        assert!(db_path.exists());

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        pool.close().await;
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool_ping() {
        let url = std::env::var("MYSQL_TEST_URL").unwrap_or_else(|_| "mysql://root@localhost/medstudy_test".to_string());
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .expect("Failed to create pool");
        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        pool.ping().await.expect("Ping should succeed");
    }
}
