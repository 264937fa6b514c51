use std::str::FromStr;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::db::schema::SQLITE_INIT;
use crate::error::RelayError;

pub type SqlitePool = Pool<Sqlite>;

/// One pooled connection, held for the duration of a persistence operation.
/// Returned to the pool when dropped, on every exit path.
pub type Session = PoolConnection<Sqlite>;

#[derive(Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    ///
    /// An in-memory database lives and dies with its connection, so such URLs get
    /// a single connection that is never reaped.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RelayError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_opts = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if database_url.contains(":memory:") || database_url.contains("mode=memory") {
            pool_opts = pool_opts
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(connect_opts).await?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url = %database_url, "user storage ready");
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Acquire a scoped session.
    pub async fn session(&self) -> Result<Session, RelayError> {
        Ok(self.pool.acquire().await?)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), RelayError> {
        // execute multiple statements one at a time; sqlx::query runs a single statement
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }
}
