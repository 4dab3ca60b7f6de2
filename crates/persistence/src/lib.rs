//! Persistence layer for Smart Money Tracker
//!
//! SQLite storage for tracker checkpoints: open positions, realized P&L
//! totals, and metrics snapshot history. The schema is created on
//! connect; checkpoints replace position/P&L rows and append snapshots.

pub mod repository;
pub mod schema;
pub mod store;

pub use repository::{CheckpointRepository, PnlRow, PositionRecord, SnapshotRecord};
pub use store::{CheckpointState, CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};

pub use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the checkpoint database at `path`
    pub async fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let url = format!("sqlite:{}?mode=rwc", path.display());
        Self::connect(&url, 5).await
    }

    /// In-memory database for tests and ephemeral runs
    pub async fn in_memory() -> DbResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(url: &str, max_connections: u32) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        db.configure_pragmas().await?;
        Ok(db)
    }

    /// Create the checkpoint tables and indexes if missing. Statements
    /// run one at a time; sqlite executes only the first of a batch.
    async fn init_schema(&self) -> DbResult<()> {
        for statement in schema::CREATE_TABLES.split(';') {
            let sql: String = statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let sql = sql.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Schema(format!("{e}: {sql}")))?;
        }
        Ok(())
    }

    /// WAL keeps checkpoint writes from blocking API reads; NORMAL sync
    /// and a bigger cache (negative = KiB) are the usual WAL pairing.
    async fn configure_pragmas(&self) -> DbResult<()> {
        for pragma in ["journal_mode=WAL", "synchronous=NORMAL", "cache_size=-8000"] {
            sqlx::query(&format!("PRAGMA {pragma}"))
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Connection(format!("PRAGMA {pragma} failed: {e}")))?;
        }
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Clone the pool for use in spawned tasks
    pub fn pool_clone(&self) -> SqlitePool {
        self.pool.clone()
    }
}
