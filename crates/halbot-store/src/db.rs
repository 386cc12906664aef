//! SQLite connection handle.
//!
//! [`Database`] keeps one `rusqlite::Connection` behind an `Arc<Mutex<_>>`
//! and runs every call through `tokio::task::spawn_blocking`, so async
//! callers never block the runtime on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe, cloneable handle to a SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and apply connection pragmas.
    ///
    /// Blocks on file I/O; call during startup or from `spawn_blocking`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database file and bring its schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let db = tokio::task::spawn_blocking(move || Self::open(path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.execute(migration::run_all).await
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// ```ignore
    /// let n: i64 = db
    ///     .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM prefs", [], |r| r.get(0))?))
    ///     .await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL lets readers proceed while a preference write is in flight.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Wait for competing writers instead of failing with SQLITE_BUSY.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("database pragmas applied");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
