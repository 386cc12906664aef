//! Schema migrations.
//!
//! Each migration is a static SQL batch tagged with a version.  Applied
//! versions are recorded in `_migrations`, so running the set again only
//! applies what is missing.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Append new migrations at the end; versions must increase.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "prefs — scoped plugin preferences",
        sql: r#"
            CREATE TABLE prefs (
                scope      TEXT NOT NULL CHECK (scope IN ('room', 'broker', 'global')),
                room       TEXT NOT NULL DEFAULT '',
                broker     TEXT NOT NULL DEFAULT '',
                plugin     TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (scope, room, broker, plugin, key)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "prefs — lookup by plugin for management listings",
        sql: r#"
            CREATE INDEX idx_prefs_plugin ON prefs(plugin, key);
        "#,
    },
];

/// Apply every pending migration.
///
/// Synchronous; run it on the blocking pool.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;

    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(current_version = current, "database schema is up to date");
    } else {
        info!(applied, new_version = latest_version(), "migrations applied");
    }
    Ok(())
}

/// Highest applied version, or 0 on a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    })
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Run one migration and its bookkeeping row in a single transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let fail = |message: String| StoreError::Migration {
        version: migration.version,
        message,
    };

    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `Connection::transaction` needs `&mut`; the shared handle only gives `&`.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| fail(format!("failed to begin transaction: {e}")))?;

    let result = tx
        .execute_batch(migration.sql)
        .map_err(|e| fail(format!("SQL execution failed: {e}")))
        .and_then(|()| {
            tx.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    migration.version,
                    migration.description,
                    chrono::Utc::now().timestamp()
                ],
            )
            .map(|_| ())
            .map_err(|e| fail(format!("failed to record migration: {e}")))
        });

    match result {
        Ok(()) => tx
            .commit()
            .map_err(|e| fail(format!("failed to commit: {e}"))),
        Err(err) => {
            // Dropping `tx` rolls back.
            warn!(version = migration.version, %err, "migration failed, rolling back");
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn run_all_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, i64::from(latest_version()));
    }

    #[test]
    fn prefs_primary_key_is_the_full_scope() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let insert = "INSERT INTO prefs (scope, room, broker, plugin, key, value, updated_at) \
                      VALUES (?1, ?2, ?3, 'echo', 'prefix', 'x', 0)";
        conn.execute(insert, ["room", "r1", "irc"]).unwrap();
        conn.execute(insert, ["room", "r2", "irc"]).unwrap();
        conn.execute(insert, ["room", "r1", "slack"]).unwrap();
        conn.execute(insert, ["room", "", "irc"]).unwrap();
        conn.execute(insert, ["broker", "", "irc"]).unwrap();
        assert!(conn.execute(insert, ["room", "r1", "irc"]).is_err());
    }

    #[test]
    fn prefs_rejects_unknown_scope() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let inserted = conn.execute(
            "INSERT INTO prefs (scope, room, broker, plugin, key, value, updated_at) \
             VALUES ('any', '', '', 'echo', 'prefix', 'x', 0)",
            [],
        );
        assert!(inserted.is_err());
    }
}
