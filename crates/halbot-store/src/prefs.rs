//! SQLite-backed plugin preferences.
//!
//! Values live in the `prefs` table keyed by (scope, room, broker, plugin,
//! key).  The `scope` column says which of the room and broker columns are
//! meaningful, so a room id or broker name that happens to be empty is
//! still an ordinary exact value.  Resolution goes from most to least
//! specific:
//!
//! 1. [`PrefScope::Room`]: `room`, `broker`, `plugin`, `key`
//! 2. [`PrefScope::Broker`]: any room on `broker`
//! 3. [`PrefScope::Global`]: any room on any broker
//!
//! The [`PreferenceStore`] impl only ever writes room-scoped rows.  Wider
//! defaults are written explicitly with [`SqlitePreferenceStore::set_scoped`].

use async_trait::async_trait;
use halbot_kernel::{PrefKey, PreferenceStore};
use rusqlite::OptionalExtension;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Which part of a [`PrefKey`] a stored row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefScope {
    /// Exactly one room on one broker.
    Room,
    /// Every room on one broker.
    Broker,
    /// Every room on every broker.
    Global,
}

impl PrefScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Broker => "broker",
            Self::Global => "global",
        }
    }

    /// Room and broker column values for `key` at this scope.  Columns the
    /// scope ignores are stored empty.
    fn columns(self, key: &PrefKey) -> (String, String) {
        match self {
            Self::Room => (key.room.clone(), key.broker.clone()),
            Self::Broker => (String::new(), key.broker.clone()),
            Self::Global => (String::new(), String::new()),
        }
    }
}

impl ToSql for PrefScope {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PrefScope {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "room" => Ok(Self::Room),
            "broker" => Ok(Self::Broker),
            "global" => Ok(Self::Global),
            other => Err(FromSqlError::Other(
                format!("unknown preference scope {other:?}").into(),
            )),
        }
    }
}

/// A stored preference row.  For wider scopes the ignored parts of `key`
/// are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPref {
    pub scope: PrefScope,
    pub key: PrefKey,
    pub value: String,
}

/// Preference store persisted in SQLite.
#[derive(Clone)]
pub struct SqlitePreferenceStore {
    db: Database,
}

impl SqlitePreferenceStore {
    /// Create a store backed by `db`.  The schema must already be migrated.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Room-scoped value for `key`, without wildcard fallback.
    pub async fn get(&self, key: &PrefKey) -> StoreResult<Option<String>> {
        self.get_scoped(PrefScope::Room, key).await
    }

    /// Value stored at exactly `scope`, without fallback.
    #[instrument(skip(self), fields(pref = %key, scope = scope.as_str()))]
    pub async fn get_scoped(&self, scope: PrefScope, key: &PrefKey) -> StoreResult<Option<String>> {
        let (room, broker) = scope.columns(key);
        let (plugin, name) = (key.plugin.clone(), key.key.clone());
        self.db
            .execute(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM prefs \
                         WHERE scope = ?1 AND room = ?2 AND broker = ?3 \
                           AND plugin = ?4 AND key = ?5",
                        rusqlite::params![scope, room, broker, plugin, name],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    /// Most specific stored value for `key`, following the scope order.
    #[instrument(skip(self), fields(pref = %key))]
    pub async fn lookup(&self, key: &PrefKey) -> StoreResult<Option<String>> {
        let key = key.clone();
        self.db
            .execute(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM prefs \
                         WHERE plugin = ?3 AND key = ?4 \
                           AND ((scope = 'room' AND room = ?1 AND broker = ?2) \
                             OR (scope = 'broker' AND broker = ?2) \
                             OR scope = 'global') \
                         ORDER BY CASE scope WHEN 'room' THEN 0 WHEN 'broker' THEN 1 ELSE 2 END \
                         LIMIT 1",
                        rusqlite::params![key.room, key.broker, key.plugin, key.key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    /// Insert or replace the room-scoped value for `key`.
    pub async fn set(&self, key: &PrefKey, value: &str) -> StoreResult<()> {
        self.set_scoped(PrefScope::Room, key, value).await
    }

    /// Insert or replace the value at `scope`.  Parts of `key` the scope
    /// ignores are not stored.
    #[instrument(skip(self, value), fields(pref = %key, scope = scope.as_str()))]
    pub async fn set_scoped(&self, scope: PrefScope, key: &PrefKey, value: &str) -> StoreResult<()> {
        let (room, broker) = scope.columns(key);
        let key = key.clone();
        let value = value.to_owned();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO prefs (scope, room, broker, plugin, key, value, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(scope, room, broker, plugin, key) DO UPDATE \
                     SET value = excluded.value, updated_at = excluded.updated_at",
                    rusqlite::params![
                        scope,
                        room,
                        broker,
                        key.plugin,
                        key.key,
                        value,
                        chrono::Utc::now().timestamp()
                    ],
                )?;
                debug!(pref = %key, scope = scope.as_str(), "preference stored");
                Ok(())
            })
            .await
    }

    /// Delete the room-scoped value for `key`, returning `true` if it existed.
    pub async fn delete(&self, key: &PrefKey) -> StoreResult<bool> {
        self.delete_scoped(PrefScope::Room, key).await
    }

    /// Delete the value at `scope`, returning `true` if it existed.
    #[instrument(skip(self), fields(pref = %key, scope = scope.as_str()))]
    pub async fn delete_scoped(&self, scope: PrefScope, key: &PrefKey) -> StoreResult<bool> {
        let (room, broker) = scope.columns(key);
        let (plugin, name) = (key.plugin.clone(), key.key.clone());
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM prefs \
                     WHERE scope = ?1 AND room = ?2 AND broker = ?3 \
                       AND plugin = ?4 AND key = ?5",
                    rusqlite::params![scope, room, broker, plugin, name],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Every stored value for `plugin`, across all scopes.  Wider scopes
    /// sort first within a key.
    #[instrument(skip(self))]
    pub async fn list_plugin(&self, plugin: &str) -> StoreResult<Vec<StoredPref>> {
        let plugin = plugin.to_owned();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT scope, room, broker, plugin, key, value FROM prefs \
                     WHERE plugin = ?1 \
                     ORDER BY key, CASE scope WHEN 'global' THEN 0 WHEN 'broker' THEN 1 ELSE 2 END, \
                              broker, room",
                )?;
                let rows = stmt.query_map([&plugin], |row| {
                    Ok(StoredPref {
                        scope: row.get(0)?,
                        key: PrefKey {
                            room: row.get(1)?,
                            broker: row.get(2)?,
                            plugin: row.get(3)?,
                            key: row.get(4)?,
                        },
                        value: row.get(5)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn resolve(&self, key: &PrefKey) -> halbot_kernel::Result<Option<String>> {
        self.lookup(key).await.map_err(|e| e.into_kernel(key))
    }

    async fn persist(&self, key: &PrefKey, value: &str) -> halbot_kernel::Result<()> {
        self.set(key, value).await.map_err(|e| e.into_kernel(key))
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqlitePreferenceStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SqlitePreferenceStore::new(db)
    }

    fn key(room: &str, broker: &str) -> PrefKey {
        PrefKey::new(room, broker, "karma", "max")
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = setup().await;
        assert!(store.get(&key("r1", "irc")).await.unwrap().is_none());
        assert!(store.lookup(&key("r1", "irc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = setup().await;
        store.set(&key("r1", "irc"), "1").await.unwrap();
        store.set(&key("r1", "irc"), "2").await.unwrap();
        assert_eq!(store.get(&key("r1", "irc")).await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn lookup_prefers_most_specific_scope() {
        let store = setup().await;
        store.set_scoped(PrefScope::Global, &key("r1", "irc"), "global").await.unwrap();
        assert_eq!(store.lookup(&key("r1", "irc")).await.unwrap().as_deref(), Some("global"));

        store.set_scoped(PrefScope::Broker, &key("r1", "irc"), "broker").await.unwrap();
        assert_eq!(store.lookup(&key("r1", "irc")).await.unwrap().as_deref(), Some("broker"));
        assert_eq!(store.lookup(&key("r1", "slack")).await.unwrap().as_deref(), Some("global"));

        store.set(&key("r1", "irc"), "exact").await.unwrap();
        assert_eq!(store.lookup(&key("r1", "irc")).await.unwrap().as_deref(), Some("exact"));
        assert_eq!(store.lookup(&key("r2", "irc")).await.unwrap().as_deref(), Some("broker"));
    }

    #[tokio::test]
    async fn empty_broker_is_an_exact_value() {
        let store = setup().await;
        store.set_scoped(PrefScope::Global, &key("r1", ""), "global").await.unwrap();
        store.set(&key("r1", ""), "5").await.unwrap();

        assert_eq!(store.lookup(&key("r1", "")).await.unwrap().as_deref(), Some("5"));
        assert_eq!(store.lookup(&key("r2", "")).await.unwrap().as_deref(), Some("global"));
    }

    #[tokio::test]
    async fn empty_room_is_an_exact_value() {
        let store = setup().await;
        store.set(&key("", "irc"), "1").await.unwrap();

        assert_eq!(store.lookup(&key("", "irc")).await.unwrap().as_deref(), Some("1"));
        assert!(store.lookup(&key("r7", "irc")).await.unwrap().is_none());
        assert!(store.get_scoped(PrefScope::Broker, &key("", "irc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wider_scopes_ignore_unused_key_parts() {
        let store = setup().await;
        store.set_scoped(PrefScope::Broker, &key("r1", "irc"), "b").await.unwrap();
        assert_eq!(
            store.get_scoped(PrefScope::Broker, &key("other", "irc")).await.unwrap().as_deref(),
            Some("b")
        );
        assert!(store.get(&key("r1", "irc")).await.unwrap().is_none());
        assert!(store.delete_scoped(PrefScope::Broker, &key("", "irc")).await.unwrap());
        assert!(store.lookup(&key("r1", "irc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn room_value_does_not_leak_to_other_brokers() {
        let store = setup().await;
        store.set(&key("r1", "irc"), "irc-only").await.unwrap();
        assert!(store.lookup(&key("r1", "slack")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_existing_and_missing() {
        let store = setup().await;
        store.set(&key("r1", "irc"), "1").await.unwrap();
        assert!(store.delete(&key("r1", "irc")).await.unwrap());
        assert!(!store.delete(&key("r1", "irc")).await.unwrap());
        assert!(store.get(&key("r1", "irc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_plugin_returns_all_scopes() {
        let store = setup().await;
        store.set(&key("r1", "irc"), "1").await.unwrap();
        store.set_scoped(PrefScope::Global, &key("r1", "irc"), "0").await.unwrap();
        store
            .set(&PrefKey::new("r1", "irc", "echo", "prefix"), "!")
            .await
            .unwrap();

        let listed = store.list_plugin("karma").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.key.plugin == "karma"));
        assert_eq!(listed[0].scope, PrefScope::Global);
        assert_eq!(listed[0].key.room, "");
        assert_eq!(listed[0].value, "0");
    }

    #[tokio::test]
    async fn trait_round_trip() {
        let store = setup().await;
        let prefs: &dyn PreferenceStore = &store;
        prefs.persist(&key("r1", "irc"), "7").await.unwrap();
        assert_eq!(prefs.resolve(&key("r1", "irc")).await.unwrap().as_deref(), Some("7"));
    }
}
