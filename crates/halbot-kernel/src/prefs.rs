//! Preference store capability.
//!
//! Instance settings are persisted in an external key/value store addressed
//! by a [`PrefKey`]: the (room, broker, plugin, key) tuple used for scoping
//! throughout the kernel.  The store itself is a collaborator; the kernel
//! ships [`MemoryPreferenceStore`] and `halbot-store` provides a SQLite
//! implementation.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fully scoped address of a single preference value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefKey {
    pub room: String,
    pub broker: String,
    pub plugin: String,
    pub key: String,
}

impl PrefKey {
    pub fn new(
        room: impl Into<String>,
        broker: impl Into<String>,
        plugin: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            broker: broker.into(),
            plugin: plugin.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for PrefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.broker, self.room, self.plugin, self.key)
    }
}

/// Backend that resolves and persists scoped preference values.
///
/// Implementations own retry and consistency; the kernel treats every call
/// as an independent best-effort operation.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Look up the stored value, or `None` when nothing is stored.
    async fn resolve(&self, key: &PrefKey) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn persist(&self, key: &PrefKey, value: &str) -> Result<()>;
}

/// In-process preference store backed by [`DashMap`].
///
/// Nothing survives a restart.  Cheap to construct; handy for tests and for
/// bots that do not need persistence.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: DashMap<PrefKey, String>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn resolve(&self, key: &PrefKey) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn persist(&self, key: &PrefKey, value: &str) -> Result<()> {
        self.values.insert(key.clone(), value.to_owned());
        Ok(())
    }
}
