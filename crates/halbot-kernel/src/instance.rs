//! Plugin instances.
//!
//! An [`Instance`] binds a [`Plugin`] to one room on one broker.  It owns the
//! compiled match pattern and a private snapshot of its settings.  Instances
//! are shared as `Arc<Instance>` and compared by pointer identity; there is
//! no instance id.
//!
//! The compiled pattern is written once, by the first successful
//! registration, and never changes afterwards.  Settings may be reloaded or
//! saved at any time, registered or not.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::broker::{Broker, Event};
use crate::error::{KernelError, Result};
use crate::plugin::Plugin;
use crate::prefs::{PrefKey, PreferenceStore};

/// A resolved setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// A live binding of a plugin to a room and broker.
#[derive(Debug)]
pub struct Instance {
    plugin: Arc<Plugin>,
    room_id: String,
    broker: Arc<dyn Broker>,
    /// Requested pattern; empty means "use the plugin default".
    pattern: String,
    compiled: OnceLock<Regex>,
    settings: RwLock<Vec<Setting>>,
}

impl Instance {
    pub(crate) fn new(plugin: Arc<Plugin>, room_id: String, broker: Arc<dyn Broker>) -> Self {
        let defaults = plugin
            .settings_template()
            .iter()
            .map(|d| Setting {
                key: d.key.clone(),
                value: d.default.clone(),
            })
            .collect();

        Self {
            plugin,
            room_id,
            broker,
            pattern: String::new(),
            compiled: OnceLock::new(),
            settings: RwLock::new(defaults),
        }
    }

    /// Override the plugin's default pattern for this instance.
    ///
    /// An empty string restores the default.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn plugin(&self) -> &Arc<Plugin> {
        &self.plugin
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn broker_name(&self) -> &str {
        self.broker.name()
    }

    /// The effective match pattern.
    pub fn pattern(&self) -> &str {
        if self.pattern.is_empty() {
            self.plugin.default_pattern()
        } else {
            &self.pattern
        }
    }

    /// Whether the instance has been through a successful registration.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Test `text` against the compiled pattern.
    ///
    /// Always `false` for an instance that was never registered.
    pub fn matches(&self, text: &str) -> bool {
        self.compiled.get().is_some_and(|re| re.is_match(text))
    }

    /// Hand `event` to the plugin's handler.
    pub fn fire(&self, event: &Event) {
        self.plugin.handle(event)
    }

    /// Compile the effective pattern unless that already happened.
    pub(crate) fn compile(&self) -> Result<()> {
        if self.compiled.get().is_some() {
            return Ok(());
        }

        let pattern = self.pattern();
        let re = Regex::new(pattern).map_err(|e| KernelError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        // A lost race means another registration stored the same pattern.
        let _ = self.compiled.set(re);
        Ok(())
    }

    // -- Settings -----------------------------------------------------------

    /// Scoped preference key for one of this instance's settings.
    pub fn pref_key(&self, key: &str) -> PrefKey {
        PrefKey::new(&self.room_id, self.broker.name(), self.plugin.name(), key)
    }

    /// Snapshot of the current settings, in template order.
    pub fn settings(&self) -> Vec<Setting> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.clone())
    }

    /// Change one setting in memory.  Call
    /// [`save_settings_to_prefs`](Self::save_settings_to_prefs) to persist it.
    pub fn set_setting(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        let slot = settings
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or_else(|| KernelError::UnknownSetting {
                instance: self.to_string(),
                key: key.to_owned(),
            })?;
        slot.value = value.into();
        Ok(())
    }

    /// Keys of required settings whose current value is empty.
    pub fn missing_required_settings(&self) -> Vec<String> {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        self.plugin
            .settings_template()
            .iter()
            .filter(|d| d.required)
            .filter(|d| {
                settings
                    .iter()
                    .find(|s| s.key == d.key)
                    .is_none_or(|s| s.value.is_empty())
            })
            .map(|d| d.key.clone())
            .collect()
    }

    /// Resolve every templated setting from `store` and replace the snapshot.
    ///
    /// Keys the store has no value for take the template default.  If any
    /// lookup fails the previous snapshot is left in place.
    pub async fn load_settings_from_prefs(&self, store: &dyn PreferenceStore) -> Result<()> {
        let template = self.plugin.settings_template();
        let mut resolved = Vec::with_capacity(template.len());
        let mut failed = Vec::new();

        for descriptor in template {
            let key = self.pref_key(&descriptor.key);
            match store.resolve(&key).await {
                Ok(value) => resolved.push(Setting {
                    key: descriptor.key.clone(),
                    value: value.unwrap_or_else(|| descriptor.default.clone()),
                }),
                Err(e) => {
                    warn!(instance = %self, pref = %key, error = %e, "failed to resolve setting");
                    failed.push(descriptor.key.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(KernelError::SettingsFailed {
                instance: self.to_string(),
                operation: "load",
                keys: failed,
            });
        }

        debug!(instance = %self, count = resolved.len(), "settings loaded");
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = resolved;
        Ok(())
    }

    /// Write every current setting back to `store`, one key at a time.
    ///
    /// All writes are attempted; failures are reported together afterwards.
    pub async fn save_settings_to_prefs(&self, store: &dyn PreferenceStore) -> Result<()> {
        let snapshot = self.settings();
        let mut failed = Vec::new();

        for setting in &snapshot {
            let key = self.pref_key(&setting.key);
            if let Err(e) = store.persist(&key, &setting.value).await {
                warn!(instance = %self, pref = %key, error = %e, "failed to persist setting");
                failed.push(setting.key.clone());
            }
        }

        if !failed.is_empty() {
            return Err(KernelError::SettingsFailed {
                instance: self.to_string(),
                operation: "save",
                keys: failed,
            });
        }

        debug!(instance = %self, count = snapshot.len(), "settings saved");
        Ok(())
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plugin.name(), self.room_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
