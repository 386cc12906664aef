//! Plugin definitions.
//!
//! A [`Plugin`] is a named event handler plus the metadata the registry needs
//! to route events to it: a default match pattern, a settings template and
//! the secrets it requires.  Plugins are built once at startup with
//! [`Plugin::builder`], shared as `Arc<Plugin>`, and never mutated.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use halbot_kernel::{NamedBroker, Plugin, Registry};
//! let echo = Plugin::builder("echo")
//!     .pattern("^!echo")
//!     .setting("prefix", "> ", false)
//!     .handler(|evt| println!("{}", evt.body))
//!     .build();
//!
//! let registry = Registry::new();
//! assert!(registry.register_plugin(Arc::clone(&echo)));
//!
//! let inst = echo.instance("r1", Arc::new(NamedBroker::new("irc")));
//! registry.register_instance(inst).unwrap();
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::broker::{Broker, Event};
use crate::instance::Instance;

/// Callback invoked for every event matched to an instance.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Callback invoked once when an instance is registered.
pub type InitHook = Arc<dyn Fn(&Instance) + Send + Sync>;

/// One entry of a plugin's settings template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDescriptor {
    pub key: String,
    /// Value used when the preference store has nothing for this key.
    pub default: String,
    pub required: bool,
}

/// A registered handler definition.
pub struct Plugin {
    name: String,
    description: Option<String>,
    handler: Handler,
    init_hook: Option<InitHook>,
    default_pattern: String,
    settings_template: Vec<SettingDescriptor>,
    secret_names: BTreeSet<String>,
}

impl Plugin {
    /// Start building a plugin with the given unique name.
    pub fn builder(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            name: name.into(),
            description: None,
            handler: None,
            init_hook: None,
            default_pattern: String::new(),
            settings_template: Vec::new(),
            secret_names: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The pattern used by instances that do not specify their own.
    pub fn default_pattern(&self) -> &str {
        &self.default_pattern
    }

    pub fn settings_template(&self) -> &[SettingDescriptor] {
        &self.settings_template
    }

    pub fn secret_names(&self) -> &BTreeSet<String> {
        &self.secret_names
    }

    pub(crate) fn init_hook(&self) -> Option<&InitHook> {
        self.init_hook.as_ref()
    }

    /// Run the handler for `event`.
    pub fn handle(&self, event: &Event) {
        (self.handler)(event)
    }

    /// Create an instance of this plugin bound to `room_id` on `broker`.
    ///
    /// The instance is *not* routable until it is passed to
    /// [`Registry::register_instance`](crate::registry::Registry::register_instance).
    pub fn instance(self: &Arc<Self>, room_id: impl Into<String>, broker: Arc<dyn Broker>) -> Instance {
        Instance::new(Arc::clone(self), room_id.into(), broker)
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("default_pattern", &self.default_pattern)
            .field("settings_template", &self.settings_template)
            .field("secret_names", &self.secret_names)
            .field("has_init_hook", &self.init_hook.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Plugin`].
pub struct PluginBuilder {
    name: String,
    description: Option<String>,
    handler: Option<Handler>,
    init_hook: Option<InitHook>,
    default_pattern: String,
    settings_template: Vec<SettingDescriptor>,
    secret_names: BTreeSet<String>,
}

impl PluginBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the event handler.  Without one the plugin ignores its events.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set a hook that runs when an instance of this plugin is registered.
    ///
    /// The hook runs while the registry lock is held.  It must be quick and
    /// must not call back into the registry.
    pub fn init_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) + Send + Sync + 'static,
    {
        self.init_hook = Some(Arc::new(hook));
        self
    }

    /// Set the default match pattern.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.default_pattern = pattern.into();
        self
    }

    /// Append a setting to the template.  Order is preserved.
    pub fn setting(mut self, key: impl Into<String>, default: impl Into<String>, required: bool) -> Self {
        self.settings_template.push(SettingDescriptor {
            key: key.into(),
            default: default.into(),
            required,
        });
        self
    }

    /// Declare a secret the plugin needs.
    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secret_names.insert(name.into());
        self
    }

    pub fn build(self) -> Arc<Plugin> {
        Arc::new(Plugin {
            name: self.name,
            description: self.description,
            handler: self.handler.unwrap_or_else(|| Arc::new(|_: &Event| {})),
            init_hook: self.init_hook,
            default_pattern: self.default_pattern,
            settings_template: self.settings_template,
            secret_names: self.secret_names,
        })
    }
}
