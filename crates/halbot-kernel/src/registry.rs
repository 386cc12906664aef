//! Plugin catalog and instance directory.
//!
//! The [`Registry`] tracks every known [`Plugin`] and every live
//! [`Instance`].  Both collections sit behind one exclusive lock: each public
//! method takes it for its full duration, so listings never observe a
//! half-applied registration.  Register/unregister traffic is low compared to
//! event traffic, which only reads snapshots.
//!
//! The registry is cheaply cloneable (`Arc`-backed) and `Send + Sync`.
//! Construct it once at startup and hand clones to the dispatch loop and
//! management commands.
//!
//! # Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use halbot_kernel::{NamedBroker, Plugin, Registry};
//! let registry = Registry::new();
//! let ping = Plugin::builder("ping").pattern("^!ping").build();
//! registry.register_plugin(Arc::clone(&ping));
//!
//! let inst = registry
//!     .register_instance(ping.instance("r1", Arc::new(NamedBroker::new("irc"))))
//!     .unwrap();
//! assert!(inst.matches("!ping"));
//! assert_eq!(registry.find_instances("r1", "irc", "ping").len(), 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::broker::Event;
use crate::error::{KernelError, Result};
use crate::instance::Instance;
use crate::plugin::Plugin;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Process-wide plugin and instance registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Registration order is preserved for listings.
    plugins: Vec<Arc<Plugin>>,
    instances: Vec<Arc<Instance>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation leaves both vectors consistent, so a poisoned lock is
    /// safe to reuse.
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Mutation -----------------------------------------------------------

    /// Add a plugin to the catalog.
    ///
    /// Returns `false` without replacing anything if a plugin with the same
    /// name is already registered.
    pub fn register_plugin(&self, plugin: Arc<Plugin>) -> bool {
        let mut inner = self.lock();

        if inner.plugins.iter().any(|p| p.name() == plugin.name()) {
            warn!(plugin = %plugin, "ignoring duplicate plugin registration");
            return false;
        }

        info!(plugin = %plugin, "plugin registered");
        inner.plugins.push(plugin);
        true
    }

    /// Make an instance routable.
    ///
    /// The effective pattern is compiled first; on failure the error is
    /// returned and the directory is left untouched.  The plugin's init hook
    /// then runs under the registry lock, before the instance becomes visible
    /// to any listing.
    ///
    /// Registering the same instance twice adds a second entry.
    pub fn register_instance(&self, instance: impl Into<Arc<Instance>>) -> Result<Arc<Instance>> {
        let instance = instance.into();
        let mut inner = self.lock();

        instance.compile()?;

        if let Some(hook) = instance.plugin().init_hook() {
            hook(&*instance);
        }

        inner.instances.push(Arc::clone(&instance));

        info!(
            plugin = %instance.plugin(),
            room_id = %instance.room_id(),
            broker = %instance.broker_name(),
            pattern = %instance.pattern(),
            "instance registered"
        );

        Ok(instance)
    }

    /// Remove the first directory entry that is `instance` itself.
    ///
    /// Fails with [`KernelError::InstanceNotFound`] and removes nothing when
    /// the instance is not registered.
    pub fn unregister_instance(&self, instance: &Arc<Instance>) -> Result<()> {
        let mut inner = self.lock();

        let idx = inner
            .instances
            .iter()
            .position(|i| Arc::ptr_eq(i, instance))
            .ok_or_else(|| KernelError::InstanceNotFound {
                instance: instance.to_string(),
            })?;

        inner.instances.remove(idx);

        info!(
            plugin = %instance.plugin(),
            room_id = %instance.room_id(),
            broker = %instance.broker_name(),
            "instance unregistered"
        );

        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// Snapshot of the catalog.
    pub fn plugin_list(&self) -> Vec<Arc<Plugin>> {
        self.lock().plugins.clone()
    }

    /// Snapshot of the directory.
    pub fn instance_list(&self) -> Vec<Arc<Instance>> {
        self.lock().instances.clone()
    }

    pub fn plugin_count(&self) -> usize {
        self.lock().plugins.len()
    }

    pub fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }

    /// Look up a plugin by name.
    pub fn get_plugin(&self, name: &str) -> Result<Arc<Plugin>> {
        self.lock()
            .plugins
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| KernelError::PluginNotFound {
                name: name.to_owned(),
            })
    }

    /// All instances of `plugin` in `room_id` on broker `broker`.
    pub fn find_instances(&self, room_id: &str, broker: &str, plugin: &str) -> Vec<Arc<Instance>> {
        self.lock()
            .instances
            .iter()
            .filter(|i| {
                i.plugin().name() == plugin && i.broker_name() == broker && i.room_id() == room_id
            })
            .cloned()
            .collect()
    }

    /// Plugins that back at least one instance, in first-seen order.
    pub fn active_plugin_list(&self) -> Vec<Arc<Plugin>> {
        let inner = self.lock();
        let mut out: Vec<Arc<Plugin>> = Vec::new();

        for inst in &inner.instances {
            if !out.iter().any(|p| p.name() == inst.plugin().name()) {
                out.push(Arc::clone(inst.plugin()));
            }
        }

        out
    }

    /// Catalog plugins without any instance, in catalog order.
    pub fn inactive_plugin_list(&self) -> Vec<Arc<Plugin>> {
        let inner = self.lock();
        inner
            .plugins
            .iter()
            .filter(|p| !inner.instances.iter().any(|i| i.plugin().name() == p.name()))
            .cloned()
            .collect()
    }

    /// Instances that should receive `event`: same broker and room, and a
    /// compiled pattern that matches the body.  Patterns run against a
    /// snapshot, so the registry lock is not held while matching.
    pub fn matching_instances(&self, event: &Event) -> Vec<Arc<Instance>> {
        let matched: Vec<Arc<Instance>> = self
            .instance_list()
            .into_iter()
            .filter(|i| {
                i.broker_name() == event.broker
                    && i.room_id() == event.room_id
                    && i.matches(&event.body)
            })
            .collect();

        debug!(event_id = %event.id, matched = matched.len(), "event routed");
        matched
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
