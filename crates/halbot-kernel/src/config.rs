//! Launch configuration.
//!
//! A [`LaunchConfig`] lists the instances a bot should bring up at startup.
//! It is stored as TOML so operators can edit it by hand:
//!
//! ```toml
//! [[instance]]
//! plugin = "echo"
//! room = "r1"
//! broker = "irc"
//! pattern = "^!echo"   # optional, defaults to the plugin's pattern
//! ```
//!
//! [`Registry::launch_config`] captures the running directory in the same
//! shape, so management tooling can persist it and restore it on restart.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::broker::Broker;
use crate::error::{KernelError, Result};
use crate::instance::Instance;
use crate::registry::Registry;

/// The set of instances to launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceSpec>,
}

/// One instance to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub plugin: String,
    pub room: String,
    pub broker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl LaunchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KernelError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| KernelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| KernelError::Config(e.to_string()))
    }
}

impl Registry {
    /// Create and register every instance in `config`.
    ///
    /// Plugins are looked up in the catalog and brokers by name in `brokers`.
    /// The first failure stops the launch; instances registered before it
    /// remain registered.
    pub fn launch(&self, config: &LaunchConfig, brokers: &[Arc<dyn Broker>]) -> Result<Vec<Arc<Instance>>> {
        let mut launched = Vec::with_capacity(config.instances.len());

        for spec in &config.instances {
            let plugin = self.get_plugin(&spec.plugin)?;
            let broker = brokers
                .iter()
                .find(|b| b.name() == spec.broker)
                .cloned()
                .ok_or_else(|| KernelError::BrokerNotFound {
                    name: spec.broker.clone(),
                })?;

            let mut instance = plugin.instance(&spec.room, broker);
            if let Some(pattern) = &spec.pattern {
                instance = instance.with_pattern(pattern);
            }
            launched.push(self.register_instance(instance)?);
        }

        info!(count = launched.len(), "launch config applied");
        Ok(launched)
    }

    /// Describe the current directory as a [`LaunchConfig`].
    ///
    /// Instances using their plugin's default pattern are written without
    /// one, so they pick up future default changes.
    pub fn launch_config(&self) -> LaunchConfig {
        let instances = self
            .instance_list()
            .iter()
            .map(|inst| InstanceSpec {
                plugin: inst.plugin().name().to_owned(),
                room: inst.room_id().to_owned(),
                broker: inst.broker_name().to_owned(),
                pattern: (inst.pattern() != inst.plugin().default_pattern())
                    .then(|| inst.pattern().to_owned()),
            })
            .collect();

        LaunchConfig { instances }
    }
}
