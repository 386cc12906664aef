//! Kernel error types.
//!
//! Every fallible operation in this crate surfaces failures through
//! [`KernelError`].  Duplicate plugin registration is deliberately *not* an
//! error: it is logged and reported as `false` by
//! [`Registry::register_plugin`](crate::registry::Registry::register_plugin).

/// Unified error type for the halbot kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Registry errors ----------------------------------------------------
    /// The pattern of an instance failed to compile.  The instance was not
    /// registered.
    #[error("invalid regex pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// No plugin with this name is present in the catalog.
    #[error("no such plugin: {name:?}")]
    PluginNotFound { name: String },

    /// The instance is not present in the directory.  Nothing was removed.
    #[error("instance not registered: {instance}")]
    InstanceNotFound {
        /// Display form of the instance (`plugin/room`).
        instance: String,
    },

    /// A launch entry named a broker that was not supplied.
    #[error("no such broker: {name:?}")]
    BrokerNotFound { name: String },

    // -- Settings errors ----------------------------------------------------
    /// The key is not declared in the plugin's settings template.
    #[error("setting {key:?} is not declared for {instance}")]
    UnknownSetting { instance: String, key: String },

    /// A single preference store lookup or write failed.
    #[error("preference store error for {key}: {reason}")]
    PreferenceStore { key: String, reason: String },

    /// One or more keys failed during a settings load or save.  Each failure
    /// has already been logged individually.
    #[error("settings {operation} failed for {instance}: {}", .keys.join(", "))]
    SettingsFailed {
        instance: String,
        operation: &'static str,
        keys: Vec<String>,
    },

    // -- Configuration ------------------------------------------------------
    /// The launch configuration could not be read or parsed.
    #[error("launch config error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
