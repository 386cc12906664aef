//! halbot kernel: plugin registration and instance routing.
//!
//! This crate is the part of the bot that decides *who* handles an event:
//!
//! - **[`plugin`]** -- Immutable handler definitions with a default match
//!   pattern, a settings template and required secrets.
//! - **[`instance`]** -- A plugin bound to one room on one broker, with its
//!   own compiled [`regex`] pattern and settings snapshot.
//! - **[`registry`]** -- The plugin catalog and instance directory behind a
//!   single lock, with snapshot listings and routing lookups.
//! - **[`prefs`]** -- The preference store capability settings are loaded
//!   from and saved to, plus an in-memory [`DashMap`](dashmap::DashMap) store.
//! - **[`broker`]** -- The broker and event interfaces the kernel consumes.
//! - **[`config`]** -- TOML launch configuration for restoring instances.
//! - **[`error`]** -- Unified kernel error types via [`thiserror`].
//!
//! Event delivery, broker transports and process bootstrap live outside
//! this crate.

pub mod broker;
pub mod config;
pub mod error;
pub mod instance;
pub mod plugin;
pub mod prefs;
pub mod registry;

// Re-export the most commonly used types at the crate root for convenience.
pub use broker::{Broker, Event, NamedBroker};
pub use config::{InstanceSpec, LaunchConfig};
pub use error::{KernelError, Result};
pub use instance::{Instance, Setting};
pub use plugin::{Handler, InitHook, Plugin, PluginBuilder, SettingDescriptor};
pub use prefs::{MemoryPreferenceStore, PrefKey, PreferenceStore};
pub use registry::Registry;
