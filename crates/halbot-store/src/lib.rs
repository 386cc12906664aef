//! # halbot-store
//!
//! SQLite persistence for halbot plugin preferences.
//!
//! [`Database`] wraps a WAL-mode `rusqlite` connection and runs blocking
//! calls on the tokio blocking pool.  [`SqlitePreferenceStore`] implements
//! the kernel's [`PreferenceStore`](halbot_kernel::PreferenceStore) on top
//! of it, so instance settings survive restarts.
//!
//! ## Quick start
//!
//! ```ignore
//! use halbot_store::{Database, SqlitePreferenceStore};
//!
//! let db = Database::open_and_migrate("data/halbot.db").await?;
//! let prefs = SqlitePreferenceStore::new(db);
//! instance.load_settings_from_prefs(&prefs).await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod prefs;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use prefs::{PrefScope, SqlitePreferenceStore, StoredPref};
