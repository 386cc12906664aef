//! Error types for the halbot-store crate.
//!
//! Storage operations return [`StoreError`] via [`StoreResult`].  At the
//! [`PreferenceStore`](halbot_kernel::PreferenceStore) boundary errors are
//! converted into [`KernelError::PreferenceStore`].

use halbot_kernel::{KernelError, PrefKey};
use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A blocking task was cancelled or panicked, or the connection mutex
    /// was poisoned.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

impl StoreError {
    /// Attach the preference key that was being accessed.
    pub fn into_kernel(self, key: &PrefKey) -> KernelError {
        KernelError::PreferenceStore {
            key: key.to_string(),
            reason: self.to_string(),
        }
    }
}
