//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core
//! services. The intent is to avoid reading process-wide environment
//! variables during request handling, which can lead to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.

use crate::error::{HistoryError, HistoryResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on the number of entries returned by a single list call.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Default bound on any single storage operation.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Subdirectory of the history data directory holding per-user entry folders.
pub(crate) const USERS_DIR_NAME: &str = "users";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    history_data_dir: PathBuf,
    default_list_limit: usize,
    storage_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::InvalidInput` if the list limit is zero or the
    /// storage timeout is zero.
    pub fn new(
        history_data_dir: PathBuf,
        default_list_limit: usize,
        storage_timeout: Duration,
    ) -> HistoryResult<Self> {
        if default_list_limit == 0 {
            return Err(HistoryError::InvalidInput(
                "default list limit must be at least 1".into(),
            ));
        }
        if storage_timeout.is_zero() {
            return Err(HistoryError::InvalidInput(
                "storage timeout must be non-zero".into(),
            ));
        }

        Ok(Self {
            history_data_dir,
            default_list_limit,
            storage_timeout,
        })
    }

    /// Create a configuration with the default limit and timeout.
    pub fn with_defaults(history_data_dir: PathBuf) -> Self {
        Self {
            history_data_dir,
            default_list_limit: DEFAULT_LIST_LIMIT,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn history_data_dir(&self) -> &Path {
        &self.history_data_dir
    }

    /// Directory holding one subdirectory per user.
    pub fn users_dir(&self) -> PathBuf {
        self.history_data_dir.join(USERS_DIR_NAME)
    }

    pub fn default_list_limit(&self) -> usize {
        self.default_list_limit
    }

    pub fn storage_timeout(&self) -> Duration {
        self.storage_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_limit() {
        let result = CoreConfig::new(PathBuf::from("/tmp/x"), 0, DEFAULT_STORAGE_TIMEOUT);
        assert!(matches!(result, Err(HistoryError::InvalidInput(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = CoreConfig::new(PathBuf::from("/tmp/x"), 50, Duration::ZERO);
        assert!(matches!(result, Err(HistoryError::InvalidInput(_))));
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = CoreConfig::with_defaults(PathBuf::from("/tmp/x"));
        assert_eq!(cfg.default_list_limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(cfg.storage_timeout(), DEFAULT_STORAGE_TIMEOUT);
        assert!(cfg.users_dir().ends_with("users"));
    }
}
