use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one messaging engine instance.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Sqlite database file
    pub db_path: PathBuf,
    /// Maximum pooled connections
    pub pool_size: u32,
    /// How long a connection waits on a locked database
    pub busy_timeout: Duration,
    /// Edit and delete-for-everyone are allowed this long after creation
    pub mutability_window: Duration,
    /// Content written over a message deleted for everyone
    pub deleted_placeholder: String,
    /// Typing flags older than this are treated as cleared. `None` keeps them until cleared.
    pub typing_ttl: Option<Duration>,
    pub search_limit: usize,
    pub min_search_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("gabber_social.db"),
            pool_size: 8,
            busy_timeout: Duration::from_secs(5),
            mutability_window: Duration::from_secs(15 * 60),
            deleted_placeholder: "This message was deleted".to_string(),
            typing_ttl: None,
            search_limit: 50,
            min_search_len: 2,
        }
    }
}

impl ChatConfig {
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_mutability_window(mut self, window: Duration) -> Self {
        self.mutability_window = window;
        self
    }

    pub fn with_deleted_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.deleted_placeholder = placeholder.into();
        self
    }

    pub fn with_typing_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.typing_ttl = ttl;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_min_search_len(mut self, min_len: usize) -> Self {
        self.min_search_len = min_len;
        self
    }
}
