use std::time::Duration;

/// Connection settings for the SQLite account store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub database_path: String,
    /// How long a writer waits on a locked database before giving up
    pub busy_timeout: Duration,
    pub max_connections: u32,
    /// Create the database file if it doesn't exist
    pub create_if_missing: bool,
}

impl StorageConfig {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            create_if_missing: false,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}
