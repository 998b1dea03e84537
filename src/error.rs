/// Failure to obtain the latest block from the pool API.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level failure: connection, timeout, non-2xx status, unreadable body.
    #[error("Fetch error: {0}")]
    Fetch(String),
    /// The payload arrived but does not have the expected shape.
    #[error("Unexpected response structure: {0}")]
    Schema(String),
}

impl SourceError {
    pub fn is_schema(&self) -> bool {
        matches!(self, SourceError::Schema(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid subscriber id on line {line}: {value:?}")]
    Parse { line: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Telegram rejected the request ({status}): {description}")]
    Rejected { status: i64, description: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("No config file found (tried {0})")]
    NotFound(String),
}

/// Top-level error returned by the binary entry point.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal: {0}")]
    Internal(String),
}
