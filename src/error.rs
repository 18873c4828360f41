use thiserror::Error;

/// Result type used across the tracker, store and reporting layers.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failures from non-Redis store backends.
    #[error("store error: {0}")]
    Store(String),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("memory probe failed: {0}")]
    Probe(String),
}
