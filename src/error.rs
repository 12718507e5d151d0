// src/error.rs
//
// Typed error enums for the store/engine boundary. The CLI binary wraps
// these in `anyhow` at the edge; library code never constructs an `anyhow`
// error, only these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown job id {0}")]
    UnknownJob(uuid::Uuid),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no job type registered for '{0}'")]
    UnknownType(String),

    #[error("failed to decode input for '{0}': {1}")]
    DecodeFailed(String, String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Configuration(String),

    #[error("dispatch loop terminated: {0}")]
    Dispatch(#[from] StoreError),

    #[error("dispatch loop task panicked: {0}")]
    DispatchPanicked(String),
}
