use harvester_core::{ErrorKind, WindowError};
use thiserror::Error;

use crate::persist::PersistError;

/// Failures of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider refused the request (http {status}): {message}")]
    Auth { status: u16, message: String },
    #[error("http status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("malformed provider response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures of the Video Store or the channel directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),
    #[error("store serialization error: {0}")]
    Serialization(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<PersistError> for StoreError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Serialization(message) => StoreError::Serialization(message),
            other => StoreError::Io(other.to_string()),
        }
    }
}

/// Harvest error taxonomy. Duplicates are counted, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarvestError {
    #[error("quota exhausted: requested {requested} units, {remaining} remaining")]
    QuotaExceeded { requested: u32, remaining: u32 },
    #[error("provider auth failure: {0}")]
    ProviderAuth(String),
    #[error("transient network failure: {0}")]
    TransientNetwork(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl HarvestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            HarvestError::ProviderAuth(_) => ErrorKind::ProviderAuth,
            HarvestError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            HarvestError::Validation(_) => ErrorKind::Validation,
            HarvestError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<ProviderError> for HarvestError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Auth { .. } => HarvestError::ProviderAuth(err.to_string()),
            other => HarvestError::TransientNetwork(other.to_string()),
        }
    }
}

impl From<StoreError> for HarvestError {
    fn from(err: StoreError) -> Self {
        HarvestError::Persistence(err.to_string())
    }
}

impl From<WindowError> for HarvestError {
    fn from(err: WindowError) -> Self {
        HarvestError::Validation(err.to_string())
    }
}

/// Per-channel checkpoint reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProgress {
    pub channel_id: String,
    pub completed: usize,
    pub total: usize,
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ChannelProgress);
}

/// Sink for callers that do not observe channel progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _progress: ChannelProgress) {}
}
