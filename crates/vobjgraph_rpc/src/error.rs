//! Error type returned by dispatched calls.

use std::error::Error;
use std::fmt::{Display, Formatter};
use vobjgraph_core::db::DbError;
use vobjgraph_core::RepoError;

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Failures surfaced in an RPC response.
#[derive(Debug)]
pub enum RpcError {
    /// Store operation failed.
    Store(RepoError),
    /// Store could not be opened or closed.
    Db(DbError),
    /// The handle was closed before the call ran.
    Closed,
    /// A previous call panicked while holding the store.
    LockPoisoned,
    /// The blocking worker died before returning.
    Join(String),
    UnknownMethod(String),
    BadPayload(String),
}

impl RpcError {
    /// Stable machine-readable code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(RepoError::NotFound(_)) => "not_found",
            Self::Store(_) => "store",
            Self::Db(_) => "db",
            Self::Closed => "closed",
            Self::LockPoisoned => "lock_poisoned",
            Self::Join(_) => "join",
            Self::UnknownMethod(_) => "unknown_method",
            Self::BadPayload(_) => "bad_payload",
        }
    }
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "store handle is closed"),
            Self::LockPoisoned => write!(f, "store lock poisoned by an earlier panic"),
            Self::Join(message) => write!(f, "store worker failed: {message}"),
            Self::UnknownMethod(method) => write!(f, "unknown method `{method}`"),
            Self::BadPayload(message) => write!(f, "bad payload: {message}"),
        }
    }
}

impl Error for RpcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RpcError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<DbError> for RpcError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(value: serde_json::Error) -> Self {
        Self::BadPayload(value.to_string())
    }
}

impl From<tokio::task::JoinError> for RpcError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(value.to_string())
    }
}
