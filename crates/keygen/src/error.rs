use crate::{Key, ValidationError};
use core::{fmt, time::Duration};

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The pool operation that was running when a backend call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Allocate,
    Deallocate,
    Stats,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Allocate => f.write_str("allocate"),
            Self::Deallocate => f.write_str("deallocate"),
            Self::Stats => f.write_str("stats"),
        }
    }
}

/// All errors produced by key generation and the key pool.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key is already a member of the available set.
    #[error("key {key} already exists")]
    AlreadyExists { key: Key },

    /// The available set is empty.
    #[error("no available keys, try again in a moment")]
    PoolExhausted,

    /// The key is not a member of the taken set.
    #[error("key {key} not found")]
    NotAllocated { key: Key },

    /// A member was popped from the available set but could not be recorded
    /// as taken. It is now in neither set and needs operator attention.
    #[error("allocation of {member:?} left the pool inconsistent: {reason}")]
    AllocationInconsistent { member: String, reason: String },

    /// The backend could not be reached or rejected a command.
    #[error("backend failed during {operation}: {source}")]
    Backend {
        operation: Operation,
        #[source]
        source: BackendError,
    },

    /// The secure random source could not produce bytes.
    #[error("random source unavailable: {reason}")]
    RandomSource { reason: String },

    #[error("failed to encode key: {0}")]
    Encoding(#[from] base64::EncodeSliceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures reported by a [`SetBackend`](crate::SetBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No connection could be established.
    #[error("backend unavailable: {0}")]
    Unavailable(#[source] Box<dyn core::error::Error + Send + Sync>),

    /// The call did not complete in time. Whether the command ran is unknown.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with an error.
    #[error("backend command failed: {0}")]
    Command(#[source] Box<dyn core::error::Error + Send + Sync>),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Unavailable(Box::new(err))
        } else {
            Self::Command(Box::new(err))
        }
    }
}
