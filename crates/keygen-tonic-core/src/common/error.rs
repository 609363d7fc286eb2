//! Error types for the key allocation service.
//!
//! [`Error`] is what the gRPC handlers produce. It is deliberately coarser
//! than [`keygen::Error`]: backend failures collapse into
//! [`Error::Internal`] so that connection strings, server replies and other
//! internals never reach a caller. Handlers are expected to log the original
//! error before converting.

use keygen::{Key, Operation, ValidationError};
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the key allocation service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The caller sent a malformed key. Lists every violation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The key is not currently allocated.
    #[error("key {key} not found")]
    NotFound { key: Key },

    /// No key is available right now; the pool is refilled continuously.
    #[error("no available keys, try again in a moment")]
    PoolExhausted,

    /// Anything the caller cannot act on.
    #[error("internal error{}", .operation.map(|op| format!(" during {op}")).unwrap_or_default())]
    Internal { operation: Option<Operation> },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<keygen::Error> for Error {
    fn from(err: keygen::Error) -> Self {
        use keygen::Error as E;

        match err {
            E::Validation(e) => Self::Validation(e),
            E::NotAllocated { key } => Self::NotFound { key },
            E::PoolExhausted => Self::PoolExhausted,
            E::Backend { operation, .. } => Self::Internal {
                operation: Some(operation),
            },
            E::AllocationInconsistent { .. } => Self::Internal {
                operation: Some(Operation::Allocate),
            },
            E::AlreadyExists { .. } | E::RandomSource { .. } | E::Encoding(_) => Self::Internal {
                operation: Some(Operation::Create),
            },
            _ => Self::Internal { operation: None },
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(e) => Status::invalid_argument(e.to_string()),
            Error::NotFound { key } => Status::not_found(format!("key {key} not found")),
            Error::PoolExhausted => Status::internal("no available keys, try again in a moment"),
            Error::Internal { .. } => Status::internal("internal error"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
