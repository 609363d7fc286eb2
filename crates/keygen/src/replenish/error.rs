use crate::{Error, Key};

/// A failed replenishment step. None of these stop the loop except
/// [`ReplenishError::Initialization`], which prevents it from starting.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReplenishError {
    /// The replenisher was started without a key pool.
    #[error("replenisher started without a key pool")]
    Initialization,

    #[error("failed to generate key: {0}")]
    Generate(#[source] Error),

    #[error("failed to add key {key} to the pool: {source}")]
    Create {
        key: Key,
        #[source]
        source: Error,
    },
}

impl ReplenishError {
    /// Returns `true` if a freshly generated key was already available.
    ///
    /// Collisions are expected at a low rate and are harmless; the key is
    /// simply skipped.
    pub const fn is_collision(&self) -> bool {
        matches!(
            self,
            Self::Create {
                source: Error::AlreadyExists { .. },
                ..
            }
        )
    }
}
