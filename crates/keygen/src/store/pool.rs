use crate::{Error, Key, Operation, Result, SetBackend, SetNames};
use std::sync::Arc;

/// Counts of keys in each set, as observed by two separate reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub available: u64,
    pub taken: u64,
}

/// The key pool: two disjoint sets in a [`SetBackend`].
///
/// Every key managed by the pool lives in exactly one of the *available* and
/// *taken* sets. A key moves into *available* via [`KeyPool::create`], from
/// *available* to *taken* via [`KeyPool::allocate_first`], and back via
/// [`KeyPool::deallocate`]. Each transition is a single atomic backend
/// command, so a `KeyPool` can be cloned and shared across tasks without any
/// locking of its own.
///
/// # Example
///
/// ```
/// use keygen::{Key, KeyPool, MemoryBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = KeyPool::new(MemoryBackend::new());
/// let key = Key::parse(b"abc123").unwrap();
///
/// pool.create(&key).await.unwrap();
/// assert_eq!(pool.allocate_first().await.unwrap(), key);
/// pool.deallocate(&key).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct KeyPool<B> {
    backend: Arc<B>,
    sets: SetNames,
}

impl<B> Clone for KeyPool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            sets: self.sets.clone(),
        }
    }
}

impl<B> KeyPool<B>
where
    B: SetBackend,
{
    /// Creates a pool over `backend` using the default set names.
    pub fn new(backend: B) -> Self {
        Self::with_sets(backend, SetNames::default())
    }

    pub fn with_sets(backend: B, sets: SetNames) -> Self {
        Self::from_shared(Arc::new(backend), sets)
    }

    /// Creates a pool over a backend that is shared with other owners.
    pub const fn from_shared(backend: Arc<B>, sets: SetNames) -> Self {
        Self { backend, sets }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn sets(&self) -> &SetNames {
        &self.sets
    }

    /// Inserts `key` into the available set.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyExists`] if the key is already available. Collisions
    ///   with keys in the taken set are not detected.
    /// - [`Error::Backend`] if the backend call fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(key = %key)))]
    pub async fn create(&self, key: &Key) -> Result<()> {
        let added = self
            .backend
            .add_unique(&self.sets.available, key.as_bytes())
            .await
            .map_err(|source| Error::Backend {
                operation: Operation::Create,
                source,
            })?;

        if added {
            Ok(())
        } else {
            Err(Error::AlreadyExists { key: *key })
        }
    }

    /// Removes an arbitrary key from the available set and records it as
    /// taken.
    ///
    /// Concurrent callers never receive the same key: the removal is a single
    /// atomic pop on the backend.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolExhausted`] if no key is available.
    /// - [`Error::Backend`] if the pop fails.
    /// - [`Error::AllocationInconsistent`] if a member was popped but could
    ///   not be recorded as taken, or is not a valid key. The member is then
    ///   in neither set.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn allocate_first(&self) -> Result<Key> {
        let member = self
            .backend
            .pop_random(&self.sets.available)
            .await
            .map_err(|source| Error::Backend {
                operation: Operation::Allocate,
                source,
            })?
            .ok_or(Error::PoolExhausted)?;

        let inconsistent = |reason: String| Error::AllocationInconsistent {
            member: String::from_utf8_lossy(&member).into_owned(),
            reason,
        };

        let key = Key::parse(&member).map_err(|e| inconsistent(e.to_string()))?;

        match self.backend.add_unique(&self.sets.taken, &member).await {
            Ok(true) => Ok(key),
            Ok(false) => Err(inconsistent("key was already marked as taken".to_string())),
            Err(e) => Err(inconsistent(e.to_string())),
        }
    }

    /// Returns a taken key to the available set.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAllocated`] if the key is not in the taken set. This
    ///   includes keys that were never created and keys already released.
    /// - [`Error::Backend`] if the backend call fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(key = %key)))]
    pub async fn deallocate(&self, key: &Key) -> Result<()> {
        let moved = self
            .backend
            .move_member(&self.sets.taken, &self.sets.available, key.as_bytes())
            .await
            .map_err(|source| Error::Backend {
                operation: Operation::Deallocate,
                source,
            })?;

        if moved {
            Ok(())
        } else {
            Err(Error::NotAllocated { key: *key })
        }
    }

    /// Reads the size of both sets. The two reads are not atomic with
    /// respect to each other.
    pub async fn stats(&self) -> Result<PoolStats> {
        let read = |source| Error::Backend {
            operation: Operation::Stats,
            source,
        };
        let available = self
            .backend
            .cardinality(&self.sets.available)
            .await
            .map_err(read)?;
        let taken = self
            .backend
            .cardinality(&self.sets.taken)
            .await
            .map_err(read)?;
        Ok(PoolStats { available, taken })
    }
}
