use crate::BackendError;
use async_trait::async_trait;

/// Set name holding keys that have not been handed out.
pub const AVAILABLE_SET: &str = "keys";

/// Set name holding keys that are currently allocated.
pub const TAKEN_SET: &str = "takenKeys";

/// The set commands a key-value store must provide to back a
/// [`KeyPool`](crate::KeyPool).
///
/// Each method must execute as a single atomic command on the store. The pool
/// relies on this and takes no locks of its own, so two concurrent
/// `pop_random` calls must never return the same member and a `move_member`
/// must either fully happen or not at all.
#[async_trait]
pub trait SetBackend: Send + Sync {
    /// Adds `member` to `set`. Returns `false` if it was already present.
    async fn add_unique(&self, set: &str, member: &[u8]) -> Result<bool, BackendError>;

    /// Removes and returns an arbitrary member of `set`, or `None` if the set
    /// is empty.
    async fn pop_random(&self, set: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Moves `member` from `from` to `to`. Returns `false` if `member` was not
    /// in `from`.
    async fn move_member(&self, from: &str, to: &str, member: &[u8])
    -> Result<bool, BackendError>;

    /// Returns the number of members in `set`.
    async fn cardinality(&self, set: &str) -> Result<u64, BackendError>;
}

/// Names of the two sets a [`KeyPool`](crate::KeyPool) partitions keys into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetNames {
    pub available: String,
    pub taken: String,
}

impl Default for SetNames {
    fn default() -> Self {
        Self {
            available: AVAILABLE_SET.to_string(),
            taken: TAKEN_SET.to_string(),
        }
    }
}
