use crate::{BackendError, SetBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// An in-process [`SetBackend`].
///
/// Every command runs under one mutex, which makes it atomic the same way a
/// single-threaded Redis executes commands. Nothing is persisted. Useful for
/// tests and for running the service without a store.
#[derive(Default, Debug)]
pub struct MemoryBackend {
    sets: Mutex<HashMap<String, HashSet<Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `member` is in `set`.
    pub fn contains(&self, set: &str, member: &[u8]) -> bool {
        self.sets
            .lock()
            .get(set)
            .is_some_and(|members| members.contains(member))
    }

    /// Returns a snapshot of the members of `set`, in no particular order.
    pub fn members(&self, set: &str) -> Vec<Vec<u8>> {
        self.sets
            .lock()
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SetBackend for MemoryBackend {
    async fn add_unique(&self, set: &str, member: &[u8]) -> Result<bool, BackendError> {
        Ok(self
            .sets
            .lock()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_vec()))
    }

    async fn pop_random(&self, set: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut sets = self.sets.lock();
        let Some(members) = sets.get_mut(set) else {
            return Ok(None);
        };
        // `HashSet` iteration order is seeded per instance, so the first
        // member is an arbitrary one.
        let member = members.iter().next().cloned();
        if let Some(member) = &member {
            members.remove(member);
        }
        Ok(member)
    }

    async fn move_member(
        &self,
        from: &str,
        to: &str,
        member: &[u8],
    ) -> Result<bool, BackendError> {
        let mut sets = self.sets.lock();
        let removed = sets
            .get_mut(from)
            .is_some_and(|members| members.remove(member));
        if removed {
            sets.entry(to.to_string())
                .or_default()
                .insert(member.to_vec());
        }
        Ok(removed)
    }

    async fn cardinality(&self, set: &str) -> Result<u64, BackendError> {
        Ok(self
            .sets
            .lock()
            .get(set)
            .map_or(0, |members| members.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_unique_rejects_duplicates() {
        let backend = MemoryBackend::new();
        assert!(backend.add_unique("a", b"k").await.unwrap());
        assert!(!backend.add_unique("a", b"k").await.unwrap());
        assert!(backend.add_unique("b", b"k").await.unwrap());
        assert_eq!(backend.cardinality("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pop_random_drains_set() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.pop_random("a").await.unwrap(), None);

        backend.add_unique("a", b"x").await.unwrap();
        backend.add_unique("a", b"y").await.unwrap();

        let mut popped = vec![
            backend.pop_random("a").await.unwrap().unwrap(),
            backend.pop_random("a").await.unwrap().unwrap(),
        ];
        popped.sort();
        assert_eq!(popped, vec![b"x".to_vec(), b"y".to_vec()]);
        assert_eq!(backend.pop_random("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn move_member_requires_membership_of_source() {
        let backend = MemoryBackend::new();
        assert!(!backend.move_member("a", "b", b"k").await.unwrap());

        backend.add_unique("a", b"k").await.unwrap();
        assert!(backend.move_member("a", "b", b"k").await.unwrap());
        assert!(!backend.contains("a", b"k"));
        assert!(backend.contains("b", b"k"));
        assert!(!backend.move_member("a", "b", b"k").await.unwrap());
    }
}
