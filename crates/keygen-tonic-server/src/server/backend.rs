//! Runtime selection of the pool backend.

use crate::server::config::{BackendKind, ServerConfig};
use async_trait::async_trait;
use keygen::{BackendError, MemoryBackend, RedisBackend, SetBackend};

/// The backend picked by `--backend`, dispatched without boxing.
#[derive(Debug)]
pub enum AnyBackend {
    Redis(RedisBackend),
    Memory(MemoryBackend),
}

impl AnyBackend {
    /// Builds the configured backend. Redis is not contacted until the first
    /// command.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Ok(match config.backend {
            BackendKind::Redis => Self::Redis(
                RedisBackend::open(&config.redis_url)?.with_timeout(config.backend_timeout),
            ),
            BackendKind::Memory => {
                tracing::warn!("Using the in-memory backend; keys will not survive a restart");
                Self::Memory(MemoryBackend::new())
            }
        })
    }
}

#[async_trait]
impl SetBackend for AnyBackend {
    async fn add_unique(&self, set: &str, member: &[u8]) -> Result<bool, BackendError> {
        match self {
            Self::Redis(b) => b.add_unique(set, member).await,
            Self::Memory(b) => b.add_unique(set, member).await,
        }
    }

    async fn pop_random(&self, set: &str) -> Result<Option<Vec<u8>>, BackendError> {
        match self {
            Self::Redis(b) => b.pop_random(set).await,
            Self::Memory(b) => b.pop_random(set).await,
        }
    }

    async fn move_member(
        &self,
        from: &str,
        to: &str,
        member: &[u8],
    ) -> Result<bool, BackendError> {
        match self {
            Self::Redis(b) => b.move_member(from, to, member).await,
            Self::Memory(b) => b.move_member(from, to, member).await,
        }
    }

    async fn cardinality(&self, set: &str) -> Result<u64, BackendError> {
        match self {
            Self::Redis(b) => b.cardinality(set).await,
            Self::Memory(b) => b.cardinality(set).await,
        }
    }
}
