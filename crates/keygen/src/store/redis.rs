use crate::{BackendError, SetBackend};
use ::redis::{AsyncCommands, Client, RedisResult, aio::MultiplexedConnection};
use async_trait::async_trait;
use core::time::Duration;

/// Default upper bound for a single backend call, connection included.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(2);

/// A [`SetBackend`] over Redis or Valkey.
///
/// The commands map one to one onto `SADD`, `SPOP`, `SMOVE` and `SCARD`, each
/// of which the server executes atomically.
///
/// A fresh connection is opened for every call and dropped when the call
/// returns; nothing is shared between calls except the parsed client
/// configuration. Both the connect and the command are bounded by the
/// configured timeout.
#[derive(Clone, Debug)]
pub struct RedisBackend {
    client: Client,
    timeout: Duration,
}

impl RedisBackend {
    /// Parses `url` (e.g. `redis://localhost:6379`) without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Command`] if the URL is malformed.
    pub fn open(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url).map_err(|e| BackendError::Command(Box::new(e)))?;
        Ok(Self {
            client,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn connect(&self) -> Result<MultiplexedConnection, BackendError> {
        match tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(conn) => conn.map_err(|e| BackendError::Unavailable(Box::new(e))),
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    async fn bounded<T>(
        &self,
        command: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(res) => res.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl SetBackend for RedisBackend {
    async fn add_unique(&self, set: &str, member: &[u8]) -> Result<bool, BackendError> {
        let mut conn = self.connect().await?;
        let added: u64 = self.bounded(conn.sadd(set, member)).await?;
        Ok(added > 0)
    }

    async fn pop_random(&self, set: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.connect().await?;
        self.bounded(conn.spop(set)).await
    }

    async fn move_member(
        &self,
        from: &str,
        to: &str,
        member: &[u8],
    ) -> Result<bool, BackendError> {
        let mut conn = self.connect().await?;
        self.bounded(conn.smove(from, to, member)).await
    }

    async fn cardinality(&self, set: &str) -> Result<u64, BackendError> {
        let mut conn = self.connect().await?;
        self.bounded(conn.scard(set)).await
    }
}
