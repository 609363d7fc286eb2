//! gRPC service implementation for key allocation.
//!
//! [`KeyService`] implements the [`Keys`] service from `keys.proto` on top of
//! a [`KeyPool`]. Both RPCs are thin: each performs exactly one pool
//! operation, with no caching and no retry. Failures are logged here with
//! full detail, then reduced to a [`Status`] that carries nothing internal.

use crate::server::telemetry::{
    increment_keys_allocated, increment_keys_released, increment_request_errors,
};
use keygen_tonic_core::{
    Error,
    keygen::{self, Key, KeyPool, SetBackend},
    proto::{KeyRequest, KeyResponse, Void, keys_server::Keys},
};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Hands out and takes back keys.
///
/// Cloning is cheap: clones share the pool and the shutdown token.
pub struct KeyService<B> {
    pool: KeyPool<B>,
    shutdown_token: CancellationToken,
}

impl<B> Clone for KeyService<B> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            shutdown_token: self.shutdown_token.clone(),
        }
    }
}

impl<B> KeyService<B>
where
    B: SetBackend + 'static,
{
    /// Creates a service that refuses new calls once `shutdown_token` is
    /// cancelled.
    pub const fn new(pool: KeyPool<B>, shutdown_token: CancellationToken) -> Self {
        Self {
            pool,
            shutdown_token,
        }
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        Ok(())
    }
}

/// Logs a pool failure at a level matching how actionable it is.
fn log_pool_error(rpc: &'static str, err: &keygen::Error) {
    use keygen::Error as E;

    match err {
        E::AllocationInconsistent { member, reason } => {
            tracing::error!(rpc, member, reason, "Key lost between sets, manual repair needed");
        }
        E::PoolExhausted => tracing::warn!(rpc, "Key pool exhausted"),
        E::NotAllocated { key } => tracing::debug!(rpc, %key, "Release of unallocated key"),
        E::Validation(e) => tracing::debug!(rpc, error = %e, "Rejected malformed key"),
        other => tracing::error!(rpc, error = %other, "Key pool operation failed"),
    }
}

fn fail(rpc: &'static str, err: keygen::Error) -> Status {
    increment_request_errors(rpc);
    log_pool_error(rpc, &err);
    Error::from(err).into()
}

#[tonic::async_trait]
impl<B> Keys for KeyService<B>
where
    B: SetBackend + 'static,
{
    /// Allocates one key.
    ///
    /// Fails with `INTERNAL` when the pool is empty or the backend is
    /// unreachable, and with `UNAVAILABLE` during shutdown.
    #[tracing::instrument(skip_all)]
    async fn get_key(&self, _request: Request<Void>) -> Result<Response<KeyResponse>, Status> {
        self.ensure_running()?;

        match self.pool.allocate_first().await {
            Ok(key) => {
                increment_keys_allocated();
                tracing::debug!(%key, "Key allocated");
                Ok(Response::new(key.into()))
            }
            Err(e) => Err(fail("GetKey", e)),
        }
    }

    /// Returns a key to the pool.
    ///
    /// Fails with `INVALID_ARGUMENT` for a malformed key (listing every
    /// violation), `NOT_FOUND` if the key is not currently allocated,
    /// `INTERNAL` on backend failure and `UNAVAILABLE` during shutdown.
    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(&request.get_ref().key)))]
    async fn release_key(&self, request: Request<KeyRequest>) -> Result<Response<Void>, Status> {
        self.ensure_running()?;

        let key = Key::try_from(request.into_inner()).map_err(|e| fail("ReleaseKey", e.into()))?;

        match self.pool.deallocate(&key).await {
            Ok(()) => {
                increment_keys_released();
                tracing::debug!("Key released");
                Ok(Response::new(Void {}))
            }
            Err(e) => Err(fail("ReleaseKey", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygen::{BackendError, MemoryBackend};
    use keygen_tonic_core::proto::{keys_client::KeysClient, keys_server::KeysServer};
    use std::collections::HashSet;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::Code;

    fn key(raw: &str) -> Key {
        Key::parse(raw.as_bytes()).unwrap()
    }

    fn release(raw: &[u8]) -> Request<KeyRequest> {
        Request::new(KeyRequest { key: raw.to_vec() })
    }

    async fn seeded(keys: &[&str]) -> KeyService<MemoryBackend> {
        let pool = KeyPool::new(MemoryBackend::new());
        for raw in keys {
            pool.create(&key(raw)).await.unwrap();
        }
        KeyService::new(pool, CancellationToken::new())
    }

    #[tokio::test]
    async fn allocate_release_round_trip() {
        let service = seeded(&["testk1", "testk2"]).await;

        let mut got = HashSet::new();
        for _ in 0..2 {
            let res = service.get_key(Request::new(Void {})).await.unwrap();
            got.insert(res.into_inner().key);
        }
        assert_eq!(
            got,
            HashSet::from([b"testk1".to_vec(), b"testk2".to_vec()])
        );

        let status = service.get_key(Request::new(Void {})).await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("no available keys"));

        let status = service.release_key(release(b"anykey")).await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("not found"));

        service.release_key(release(b"testk1")).await.unwrap();
        let status = service.release_key(release(b"testk1")).await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let res = service.get_key(Request::new(Void {})).await.unwrap();
        assert_eq!(res.into_inner().key, b"testk1".to_vec());
    }

    #[tokio::test]
    async fn malformed_keys_are_rejected_with_every_violation() {
        let service = seeded(&[]).await;

        for (raw, size, charset) in [
            (&b"ab1/"[..], true, true),
            (b"abcd12@4", true, true),
            (b"abcd1234", true, false),
            (b"", true, false),
            (b"ab+/cd", false, true),
        ] {
            let status = service.release_key(release(raw)).await.unwrap_err();
            assert_eq!(status.code(), Code::InvalidArgument, "{raw:?}");
            let msg = status.message();
            assert_eq!(msg.contains("key size"), size, "{raw:?}: {msg}");
            assert_eq!(msg.contains("not URL safe"), charset, "{raw:?}: {msg}");
        }
    }

    #[tokio::test]
    async fn calls_fail_after_shutdown() {
        let service = seeded(&["testk1"]).await;
        service.shutdown_token.cancel();

        let status = service.get_key(Request::new(Void {})).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        let status = service.release_key(release(b"testk1")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);

        // nothing was allocated
        assert_eq!(service.pool.stats().await.unwrap().available, 1);
    }

    struct DownBackend;

    #[async_trait::async_trait]
    impl SetBackend for DownBackend {
        async fn add_unique(&self, _: &str, _: &[u8]) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("redis://:hunter2@db:6379 refused".into()))
        }

        async fn pop_random(&self, _: &str) -> Result<Option<Vec<u8>>, BackendError> {
            Err(BackendError::Unavailable("redis://:hunter2@db:6379 refused".into()))
        }

        async fn move_member(&self, _: &str, _: &str, _: &[u8]) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("redis://:hunter2@db:6379 refused".into()))
        }

        async fn cardinality(&self, _: &str) -> Result<u64, BackendError> {
            Err(BackendError::Unavailable("redis://:hunter2@db:6379 refused".into()))
        }
    }

    #[tokio::test]
    async fn backend_failures_are_opaque() {
        let service = KeyService::new(KeyPool::new(DownBackend), CancellationToken::new());

        let status = service.get_key(Request::new(Void {})).await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("hunter2"));

        let status = service.release_key(release(b"testk1")).await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("hunter2"));
    }

    #[tokio::test]
    async fn served_over_grpc() {
        let service = seeded(&["testk1"]).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            tonic::transport::Server::builder()
                .add_service(KeysServer::new(service))
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    shutdown.cancelled_owned(),
                )
        });

        let mut client = KeysClient::connect(format!("http://{addr}")).await.unwrap();

        let key = client.get_key(Void {}).await.unwrap().into_inner().key;
        assert_eq!(key, b"testk1".to_vec());

        client.release_key(KeyRequest { key }).await.unwrap();
        let status = client
            .release_key(KeyRequest {
                key: b"anykey".to_vec(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
