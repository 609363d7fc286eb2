use crate::{Key, KeyPool, OsRandom, RandSource, ReplenishError, ReplenishObserver, SetBackend};
use core::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause between two replenishment steps.
pub const DEFAULT_GENERATE_INTERVAL: Duration = Duration::from_secs(1);

/// A background loop that keeps the available set topped up.
///
/// Every step generates one key and adds it to the pool, then the loop
/// sleeps for a fixed interval. A failed step is reported to the observer and
/// the loop carries on with the next one. The cadence never adapts to demand.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use keygen::{KeyPool, MemoryBackend, ReplenishError, Replenisher};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = KeyPool::new(MemoryBackend::new());
/// let shutdown = CancellationToken::new();
///
/// let replenisher = Replenisher::builder()
///     .pool(pool.clone())
///     .interval(Duration::from_millis(10))
///     .build();
/// let task = tokio::spawn(replenisher.run(|_: ReplenishError| {}, shutdown.clone()));
///
/// tokio::time::sleep(Duration::from_millis(35)).await;
/// shutdown.cancel();
/// task.await.unwrap();
///
/// assert!(pool.stats().await.unwrap().available > 0);
/// # }
/// ```
#[derive(Debug)]
pub struct Replenisher<B, R = OsRandom> {
    pool: Option<KeyPool<B>>,
    interval: Duration,
    rng: R,
}

#[derive(Debug)]
pub struct ReplenisherBuilder<B, R = OsRandom> {
    pool: Option<KeyPool<B>>,
    interval: Duration,
    rng: R,
}

impl<B> Replenisher<B>
where
    B: SetBackend,
{
    pub const fn builder() -> ReplenisherBuilder<B> {
        ReplenisherBuilder {
            pool: None,
            interval: DEFAULT_GENERATE_INTERVAL,
            rng: OsRandom,
        }
    }
}

impl<B, R> ReplenisherBuilder<B, R>
where
    B: SetBackend,
    R: RandSource,
{
    #[must_use]
    pub fn pool(mut self, pool: KeyPool<B>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the OS random source.
    #[must_use]
    pub fn rng<R2: RandSource>(self, rng: R2) -> ReplenisherBuilder<B, R2> {
        ReplenisherBuilder {
            pool: self.pool,
            interval: self.interval,
            rng,
        }
    }

    pub fn build(self) -> Replenisher<B, R> {
        Replenisher {
            pool: self.pool,
            interval: self.interval,
            rng: self.rng,
        }
    }
}

impl<B, R> Replenisher<B, R>
where
    B: SetBackend,
    R: RandSource,
{
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// The first step runs immediately. Cancellation is observed between
    /// steps; a step in progress is allowed to finish, which is bounded by
    /// the backend's own timeout.
    ///
    /// If no pool was configured, [`ReplenishError::Initialization`] is
    /// reported once and this returns without generating anything.
    pub async fn run<O>(self, observer: O, shutdown: CancellationToken)
    where
        O: ReplenishObserver,
    {
        let Some(pool) = self.pool else {
            observer.on_error(ReplenishError::Initialization);
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::info!(interval = ?self.interval, "Key replenisher started");

        while !shutdown.is_cancelled() {
            match step(&pool, &self.rng).await {
                Ok(key) => observer.on_created(&key),
                Err(e) => observer.on_error(e),
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Key replenisher stopped");
    }
}

async fn step<B, R>(pool: &KeyPool<B>, rng: &R) -> Result<Key, ReplenishError>
where
    B: SetBackend,
    R: RandSource,
{
    let key = Key::generate_with(rng).map_err(ReplenishError::Generate)?;
    pool.create(&key)
        .await
        .map_err(|source| ReplenishError::Create { key, source })?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BackendError, Error, EventDrain, EventQueue, KEY_SIZE, MemoryBackend, ReplenishEvent,
        Result,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const TICK: Duration = Duration::from_millis(1_000);

    struct BrokenRand;

    impl RandSource for BrokenRand {
        fn try_fill(&self, _dest: &mut [u8]) -> Result<()> {
            Err(Error::RandomSource {
                reason: "no entropy".to_string(),
            })
        }
    }

    struct FixedRand;

    impl RandSource for FixedRand {
        fn try_fill(&self, dest: &mut [u8]) -> Result<()> {
            dest.fill(0);
            Ok(())
        }
    }

    struct DownBackend;

    #[async_trait]
    impl SetBackend for DownBackend {
        async fn add_unique(&self, _: &str, _: &[u8]) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn pop_random(&self, _: &str) -> Result<Option<Vec<u8>>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn move_member(&self, _: &str, _: &str, _: &[u8]) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn cardinality(&self, _: &str) -> Result<u64, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    async fn next_n(drain: &mut EventDrain, n: usize) -> Vec<ReplenishEvent> {
        let mut events = Vec::with_capacity(n);
        for _ in 0..n {
            events.push(drain.recv().await.expect("queue closed early"));
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn adds_one_key_per_interval() {
        let pool = KeyPool::new(MemoryBackend::new());
        let shutdown = CancellationToken::new();
        let replenisher = Replenisher::builder()
            .pool(pool.clone())
            .interval(TICK)
            .build();
        let task = tokio::spawn(replenisher.run(|_: ReplenishError| {}, shutdown.clone()));

        // steps at 0s, 1s, 2s and 3s
        tokio::time::sleep(TICK * 3 + TICK / 2).await;
        shutdown.cancel();
        task.await.unwrap();

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.available, 4);
        assert_eq!(stats.taken, 0);
        for member in pool.backend().members(&pool.sets().available) {
            assert_eq!(member.len(), KEY_SIZE);
            assert!(Key::parse(&member).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generation_failures_do_not_stop_the_loop() {
        let shutdown = CancellationToken::new();
        let (queue, mut drain) = EventQueue::new(16);
        let replenisher = Replenisher::builder()
            .pool(KeyPool::new(MemoryBackend::new()))
            .rng(BrokenRand)
            .build();
        let task = tokio::spawn(replenisher.run(queue, shutdown.clone()));

        for event in next_n(&mut drain, 3).await {
            assert!(
                matches!(&event, ReplenishEvent::Failed(e) if matches!(**e, ReplenishError::Generate(Error::RandomSource { .. }))),
                "{event:?}"
            );
        }
        assert!(!task.is_finished());

        shutdown.cancel();
        task.await.unwrap();
        assert!(drain.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failures_do_not_stop_the_loop() {
        let shutdown = CancellationToken::new();
        let (queue, mut drain) = EventQueue::new(16);
        let replenisher = Replenisher::builder()
            .pool(KeyPool::new(DownBackend))
            .build();
        let task = tokio::spawn(replenisher.run(queue, shutdown.clone()));

        for event in next_n(&mut drain, 3).await {
            let ReplenishEvent::Failed(e) = &event else {
                panic!("expected failure, got {event:?}");
            };
            assert!(matches!(
                **e,
                ReplenishError::Create {
                    source: Error::Backend { .. },
                    ..
                }
            ));
        }

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn collisions_are_reported_and_skipped() {
        let pool = KeyPool::new(MemoryBackend::new());
        let shutdown = CancellationToken::new();
        let (queue, mut drain) = EventQueue::new(16);
        let replenisher = Replenisher::builder()
            .pool(pool.clone())
            .rng(FixedRand)
            .build();
        let task = tokio::spawn(replenisher.run(queue, shutdown.clone()));

        let events = next_n(&mut drain, 3).await;
        assert!(matches!(&events[0], ReplenishEvent::Created(k) if k.as_str() == "AAAAAA"));
        for event in &events[1..] {
            assert!(
                matches!(event, ReplenishEvent::Failed(e) if e.is_collision()),
                "{event:?}"
            );
        }

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(pool.stats().await.unwrap().available, 1);
    }

    #[tokio::test]
    async fn missing_pool_reports_once_and_returns() {
        let seen = Mutex::new(Vec::new());
        let replenisher = Replenisher::<MemoryBackend>::builder().build();

        replenisher
            .run(|e: ReplenishError| seen.lock().push(e), CancellationToken::new())
            .await;

        let seen = seen.into_inner();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ReplenishError::Initialization));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_does_nothing() {
        let pool = KeyPool::new(MemoryBackend::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        Replenisher::builder()
            .pool(pool.clone())
            .build()
            .run(|_: ReplenishError| {}, shutdown)
            .await;

        assert_eq!(pool.stats().await.unwrap().available, 0);
    }

    #[test]
    fn builder_defaults() {
        let replenisher = Replenisher::<MemoryBackend>::builder().build();
        assert_eq!(replenisher.interval(), DEFAULT_GENERATE_INTERVAL);
        assert!(replenisher.pool.is_none());
    }
}
