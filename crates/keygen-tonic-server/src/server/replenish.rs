//! Background replenishment of the key pool.
//!
//! The [`Replenisher`] runs on its own task and reports into an
//! [`EventQueue`]. A second task drains the queue into logs and metrics, so a
//! slow log sink can never stall key generation; if the drain falls behind,
//! the oldest events are dropped and the loss is logged.

use crate::server::telemetry::{increment_generator_errors, increment_keys_generated};
use core::time::Duration;
use keygen::{EventDrain, EventQueue, KeyPool, ReplenishEvent, Replenisher, SetBackend};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ReplenishTask {
    generator: JoinHandle<()>,
    drain: JoinHandle<()>,
}

impl ReplenishTask {
    /// Starts generating one key per `interval` until `shutdown` is cancelled.
    pub fn spawn<B>(
        pool: KeyPool<B>,
        interval: Duration,
        queue_size: usize,
        shutdown: CancellationToken,
    ) -> Self
    where
        B: SetBackend + 'static,
    {
        let (queue, drain) = EventQueue::new(queue_size);
        let replenisher = Replenisher::builder()
            .pool(pool)
            .interval(interval)
            .build();

        Self {
            generator: tokio::spawn(replenisher.run(queue, shutdown)),
            drain: tokio::spawn(drain_events(drain)),
        }
    }

    /// Waits up to `timeout` for both tasks to finish after the shutdown token
    /// was cancelled. Whatever is still running afterwards is aborted.
    pub async fn join(self, timeout: Duration) {
        let Self { generator, drain } = self;
        let generator_abort = generator.abort_handle();
        let drain_abort = drain.abort_handle();

        let both = async {
            let _ = tokio::join!(generator, drain);
        };
        match tokio::time::timeout(timeout, both).await {
            Ok(()) => tracing::debug!("Replenisher stopped"),
            Err(_) => {
                tracing::warn!(?timeout, "Replenisher did not stop in time, aborting");
                generator_abort.abort();
                drain_abort.abort();
            }
        }
    }
}

async fn drain_events(mut drain: EventDrain) {
    while let Some(event) = drain.recv().await {
        match event {
            ReplenishEvent::Created(key) => {
                increment_keys_generated();
                tracing::trace!(%key, "Key added to pool");
            }
            ReplenishEvent::Failed(error) => {
                increment_generator_errors();
                if error.is_collision() {
                    tracing::debug!(%error, "Generated key already available");
                } else {
                    tracing::warn!(%error, "Replenishment step failed");
                }
            }
            ReplenishEvent::Dropped(count) => {
                tracing::warn!(count, "Replenisher events dropped, drain is lagging");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygen::MemoryBackend;

    #[tokio::test(start_paused = true)]
    async fn fills_pool_and_stops_on_cancel() {
        let pool = KeyPool::new(MemoryBackend::new());
        let shutdown = CancellationToken::new();
        let task = ReplenishTask::spawn(
            pool.clone(),
            Duration::from_millis(100),
            16,
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        shutdown.cancel();
        task.join(Duration::from_secs(1)).await;

        assert_eq!(pool.stats().await.unwrap().available, 5);
    }
}
