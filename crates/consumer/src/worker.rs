//! Partition workers that feed the transport's records to a handler.

use std::sync::Arc;
use std::time::Duration;

use messaging::{Delivery, HEADER_EVENT_TYPE, InMemoryTransport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::MessageHandler;

/// Retry and group settings shared by all workers of one consumer.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer group whose offsets the workers commit.
    pub group: String,
    /// Deliveries per message before it is skipped (at least 1).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            group: "order-service".to_string(),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Handled,
    Skipped,
    Interrupted,
}

/// Consumes one partition for one consumer group.
///
/// Records are handled strictly in offset order. A record's offset is
/// committed once it is handled, or once it is given up on. The worker
/// joins its group on the transport, so records stay until it commits them.
pub struct ConsumerWorker<H> {
    transport: InMemoryTransport,
    handler: Arc<H>,
    partition: usize,
    config: WorkerConfig,
}

impl<H: MessageHandler + 'static> ConsumerWorker<H> {
    pub fn new(
        transport: InMemoryTransport,
        handler: Arc<H>,
        partition: usize,
        config: WorkerConfig,
    ) -> Self {
        Self {
            transport,
            handler,
            partition,
            config,
        }
    }

    /// Runs until `shutdown` fires.
    #[tracing::instrument(
        skip(self, shutdown),
        fields(group = %self.config.group, partition = self.partition)
    )]
    pub async fn run(self, shutdown: CancellationToken) {
        self.transport.join_group(&self.config.group).await;
        tracing::info!("Consumer worker started");
        let mut appended = self.transport.subscribe();

        while !shutdown.is_cancelled() {
            // Mark the current append count as seen before looking, so an
            // append that races with the fetch still wakes us up.
            appended.borrow_and_update();

            let offset = self
                .transport
                .committed_offset(&self.config.group, self.partition)
                .await;

            match self.transport.fetch(self.partition, offset).await {
                Ok(Some(delivery)) => {
                    if self.process(&delivery, &shutdown).await == Outcome::Interrupted {
                        break;
                    }
                    if let Err(err) = self
                        .transport
                        .commit(&self.config.group, self.partition, delivery.offset)
                        .await
                    {
                        tracing::error!(
                            offset = delivery.offset,
                            error = %err,
                            "Failed to commit offset"
                        );
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        changed = appended.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(offset, error = %err, "Failed to fetch record");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.max_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Consumer worker stopped");
    }

    async fn process(&self, delivery: &Delivery, shutdown: &CancellationToken) -> Outcome {
        let event_type = delivery
            .header(HEADER_EVENT_TYPE)
            .unwrap_or("unknown")
            .to_string();
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 1;

        loop {
            let err = match self.handler.deliver(delivery).await {
                Ok(()) => {
                    metrics::counter!(
                        "consumer_events_processed_total",
                        "event_type" => event_type.clone()
                    )
                    .increment(1);
                    return Outcome::Handled;
                }
                Err(err) => err,
            };

            metrics::counter!(
                "consumer_handler_failures_total",
                "event_type" => event_type.clone(),
                "kind" => err.kind()
            )
            .increment(1);

            if !err.is_retryable() || attempt >= self.config.max_attempts {
                tracing::error!(
                    offset = delivery.offset,
                    key = %delivery.key,
                    %event_type,
                    attempt,
                    error = %err,
                    "Giving up on message"
                );
                return Outcome::Skipped;
            }

            tracing::warn!(
                offset = delivery.offset,
                %event_type,
                attempt,
                retry_in_ms = backoff.as_millis() as u64,
                error = %err,
                "Message handling failed, retrying"
            );
            tokio::select! {
                _ = shutdown.cancelled() => return Outcome::Interrupted,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
            attempt += 1;
        }
    }
}

/// Starts one worker per transport partition.
pub fn spawn_workers<H>(
    transport: &InMemoryTransport,
    handler: Arc<H>,
    config: &WorkerConfig,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>>
where
    H: MessageHandler + 'static,
{
    (0..transport.partition_count())
        .map(|partition| {
            let worker = ConsumerWorker::new(
                transport.clone(),
                Arc::clone(&handler),
                partition,
                config.clone(),
            );
            tokio::spawn(worker.run(shutdown.child_token()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsumerError, Result};
    use async_trait::async_trait;
    use messaging::{MessageTransport, OutboundMessage};
    use std::sync::Mutex;

    /// Records offsets and fails according to a script.
    #[derive(Default)]
    struct ScriptedHandler {
        seen: Mutex<Vec<u64>>,
        transient_failures: Mutex<u32>,
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn deliver(&self, delivery: &Delivery) -> Result<()> {
            self.seen.lock().unwrap().push(delivery.offset);
            if delivery.payload == b"bad" {
                return Err(serde_json::from_slice::<u32>(b"bad").unwrap_err().into());
            }
            let mut failures = self.transient_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ConsumerError::side_effect("test", "flaky"));
            }
            Ok(())
        }
    }

    async fn wait_for_commit(transport: &InMemoryTransport, group: &str, next: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.committed_offset(group, 0).await < next {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn config() -> WorkerConfig {
        WorkerConfig::new("test-group")
            .max_attempts(3)
            .backoff(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn handles_records_in_order_and_commits() {
        let transport = InMemoryTransport::new(1);
        let handler = Arc::new(ScriptedHandler::default());
        let shutdown = CancellationToken::new();
        let worker = ConsumerWorker::new(transport.clone(), handler.clone(), 0, config());
        let task = tokio::spawn(worker.run(shutdown.clone()));

        for body in ["a", "b", "c"] {
            transport
                .send(OutboundMessage::new("k", body.as_bytes().to_vec()))
                .await
                .unwrap();
        }
        wait_for_commit(&transport, "test-group", 3).await;

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(*handler.seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(transport.lag("test-group").await, 0);
        assert!(transport.is_empty().await);
        assert_eq!(transport.base_offset(0).await, 3);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let transport = InMemoryTransport::new(1);
        let handler = Arc::new(ScriptedHandler {
            transient_failures: Mutex::new(2),
            ..Default::default()
        });
        transport
            .send(OutboundMessage::new("k", b"x".to_vec()))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let handles = spawn_workers(&transport, handler.clone(), &config(), &shutdown);
        wait_for_commit(&transport, "test-group", 1).await;
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*handler.seen.lock().unwrap(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn undecodable_record_is_skipped_without_retry() {
        let transport = InMemoryTransport::new(1);
        let handler = Arc::new(ScriptedHandler::default());
        transport
            .send(OutboundMessage::new("k", b"bad".to_vec()))
            .await
            .unwrap();
        transport
            .send(OutboundMessage::new("k", b"good".to_vec()))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let worker = ConsumerWorker::new(transport.clone(), handler.clone(), 0, config());
        let task = tokio::spawn(worker.run(shutdown.clone()));
        wait_for_commit(&transport, "test-group", 2).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(*handler.seen.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn exhausted_retries_skip_the_record() {
        let transport = InMemoryTransport::new(1);
        let handler = Arc::new(ScriptedHandler {
            transient_failures: Mutex::new(10),
            ..Default::default()
        });
        transport
            .send(OutboundMessage::new("k", b"x".to_vec()))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let worker = ConsumerWorker::new(transport.clone(), handler.clone(), 0, config());
        let task = tokio::spawn(worker.run(shutdown.clone()));
        wait_for_commit(&transport, "test-group", 1).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(handler.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn idle_worker_stops_on_shutdown() {
        let transport = InMemoryTransport::new(1);
        let shutdown = CancellationToken::new();
        let worker = ConsumerWorker::new(
            transport,
            Arc::new(ScriptedHandler::default()),
            0,
            config(),
        );
        let task = tokio::spawn(worker.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
