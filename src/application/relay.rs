//! Outbox relay - the bridge between the database and the broker.
//!
//! Polls the outbox for unpublished entries, publishes each keyed by
//! its document uuid, and marks acked entries published. Entries whose
//! publish fails keep `published_at` null and are retried with
//! exponential back-off capped at the configured maximum. Concurrent
//! relay instances coordinate through the queue's claims, so any given
//! entry is published by at most one of them at a time.
//!
//! A secondary timer prunes published entries older than the retention
//! window.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::domain::StoreError;
use crate::ports::{BrokerProducer, OutboxQueue};

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub published: usize,
    pub failed: usize,
}

/// Background service relaying outbox entries to the broker.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxQueue>,
    producer: Arc<dyn BrokerProducer>,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn OutboxQueue>,
        producer: Arc<dyn BrokerProducer>,
        config: RelayConfig,
    ) -> Self {
        Self {
            outbox,
            producer,
            config,
        }
    }

    /// Runs the relay loop until the shutdown signal flips.
    ///
    /// Infrastructure errors are never fatal here: a failed cycle logs,
    /// backs off, and the next tick retries.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut prune = time::interval(self.config.prune_interval());
        prune.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; skip the
        // initial prune so startup goes straight to relaying.
        prune.tick().await;

        let mut backoff = self.config.initial_backoff();

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            "outbox relay started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        // Flush one final batch so shutdown does not
                        // strand acked work.
                        if let Err(e) = self.process_batch().await {
                            warn!(error = %e, "final relay batch failed during shutdown");
                        }
                        info!("outbox relay stopped");
                        return;
                    }
                }

                _ = prune.tick() => {
                    match self.outbox.prune_published(self.config.retention()).await {
                        Ok(0) => {}
                        Ok(pruned) => debug!(pruned, "pruned published outbox entries"),
                        Err(e) => warn!(error = %e, "outbox pruning failed"),
                    }
                }

                _ = poll.tick() => {
                    match self.process_batch().await {
                        Ok(outcome) if outcome.failed > 0 => {
                            warn!(
                                published = outcome.published,
                                failed = outcome.failed,
                                backoff_ms = backoff.as_millis() as u64,
                                "publish failures in relay batch, backing off"
                            );
                            time::sleep(backoff).await;
                            backoff = (backoff * 2).min(self.config.max_backoff());
                        }
                        Ok(outcome) => {
                            if outcome.published > 0 {
                                debug!(published = outcome.published, "relayed outbox batch");
                            }
                            backoff = self.config.initial_backoff();
                        }
                        Err(e) => {
                            error!(error = %e, backoff_ms = backoff.as_millis() as u64, "relay cycle failed");
                            time::sleep(backoff).await;
                            backoff = (backoff * 2).min(self.config.max_backoff());
                        }
                    }
                }
            }
        }
    }

    /// Claims and relays one batch. Also the test seam.
    pub async fn process_batch(&self) -> Result<BatchOutcome, StoreError> {
        let mut claim = self.outbox.claim(self.config.batch_size).await?;
        let entries = claim.entries().to_vec();
        let mut outcome = BatchOutcome::default();

        for entry in entries {
            match self
                .producer
                .publish(&entry.partition_key, &entry.payload)
                .await
            {
                Ok(()) => {
                    claim.mark_published(entry.id).await?;
                    outcome.published += 1;
                }
                Err(e) => {
                    // No mark: published_at stays null and the next
                    // claim picks the entry up again.
                    warn!(
                        outbox_id = entry.id,
                        error = %e,
                        "outbox publish failed"
                    );
                    outcome.failed += 1;
                }
            }
        }

        claim.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBroker, InMemoryOutbox};
    use crate::domain::{BrokerError, DocumentRevision, EventMetadata, EventType};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn revision(id: i64) -> DocumentRevision {
        DocumentRevision {
            id,
            document_uuid: Uuid::new_v4(),
            document_id: format!("doc-{id}"),
            provider_type: "google".to_string(),
            title: "T".to_string(),
            content_hash: format!("h{id}"),
            status: "WIP".to_string(),
            modified_time: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn relay_with(
        outbox: Arc<InMemoryOutbox>,
        producer: Arc<dyn BrokerProducer>,
    ) -> OutboxRelay {
        OutboxRelay::new(outbox, producer, RelayConfig::default())
    }

    #[tokio::test]
    async fn batch_publishes_pending_and_marks_them() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let broker = Arc::new(InMemoryBroker::new("t", 2));

        let first = revision(1);
        outbox
            .append(&first, EventType::Created, &EventMetadata::new())
            .unwrap();
        outbox
            .append(&revision(2), EventType::Created, &EventMetadata::new())
            .unwrap();

        let relay = relay_with(outbox.clone(), broker.clone());
        let outcome = relay.process_batch().await.unwrap();

        assert_eq!(outcome, BatchOutcome { published: 2, failed: 0 });
        assert_eq!(outbox.published_count(), 2);
        assert_eq!(outbox.pending_count(), 0);
        assert_eq!(
            broker.records_for_key(&first.document_uuid.to_string()).len(),
            1
        );
    }

    #[tokio::test]
    async fn empty_outbox_publishes_nothing() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let broker = Arc::new(InMemoryBroker::new("t", 1));

        let relay = relay_with(outbox, broker);
        let outcome = relay.process_batch().await.unwrap();

        assert_eq!(outcome, BatchOutcome::default());
    }

    /// Producer that fails every publish until told otherwise.
    struct FlakyProducer {
        healthy: AtomicBool,
    }

    #[async_trait]
    impl BrokerProducer for FlakyProducer {
        async fn publish(&self, _key: &str, _payload: &[u8]) -> Result<(), BrokerError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(BrokerError::Publish {
                    topic: "t".to_string(),
                    message: "not a leader".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn failed_publish_leaves_entry_pending_for_retry() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(FlakyProducer { healthy: AtomicBool::new(false) });

        outbox
            .append(&revision(1), EventType::Created, &EventMetadata::new())
            .unwrap();

        let relay = relay_with(outbox.clone(), producer.clone());

        let outcome = relay.process_batch().await.unwrap();
        assert_eq!(outcome, BatchOutcome { published: 0, failed: 1 });
        assert_eq!(outbox.pending_count(), 1);
        // attempt_count only moves on a producer ack.
        assert_eq!(outbox.entries()[0].attempt_count, 0);

        // Broker recovers; the same entry relays on the next cycle.
        producer.healthy.store(true, Ordering::SeqCst);
        let outcome = relay.process_batch().await.unwrap();
        assert_eq!(outcome, BatchOutcome { published: 1, failed: 0 });
        assert_eq!(outbox.pending_count(), 0);
        assert_eq!(outbox.entries()[0].attempt_count, 1);
    }

    #[tokio::test]
    async fn run_flushes_and_stops_on_shutdown() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let broker = Arc::new(InMemoryBroker::new("t", 1));

        outbox
            .append(&revision(1), EventType::Created, &EventMetadata::new())
            .unwrap();

        let relay = Arc::new(relay_with(outbox.clone(), broker));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run(shutdown_rx).await })
        };

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(outbox.published_count(), 1);
    }
}
