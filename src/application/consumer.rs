//! Consumer supervisor - group consumption and dispatch.
//!
//! One supervisor per process, one consumer group per deployment. Each
//! partition gets its own worker fed through a bounded channel: records
//! within a partition process strictly serially (preserving
//! per-document order), distinct partitions process in parallel, and
//! the channel bound is the in-flight budget that backpressures the
//! broker poll loop.
//!
//! Offset commit policy: a record's offset commits only after every
//! matched ruleset has executed successfully. Failed or panicking
//! handlers leave the offset uncommitted so the record is redelivered;
//! step idempotence (outputs keyed by document and content) makes that
//! safe. Undeserializable payloads are the one exception: they commit
//! immediately, because redelivering poison would block the partition
//! without ever succeeding.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::domain::{RevisionEvent, RulesetCatalog};
use crate::ports::{BrokerConsumer, BrokerRecord};

use super::{PipelineExecutor, RulesetHandle};

const POLL_RETRY_PAUSE: Duration = Duration::from_secs(1);

struct PartitionWorker {
    sender: mpsc::Sender<BrokerRecord>,
    handle: JoinHandle<()>,
}

/// Supervises consumption: polls the broker, fans records out to
/// partition workers, and drains them on shutdown.
pub struct ConsumerSupervisor {
    consumer: Arc<dyn BrokerConsumer>,
    executor: Arc<PipelineExecutor>,
    rulesets: Arc<RulesetHandle>,
    config: ConsumerConfig,
}

impl ConsumerSupervisor {
    pub fn new(
        consumer: Arc<dyn BrokerConsumer>,
        executor: Arc<PipelineExecutor>,
        rulesets: Arc<RulesetHandle>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            consumer,
            executor,
            rulesets,
            config,
        }
    }

    /// Runs until shutdown flips or the record stream ends, then drains
    /// in-flight work within the configured deadline.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut workers: HashMap<i32, PartitionWorker> = HashMap::new();

        info!(
            in_flight_per_partition = self.config.in_flight_per_partition,
            "consumer supervisor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown requested, draining consumer");
                        break;
                    }
                }

                result = self.consumer.next_record() => {
                    match result {
                        Ok(Some(record)) => {
                            let worker = workers
                                .entry(record.partition)
                                .or_insert_with(|| self.spawn_worker(record.partition));

                            // Bounded send: a saturated partition stalls
                            // the poll loop, which is the backpressure.
                            if worker.sender.send(record).await.is_err() {
                                error!("partition worker exited unexpectedly");
                            }
                        }
                        Ok(None) => {
                            info!("record stream closed, draining consumer");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "broker poll failed, pausing before retry");
                            time::sleep(POLL_RETRY_PAUSE).await;
                        }
                    }
                }
            }
        }

        self.drain(workers).await;
        info!("consumer supervisor stopped");
    }

    /// Drops the feed channels and waits for workers to finish their
    /// queued records, bounded by the drain deadline.
    async fn drain(&self, workers: HashMap<i32, PartitionWorker>) {
        let deadline = self.config.drain_timeout();

        let mut handles: Vec<(i32, JoinHandle<()>)> = workers
            .into_iter()
            .map(|(partition, worker)| {
                drop(worker.sender);
                (partition, worker.handle)
            })
            .collect();

        let all_drained = join_all(handles.iter_mut().map(|(_, handle)| handle));
        let drained = time::timeout(deadline, all_drained).await;
        if drained.is_err() {
            for (partition, handle) in &handles {
                if !handle.is_finished() {
                    warn!(
                        partition = *partition,
                        "drain deadline exceeded, aborting partition worker"
                    );
                    handle.abort();
                }
            }
        }
    }

    fn spawn_worker(&self, partition: i32) -> PartitionWorker {
        let (sender, mut receiver) =
            mpsc::channel::<BrokerRecord>(self.config.in_flight_per_partition);
        let consumer = Arc::clone(&self.consumer);
        let executor = Arc::clone(&self.executor);
        let rulesets = Arc::clone(&self.rulesets);

        debug!(partition, "starting partition worker");

        let handle = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                // One task per record isolates panics: a panicking
                // handler loses its commit, not the whole partition.
                let task = tokio::spawn(process_record(
                    Arc::clone(&consumer),
                    Arc::clone(&executor),
                    rulesets.current(),
                    record,
                ));
                if let Err(e) = task.await {
                    error!(
                        partition,
                        error = %e,
                        "record handler panicked; offset left uncommitted for redelivery"
                    );
                }
            }
            debug!(partition, "partition worker drained");
        });

        PartitionWorker { sender, handle }
    }
}

/// Handles one record end to end: deserialize, match, execute, commit.
async fn process_record(
    consumer: Arc<dyn BrokerConsumer>,
    executor: Arc<PipelineExecutor>,
    catalog: Arc<RulesetCatalog>,
    record: BrokerRecord,
) {
    let event = match RevisionEvent::from_payload(&record.payload) {
        Ok(event) => event,
        Err(e) => {
            // Poison payload. Committing and skipping beats blocking
            // the partition on a record that can never parse.
            warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "skipping undeserializable record"
            );
            commit(&*consumer, &record).await;
            return;
        }
    };

    let matched = catalog.matching(&event);
    if matched.is_empty() {
        debug!(
            document_uuid = %event.revision.document_uuid,
            "no ruleset matched, committing"
        );
        commit(&*consumer, &record).await;
        return;
    }

    // Every matched ruleset runs, whatever the earlier ones returned;
    // the commit decision waits for all of them.
    let mut all_succeeded = true;
    for ruleset in matched {
        if let Err(e) = executor
            .execute(&event.revision, event.outbox_id, ruleset)
            .await
        {
            all_succeeded = false;
            warn!(
                document_uuid = %event.revision.document_uuid,
                ruleset = %ruleset.name,
                error = %e,
                "pipeline execution failed"
            );
        }
    }

    if all_succeeded {
        commit(&*consumer, &record).await;
    } else {
        debug!(
            partition = record.partition,
            offset = record.offset,
            "offset not committed, record will be redelivered"
        );
    }
}

async fn commit(consumer: &dyn BrokerConsumer, record: &BrokerRecord) {
    if let Err(e) = consumer.commit(record).await {
        warn!(
            partition = record.partition,
            offset = record.offset,
            error = %e,
            "offset commit failed"
        );
    }
}
