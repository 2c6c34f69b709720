//! Hermes indexer binary.
//!
//! Wires configuration, stores, broker, steps, and rulesets together,
//! then runs the outbox relay and the consumer supervisor until a
//! termination signal arrives. SIGHUP reloads the ruleset file in
//! place.
//!
//! Exit codes: 0 on clean shutdown, non-zero on fatal initialization
//! errors (bad configuration, unreachable database, ruleset naming an
//! unregistered step).

use std::process::ExitCode;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

use hermes_indexer::adapters::kafka::{KafkaProducer, KafkaRecordConsumer};
use hermes_indexer::adapters::postgres::{
    PostgresExecutionStore, PostgresOutboxQueue,
};
use hermes_indexer::adapters::steps::{
    EmbeddingsStep, HttpContentFetcher, LlmSummaryStep, SearchIndexStep,
};
use hermes_indexer::application::{
    ConsumerSupervisor, OutboxRelay, PipelineExecutor, RulesetHandle, StepRegistry,
};
use hermes_indexer::config::AppConfig;
use hermes_indexer::ports::ContentFetcher;
use hermes_indexer::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal initialization error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    // Steps first: ruleset validation needs the registry populated.
    let content: Arc<dyn ContentFetcher> =
        Arc::new(HttpContentFetcher::new(&config.steps.content)?);

    let mut registry = StepRegistry::new();
    registry.register(Arc::new(SearchIndexStep::new(
        &config.steps.search,
        Arc::clone(&content),
    )?));
    registry.register(Arc::new(EmbeddingsStep::new(
        &config.steps.embeddings,
        Arc::clone(&content),
    )?));
    registry.register(Arc::new(LlmSummaryStep::new(
        &config.steps.summary,
        &config.steps.search,
        Arc::clone(&content),
    )?));

    let rulesets = Arc::new(RulesetHandle::load(config.rulesets.path.as_str(), &registry)?);
    let registry = Arc::new(registry);
    info!(
        path = %config.rulesets.path,
        rulesets = rulesets.current().rulesets().len(),
        steps = registry.len(),
        "rulesets loaded"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations applied");
    }

    let producer = Arc::new(KafkaProducer::new(&config.broker)?);
    let consumer = Arc::new(KafkaRecordConsumer::new(&config.broker)?);

    let outbox = Arc::new(PostgresOutboxQueue::new(pool.clone()));
    let execution_store = Arc::new(PostgresExecutionStore::new(pool.clone()));

    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&registry),
        execution_store,
        config.consumer.step_timeout(),
    ));

    let relay = Arc::new(OutboxRelay::new(outbox, producer, config.relay.clone()));
    let supervisor = Arc::new(ConsumerSupervisor::new(
        consumer,
        executor,
        Arc::clone(&rulesets),
        config.consumer.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay_task = {
        let relay = Arc::clone(&relay);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { relay.run(shutdown).await })
    };
    let consumer_task = {
        let supervisor = Arc::clone(&supervisor);
        let shutdown = shutdown_rx;
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    info!(topic = %config.broker.topic, "hermes indexer running");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
                break;
            }
            _ = sighup.recv() => {
                match rulesets.reload(registry.as_ref()) {
                    Ok(count) => info!(rulesets = count, "rulesets reloaded"),
                    Err(e) => error!(error = %e, "ruleset reload failed, keeping previous catalog"),
                }
            }
        }
    }

    // Graceful drain: both loops observe the flag, flush, and return.
    let _ = shutdown_tx.send(true);
    let _ = relay_task.await;
    let _ = consumer_task.await;

    info!("clean shutdown");
    Ok(())
}
