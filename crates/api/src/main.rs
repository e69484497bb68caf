//! Delivery service entry point.

use std::sync::Arc;

use api::config::Config;
use application::{
    AssignOrdersJob, EventBus, MoveCouriersJob, OutboxRelay, OutboxRelayJob, PeriodicWorker,
    RandomGeoResolver, TimeoutGeoResolver,
};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{OutboxStore, PostgresOutbox};
use persistence::{InMemoryDatabase, PostgresUnitOfWorkFactory, UnitOfWorkFactory};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Select the storage backend
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(&url).await?;
            let uow = PostgresUnitOfWorkFactory::new(pool.clone());
            uow.run_migrations().await?;
            tracing::info!("using PostgreSQL backend");
            with_bus(config, uow, PostgresOutbox::new(pool), metrics_handle).await
        }
        None => {
            let db = InMemoryDatabase::new();
            let outbox = db.outbox().clone();
            tracing::warn!("DATABASE_URL not set, using in-memory backend");
            with_bus(config, db, outbox, metrics_handle).await
        }
    }
}

/// Selects the message bus, then serves.
async fn with_bus<F, O>(
    config: Config,
    uow: F,
    outbox: O,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    F: UnitOfWorkFactory + Clone,
    O: OutboxStore + 'static,
{
    #[cfg(feature = "kafka")]
    if let Some(brokers) = config.kafka_brokers.clone() {
        let bus = application::KafkaEventBus::new(&brokers, config.kafka_topic.clone())?;
        tracing::info!(%brokers, topic = %config.kafka_topic, "publishing to kafka");
        return serve(config, uow, outbox, bus, metrics_handle).await;
    }

    if config.kafka_brokers.is_some() {
        tracing::warn!("KAFKA_BROKERS set but the kafka feature is disabled");
    }
    tracing::warn!("publishing integration events to the in-memory bus");
    let bus = application::InMemoryEventBus::new();
    serve(config, uow, outbox, bus, metrics_handle).await
}

async fn serve<F, O, B>(
    config: Config,
    uow: F,
    outbox: O,
    bus: B,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    F: UnitOfWorkFactory + Clone,
    O: OutboxStore + 'static,
    B: EventBus + 'static,
{
    let geo = TimeoutGeoResolver::new(RandomGeoResolver, config.geo_timeout);
    let state = api::create_state(uow, geo);

    // 4. Start background workers
    let shutdown = CancellationToken::new();
    let relay = OutboxRelay::new(outbox, bus).with_batch_size(config.outbox_batch_size);
    let workers = vec![
        PeriodicWorker::new(AssignOrdersJob::new(state.service.clone()), config.assign_interval)
            .with_shutdown(shutdown.clone())
            .start(),
        PeriodicWorker::new(MoveCouriersJob::new(state.service.clone()), config.move_interval)
            .with_shutdown(shutdown.clone())
            .start(),
        PeriodicWorker::new(OutboxRelayJob::new(Arc::new(relay)), config.outbox_interval)
            .with_shutdown(shutdown.clone())
            .start(),
    ];

    // 5. Start server
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Drain workers
    shutdown.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "worker task failed");
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
