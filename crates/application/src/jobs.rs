//! Periodic background jobs.
//!
//! Each job runs on its own [`PeriodicWorker`]. A worker never runs two
//! instances of its job at once: a tick that fires while the previous run is
//! still in progress is skipped, not queued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outbox::OutboxStore;
use persistence::UnitOfWorkFactory;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::ports::{EventBus, GeoResolver};
use crate::relay::OutboxRelay;
use crate::service::DeliveryService;

/// Work executed on every tick of a [`PeriodicWorker`].
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Label used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Runs once. `cancel` fires when the worker shuts down.
    async fn run(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Fires a [`Job`] at a fixed interval until shut down.
pub struct PeriodicWorker<J> {
    job: Arc<J>,
    period: Duration,
    run_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl<J: Job> PeriodicWorker<J> {
    pub fn new(job: J, period: Duration) -> Self {
        Self {
            job: Arc::new(job),
            period,
            run_lock: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops the worker when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Ticks until shutdown, then waits for the in-flight run to finish.
    pub async fn run(self) {
        let name = self.job.name();
        tracing::info!(job = name, period = ?self.period, "worker started");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.try_tick();
                }
            }
        }

        let _idle = self.run_lock.lock().await;
        tracing::info!(job = name, "worker stopped");
    }

    /// Starts one run unless the previous one is still going. Returns the
    /// handle of the started run.
    pub fn try_tick(&self) -> Option<JoinHandle<()>> {
        let name = self.job.name();
        let guard = match self.run_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(job = name, "previous run still in progress, tick skipped");
                metrics::counter!("worker_ticks_skipped_total", "job" => name).increment(1);
                return None;
            }
        };

        metrics::counter!("worker_ticks_total", "job" => name).increment(1);
        let job = Arc::clone(&self.job);
        let cancel = self.shutdown.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            tracing::debug!(job = name, "tick");

            if let Err(e) = job.run(&cancel).await {
                tracing::warn!(job = name, error = %e, "job run failed");
            }

            metrics::histogram!("worker_tick_duration_seconds", "job" => name)
                .record(started.elapsed().as_secs_f64());
        }))
    }
}

/// Assigns one waiting order per tick.
pub struct AssignOrdersJob<F, G> {
    service: Arc<DeliveryService<F, G>>,
}

impl<F, G> AssignOrdersJob<F, G> {
    pub fn new(service: Arc<DeliveryService<F, G>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory, G: GeoResolver + 'static> Job for AssignOrdersJob<F, G> {
    fn name(&self) -> &'static str {
        "assign_orders"
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<()> {
        match self.service.assign_orders().await {
            Ok(_) => Ok(()),
            Err(AppError::NotAvailableOrders | AppError::NotAvailableCouriers) => {
                tracing::debug!("nothing to assign");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Moves couriers one step per tick.
pub struct MoveCouriersJob<F, G> {
    service: Arc<DeliveryService<F, G>>,
}

impl<F, G> MoveCouriersJob<F, G> {
    pub fn new(service: Arc<DeliveryService<F, G>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory, G: GeoResolver + 'static> Job for MoveCouriersJob<F, G> {
    fn name(&self) -> &'static str {
        "move_couriers"
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<()> {
        self.service.move_couriers().await.map(|_| ())
    }
}

/// Relays one outbox batch per tick.
pub struct OutboxRelayJob<O, B> {
    relay: Arc<OutboxRelay<O, B>>,
}

impl<O, B> OutboxRelayJob<O, B> {
    pub fn new(relay: Arc<OutboxRelay<O, B>>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl<O: OutboxStore + 'static, B: EventBus + 'static> Job for OutboxRelayJob<O, B> {
    fn name(&self) -> &'static str {
        "outbox_relay"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        self.relay.run_once(cancel).await.map(|_| ())
    }
}
