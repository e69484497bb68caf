//! In-memory unit of work for tests and the database-less binary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CourierId, OrderId};
use domain::{AggregateRoot, Courier, Order, OrderStatus};
use outbox::InMemoryOutbox;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::records::{CourierRow, OrderRecord};
use crate::{
    CourierRepository, OrderRepository, PersistenceError, Result, Tracker, UnitOfWork,
    UnitOfWorkFactory,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    couriers: Vec<CourierRow>,
    orders: Vec<OrderRecord>,
}

/// Shared in-memory tables plus their outbox.
///
/// A transaction holds the tables' write lock from `begin` until commit or
/// rollback, so transactions are serialized and never observe each other's
/// uncommitted writes. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    outbox: InMemoryOutbox,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outbox rows written by committed transactions.
    pub fn outbox(&self) -> &InMemoryOutbox {
        &self.outbox
    }

    /// Makes the next commit fail after staging, leaving nothing applied.
    pub fn set_fail_next_commit(&self, fail: bool) {
        self.fail_next_commit.store(fail, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn courier_count(&self) -> usize {
        self.tables.read().await.couriers.len()
    }
}

impl UnitOfWorkFactory for InMemoryDatabase {
    type Uow = InMemoryUnitOfWork;

    fn create(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            db: self.clone(),
            tx: None,
            tracker: Tracker::new(),
        }
    }
}

struct Transaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
}

/// Unit of work over an [`InMemoryDatabase`].
pub struct InMemoryUnitOfWork {
    db: InMemoryDatabase,
    tx: Option<Transaction>,
    tracker: Tracker,
}

impl InMemoryUnitOfWork {
    /// Number of aggregates tracked since the last commit or rollback.
    pub fn tracked_count(&self) -> usize {
        self.tracker.len()
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        match &self.tx {
            Some(tx) => f(&tx.staged),
            None => f(&*self.db.tables.read().await),
        }
    }

    /// Applies `f` to the staged tables and tracks `aggregate`. Runs in an
    /// implicit transaction when none is open. A failed write rolls back.
    async fn write(
        &mut self,
        aggregate: Box<dyn AggregateRoot>,
        f: impl FnOnce(&mut Tables) -> Result<()>,
    ) -> Result<()> {
        let implicit = self.tx.is_none();
        if implicit {
            self.begin().await?;
        }

        let tx = self.tx.as_mut().ok_or(PersistenceError::NoTransaction)?;
        if let Err(e) = f(&mut tx.staged) {
            if let Err(rollback_err) = self.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed write failed");
            }
            return Err(e);
        }
        self.tracker.track(aggregate);

        if implicit {
            self.commit().await?;
        }
        Ok(())
    }
}

fn order_records(tables: &Tables, keep: impl Fn(&OrderRecord) -> bool) -> Vec<OrderRecord> {
    tables.orders.iter().filter(|r| keep(r)).cloned().collect()
}

fn to_orders(records: Vec<OrderRecord>) -> Result<Vec<Order>> {
    records.into_iter().map(Order::try_from).collect()
}

fn to_couriers(rows: Vec<CourierRow>) -> Result<Vec<Courier>> {
    rows.into_iter().map(Courier::try_from).collect()
}

fn is_status(record: &OrderRecord, status: OrderStatus) -> bool {
    record.status == status.as_str()
}

fn upsert_order(tables: &mut Tables, record: OrderRecord, insert: bool) -> Result<()> {
    let existing = tables.orders.iter().position(|r| r.id == record.id);
    match (existing, insert) {
        (Some(_), true) => Err(PersistenceError::DuplicateKey {
            aggregate: "Order",
            id: record.id,
        }),
        (None, true) => {
            tables.orders.push(record);
            Ok(())
        }
        (Some(index), false) => {
            tables.orders[index] = record;
            Ok(())
        }
        (None, false) => Err(PersistenceError::NotFound {
            aggregate: "Order",
            id: record.id,
        }),
    }
}

fn upsert_courier(tables: &mut Tables, row: CourierRow, insert: bool) -> Result<()> {
    let id: Uuid = row.courier.id;
    let existing = tables.couriers.iter().position(|r| r.courier.id == id);
    match (existing, insert) {
        (Some(_), true) => Err(PersistenceError::DuplicateKey {
            aggregate: "Courier",
            id,
        }),
        (None, true) => {
            tables.couriers.push(row);
            Ok(())
        }
        (Some(index), false) => {
            tables.couriers[index] = row;
            Ok(())
        }
        (None, false) => Err(PersistenceError::NotFound {
            aggregate: "Courier",
            id,
        }),
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(PersistenceError::TransactionAlreadyStarted);
        }
        let guard = self.db.tables.clone().write_owned().await;
        let staged = guard.clone();
        self.tx = Some(Transaction { guard, staged });
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let Transaction { mut guard, staged } =
            self.tx.take().ok_or(PersistenceError::NoTransaction)?;

        let messages = match self.tracker.pending_messages() {
            Ok(messages) => messages,
            Err(e) => {
                self.tracker.discard();
                return Err(e);
            }
        };
        if self.db.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.tracker.discard();
            return Err(PersistenceError::CommitFailed("injected failure"));
        }

        let written = messages.len();
        if let Err(e) = self.db.outbox.append(messages).await {
            self.tracker.discard();
            return Err(e.into());
        }
        *guard = staged;
        drop(guard);

        metrics::counter!("outbox_messages_written_total").increment(written as u64);
        tracing::debug!(outbox_messages = written, "in-memory transaction committed");
        self.tracker.commit_succeeded();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.tx.take().ok_or(PersistenceError::NoTransaction)?;
        self.tracker.discard();
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn track(&mut self, aggregate: Box<dyn AggregateRoot>) {
        self.tracker.track(aggregate);
    }

    fn orders(&mut self) -> &mut dyn OrderRepository {
        self
    }

    fn couriers(&mut self) -> &mut dyn CourierRepository {
        self
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnitOfWork {
    async fn add(&mut self, order: Order) -> Result<()> {
        let record = OrderRecord::from(&order);
        self.write(Box::new(order), |t| upsert_order(t, record, true))
            .await
    }

    async fn update(&mut self, order: Order) -> Result<()> {
        let record = OrderRecord::from(&order);
        self.write(Box::new(order), |t| upsert_order(t, record, false))
            .await
    }

    async fn get(&mut self, id: OrderId) -> Result<Option<Order>> {
        let id = id.as_uuid();
        let record = self
            .read(|t| t.orders.iter().find(|r| r.id == id).cloned())
            .await;
        record.map(Order::try_from).transpose()
    }

    async fn get_first_created(&mut self) -> Result<Option<Order>> {
        let record = self
            .read(|t| {
                t.orders
                    .iter()
                    .find(|r| is_status(r, OrderStatus::Created))
                    .cloned()
            })
            .await;
        record.map(Order::try_from).transpose()
    }

    async fn get_all_assigned(&mut self) -> Result<Vec<Order>> {
        let records = self
            .read(|t| order_records(t, |r| is_status(r, OrderStatus::Assigned)))
            .await;
        to_orders(records)
    }

    async fn get_not_completed(&mut self) -> Result<Vec<Order>> {
        let records = self
            .read(|t| order_records(t, |r| !is_status(r, OrderStatus::Completed)))
            .await;
        to_orders(records)
    }
}

#[async_trait]
impl CourierRepository for InMemoryUnitOfWork {
    async fn add(&mut self, courier: Courier) -> Result<()> {
        let row = CourierRow::from(&courier);
        self.write(Box::new(courier), |t| upsert_courier(t, row, true))
            .await
    }

    async fn update(&mut self, courier: Courier) -> Result<()> {
        let row = CourierRow::from(&courier);
        self.write(Box::new(courier), |t| upsert_courier(t, row, false))
            .await
    }

    async fn get(&mut self, id: CourierId) -> Result<Option<Courier>> {
        let id = id.as_uuid();
        let row = self
            .read(|t| t.couriers.iter().find(|r| r.courier.id == id).cloned())
            .await;
        row.map(Courier::try_from).transpose()
    }

    async fn get_all_free(&mut self) -> Result<Vec<Courier>> {
        let rows = self
            .read(|t| {
                t.couriers
                    .iter()
                    .filter(|r| r.places.iter().all(|p| p.order_id.is_none()))
                    .cloned()
                    .collect()
            })
            .await;
        to_couriers(rows)
    }

    async fn get_all(&mut self) -> Result<Vec<Courier>> {
        let rows = self.read(|t| t.couriers.clone()).await;
        to_couriers(rows)
    }
}
