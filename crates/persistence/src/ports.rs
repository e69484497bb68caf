//! Repository and unit-of-work ports.

use async_trait::async_trait;
use common::{CourierId, OrderId};
use domain::{AggregateRoot, Courier, Order};

use crate::Result;

/// Order persistence bound to a unit of work.
///
/// Writers take the aggregate by value: the unit of work keeps it until
/// commit so its pending events can be written to the outbox. A write
/// outside a transaction runs in its own implicit transaction.
#[async_trait]
pub trait OrderRepository: Send {
    async fn add(&mut self, order: Order) -> Result<()>;

    async fn update(&mut self, order: Order) -> Result<()>;

    async fn get(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// The oldest order still in `Created` status.
    async fn get_first_created(&mut self) -> Result<Option<Order>>;

    async fn get_all_assigned(&mut self) -> Result<Vec<Order>>;

    /// Orders in `Created` or `Assigned` status.
    async fn get_not_completed(&mut self) -> Result<Vec<Order>>;
}

/// Courier persistence bound to a unit of work.
#[async_trait]
pub trait CourierRepository: Send {
    async fn add(&mut self, courier: Courier) -> Result<()>;

    async fn update(&mut self, courier: Courier) -> Result<()>;

    async fn get(&mut self, id: CourierId) -> Result<Option<Courier>>;

    /// Couriers none of whose storage places hold an order.
    async fn get_all_free(&mut self) -> Result<Vec<Courier>>;

    async fn get_all(&mut self) -> Result<Vec<Courier>>;
}

/// Transaction boundary that persists aggregate state and the aggregates'
/// pending domain events atomically.
///
/// An instance serves a single command execution and is not shared between
/// tasks.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn begin(&mut self) -> Result<()>;

    /// Writes one outbox row per pending event of every tracked aggregate,
    /// commits, then clears the tracked aggregates' events.
    async fn commit(&mut self) -> Result<()>;

    /// Discards staged writes and tracked aggregates.
    async fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    /// Registers an aggregate whose events must be written at commit.
    fn track(&mut self, aggregate: Box<dyn AggregateRoot>);

    fn orders(&mut self) -> &mut dyn OrderRepository;

    fn couriers(&mut self) -> &mut dyn CourierRepository;
}

/// Creates a fresh unit of work per command execution.
pub trait UnitOfWorkFactory: Send + Sync + 'static {
    type Uow: UnitOfWork + 'static;

    fn create(&self) -> Self::Uow;
}
