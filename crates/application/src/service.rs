//! Delivery command handlers.

use std::collections::HashMap;

use common::{CourierId, OrderId};
use domain::{Courier, DispatchService, DomainError, Location, Order};
use persistence::{PersistenceError, UnitOfWork, UnitOfWorkFactory};

use crate::commands::{CreateCourier, CreateOrder};
use crate::error::{AppError, Result};
use crate::ports::GeoResolver;

/// Result of a successful assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub order_id: OrderId,
    pub courier_id: CourierId,
}

/// Result of one movement tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveReport {
    /// Couriers that took a step.
    pub moved: usize,
    /// Orders delivered during the tick.
    pub completed: Vec<OrderId>,
}

/// Executes delivery commands, each in its own unit of work.
pub struct DeliveryService<F, G> {
    uow: F,
    geo: G,
    dispatcher: DispatchService,
}

impl<F: UnitOfWorkFactory, G: GeoResolver> DeliveryService<F, G> {
    pub fn new(uow: F, geo: G) -> Self {
        Self {
            uow,
            geo,
            dispatcher: DispatchService::new(),
        }
    }

    /// Accepts an order. Creating an order id that already exists succeeds
    /// without changing anything.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderId> {
        let mut uow = self.uow.create();
        if uow.orders().get(cmd.order_id()).await?.is_some() {
            tracing::debug!("order already exists");
            return Ok(cmd.order_id());
        }

        let location = self.geo.resolve(cmd.street()).await?;
        let order = Order::new(cmd.order_id(), location, cmd.volume())?;

        match uow.orders().add(order).await {
            Ok(()) => {
                tracing::info!(%location, volume = cmd.volume(), "order created");
                Ok(cmd.order_id())
            }
            // Lost a race with a concurrent create of the same id.
            Err(PersistenceError::DuplicateKey { .. }) => Ok(cmd.order_id()),
            Err(e) => Err(e.into()),
        }
    }

    /// Registers a courier at a random location with one default bag.
    #[tracing::instrument(skip(self))]
    pub async fn create_courier(&self, cmd: CreateCourier) -> Result<CourierId> {
        let courier = Courier::new(cmd.name(), cmd.speed(), Location::random())?;
        let courier_id = courier.id();
        let location = courier.location();

        let mut uow = self.uow.create();
        uow.couriers().add(courier).await?;

        tracing::info!(%courier_id, %location, "courier created");
        Ok(courier_id)
    }

    /// Gives the oldest waiting order to the nearest free courier.
    ///
    /// Fails with [`AppError::NotAvailableOrders`] or
    /// [`AppError::NotAvailableCouriers`] when there is nothing to do; in
    /// both cases nothing is written.
    #[tracing::instrument(skip(self))]
    pub async fn assign_orders(&self) -> Result<Assignment> {
        let mut uow = self.uow.create();
        uow.begin().await?;
        let result = self.assign_in(&mut uow).await;
        let assignment = finish(&mut uow, result).await?;

        metrics::counter!("delivery_orders_assigned_total").increment(1);
        tracing::info!(
            order_id = %assignment.order_id,
            courier_id = %assignment.courier_id,
            "order assigned"
        );
        Ok(assignment)
    }

    async fn assign_in(&self, uow: &mut F::Uow) -> Result<Assignment> {
        let mut order = uow
            .orders()
            .get_first_created()
            .await?
            .ok_or(AppError::NotAvailableOrders)?;

        let mut couriers = uow.couriers().get_all_free().await?;
        if couriers.is_empty() {
            return Err(AppError::NotAvailableCouriers);
        }

        let courier = self.dispatcher.dispatch(&mut order, &mut couriers)?.clone();
        let assignment = Assignment {
            order_id: order.id(),
            courier_id: courier.id(),
        };

        uow.orders().update(order).await?;
        uow.couriers().update(courier).await?;
        Ok(assignment)
    }

    /// Moves every courier with an assigned order one step and completes
    /// the orders whose courier arrived. The whole tick is one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn move_couriers(&self) -> Result<MoveReport> {
        let mut uow = self.uow.create();
        uow.begin().await?;
        let result = self.move_in(&mut uow).await;
        let report = finish(&mut uow, result).await?;

        metrics::counter!("delivery_courier_steps_total").increment(report.moved as u64);
        metrics::counter!("delivery_orders_completed_total")
            .increment(report.completed.len() as u64);
        if !report.completed.is_empty() {
            tracing::info!(completed = ?report.completed, "orders delivered");
        }
        Ok(report)
    }

    async fn move_in(&self, uow: &mut F::Uow) -> Result<MoveReport> {
        let orders = uow.orders().get_all_assigned().await?;
        let mut report = MoveReport::default();
        let mut couriers: HashMap<CourierId, (Courier, bool)> = HashMap::new();
        let mut touched = Vec::new();
        let mut delivered = Vec::new();

        for mut order in orders {
            let courier_id = order
                .courier_id()
                .ok_or(DomainError::ValueRequired("courier id"))?;

            if !couriers.contains_key(&courier_id) {
                let courier = uow
                    .couriers()
                    .get(courier_id)
                    .await?
                    .ok_or(AppError::CourierNotFound(courier_id))?;
                couriers.insert(courier_id, (courier, false));
                touched.push(courier_id);
            }
            let Some((courier, stepped)) = couriers.get_mut(&courier_id) else {
                return Err(AppError::CourierNotFound(courier_id));
            };

            // A courier carrying several orders moves once per tick.
            if !*stepped {
                let before = courier.location();
                courier.step_towards(&order.location());
                *stepped = true;
                if courier.location() != before {
                    report.moved += 1;
                }
            }

            if courier.location() == order.location() {
                order.complete()?;
                courier.complete_order(&order)?;
                report.completed.push(order.id());
                delivered.push(order);
            }
        }

        for order in delivered {
            uow.orders().update(order).await?;
        }
        for courier_id in touched {
            if let Some((courier, _)) = couriers.remove(&courier_id) {
                uow.couriers().update(courier).await?;
            }
        }
        Ok(report)
    }
}

/// Commits on success. On failure rolls back whatever is still open and
/// returns the original error.
async fn finish<U: UnitOfWork, T>(uow: &mut U, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if uow.in_transaction()
                && let Err(rollback) = uow.rollback().await
            {
                tracing::error!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::StoragePlace;
    use persistence::InMemoryDatabase;

    use super::*;
    use crate::geo::InMemoryGeoResolver;

    async fn setup() -> (
        DeliveryService<InMemoryDatabase, InMemoryGeoResolver>,
        InMemoryDatabase,
        InMemoryGeoResolver,
    ) {
        let db = InMemoryDatabase::new();
        let geo = InMemoryGeoResolver::new();
        geo.add_street("Baker St", Location::new(4, 4).unwrap()).await;
        let service = DeliveryService::new(db.clone(), geo.clone());
        (service, db, geo)
    }

    async fn seed_courier(db: &InMemoryDatabase, x: i32, y: i32, volume: i32) -> CourierId {
        let courier = Courier::restore(
            CourierId::new(),
            "Walker",
            1,
            Location::new(x, y).unwrap(),
            vec![StoragePlace::new("bag", volume).unwrap()],
        )
        .unwrap();
        let id = courier.id();
        db.create().couriers().add(courier).await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_order_resolves_street() {
        let (service, db, _) = setup().await;
        let order_id = OrderId::new();

        service
            .create_order(CreateOrder::new(order_id, "Baker St", 5).unwrap())
            .await
            .unwrap();

        let order = db.create().orders().get(order_id).await.unwrap().unwrap();
        assert_eq!(order.location(), Location::new(4, 4).unwrap());
        assert_eq!(order.volume(), 5);
    }

    #[tokio::test]
    async fn create_order_is_idempotent() {
        let (service, db, geo) = setup().await;
        let order_id = OrderId::new();
        let cmd = CreateOrder::new(order_id, "Baker St", 5).unwrap();

        service.create_order(cmd.clone()).await.unwrap();
        // The second call must not even reach the resolver.
        geo.set_unavailable(true).await;
        service.create_order(cmd).await.unwrap();

        assert_eq!(db.order_count().await, 1);
    }

    #[tokio::test]
    async fn create_order_fails_closed_on_geo_error() {
        let (service, db, geo) = setup().await;
        geo.set_unavailable(true).await;

        let err = service
            .create_order(CreateOrder::new(OrderId::new(), "Baker St", 5).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Geo(_)));
        assert_eq!(db.order_count().await, 0);
    }

    #[tokio::test]
    async fn create_courier_gets_default_bag() {
        let (service, db, _) = setup().await;

        let id = service
            .create_courier(CreateCourier::new("Bob", 2).unwrap())
            .await
            .unwrap();

        let courier = db.create().couriers().get(id).await.unwrap().unwrap();
        assert_eq!(courier.name(), "Bob");
        assert_eq!(courier.speed(), 2);
        assert_eq!(courier.storage_places().len(), 1);
        assert_eq!(courier.storage_places()[0].name(), Courier::DEFAULT_PLACE_NAME);
        assert!(Courier::DEFAULT_PLACE_VOLUME.contains(&courier.storage_places()[0].total_volume()));
    }

    #[tokio::test]
    async fn assign_without_orders() {
        let (service, db, _) = setup().await;
        seed_courier(&db, 1, 1, 10).await;

        let err = service.assign_orders().await.unwrap_err();
        assert!(matches!(err, AppError::NotAvailableOrders));
    }

    #[tokio::test]
    async fn assign_without_couriers_changes_nothing() {
        let (service, db, _) = setup().await;
        let order_id = OrderId::new();
        service
            .create_order(CreateOrder::new(order_id, "Baker St", 5).unwrap())
            .await
            .unwrap();

        let err = service.assign_orders().await.unwrap_err();
        assert!(matches!(err, AppError::NotAvailableCouriers));

        let order = db.create().orders().get(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), domain::OrderStatus::Created);
        assert!(order.courier_id().is_none());
    }

    #[tokio::test]
    async fn assign_picks_nearest_courier() {
        let (service, db, _) = setup().await;
        seed_courier(&db, 1, 1, 10).await;
        let near = seed_courier(&db, 4, 5, 10).await;
        let order_id = OrderId::new();
        service
            .create_order(CreateOrder::new(order_id, "Baker St", 5).unwrap())
            .await
            .unwrap();

        let assignment = service.assign_orders().await.unwrap();
        assert_eq!(assignment, Assignment { order_id, courier_id: near });

        let mut uow = db.create();
        let order = uow.orders().get(order_id).await.unwrap().unwrap();
        assert_eq!(order.courier_id(), Some(near));
        let courier = uow.couriers().get(near).await.unwrap().unwrap();
        assert!(courier.holds(order_id));
    }

    #[tokio::test]
    async fn failed_commit_leaves_order_unassigned() {
        let (service, db, _) = setup().await;
        seed_courier(&db, 1, 1, 10).await;
        let order_id = OrderId::new();
        service
            .create_order(CreateOrder::new(order_id, "Baker St", 5).unwrap())
            .await
            .unwrap();

        db.set_fail_next_commit(true);
        assert!(matches!(
            service.assign_orders().await,
            Err(AppError::Persistence(PersistenceError::CommitFailed(_)))
        ));

        let mut uow = db.create();
        let order = uow.orders().get(order_id).await.unwrap().unwrap();
        assert!(order.courier_id().is_none());
        assert_eq!(uow.couriers().get_all_free().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn move_without_assigned_orders_is_a_no_op() {
        let (service, _, _) = setup().await;
        assert_eq!(service.move_couriers().await.unwrap(), MoveReport::default());
    }

    #[tokio::test]
    async fn courier_with_two_orders_moves_once_per_tick() {
        let (service, db, _) = setup().await;
        let start = Location::new(1, 1).unwrap();
        let mut courier = Courier::restore(
            CourierId::new(),
            "Walker",
            1,
            start,
            vec![StoragePlace::new("bag", 10).unwrap()],
        )
        .unwrap();
        courier.add_storage_place("trunk", 10).unwrap();
        let courier_id = courier.id();

        let mut uow = db.create();
        uow.begin().await.unwrap();
        for (x, y) in [(4, 4), (1, 4)] {
            let mut order = Order::new(OrderId::new(), Location::new(x, y).unwrap(), 5).unwrap();
            courier.take_order(&order).unwrap();
            order.assign_courier(courier_id).unwrap();
            uow.orders().add(order).await.unwrap();
        }
        uow.couriers().add(courier).await.unwrap();
        uow.commit().await.unwrap();

        let report = service.move_couriers().await.unwrap();
        assert_eq!(report.moved, 1);
        assert!(report.completed.is_empty());

        let courier = db.create().couriers().get(courier_id).await.unwrap().unwrap();
        assert_eq!(courier.location().distance_to(&start), 1);
    }

    #[tokio::test]
    async fn courier_already_on_target_completes_without_moving() {
        let (service, db, _) = setup().await;
        let here = Location::new(3, 3).unwrap();
        let mut courier = Courier::restore(
            CourierId::new(),
            "Waiting",
            1,
            here,
            vec![StoragePlace::new("bag", 10).unwrap()],
        )
        .unwrap();
        let courier_id = courier.id();
        let mut order = Order::new(OrderId::new(), here, 5).unwrap();
        let order_id = order.id();
        courier.take_order(&order).unwrap();
        order.assign_courier(courier_id).unwrap();

        let mut uow = db.create();
        uow.begin().await.unwrap();
        uow.orders().add(order).await.unwrap();
        uow.couriers().add(courier).await.unwrap();
        uow.commit().await.unwrap();

        let report = service.move_couriers().await.unwrap();
        assert_eq!(report.moved, 0);
        assert_eq!(report.completed, vec![order_id]);

        let courier = db.create().couriers().get(courier_id).await.unwrap().unwrap();
        assert_eq!(courier.location(), here);
    }
}
