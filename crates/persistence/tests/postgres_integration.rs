//! PostgreSQL integration tests for the unit of work.
//!
//! These tests use a shared PostgreSQL container.
//! Run with:
//!
//! ```bash
//! cargo test -p persistence --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{CourierId, OrderId};
use domain::{AggregateRoot, Courier, DispatchService, Location, Order, OrderStatus};
use outbox::{OutboxError, OutboxStore, PostgresOutbox};
use persistence::{PersistenceError, PostgresUnitOfWorkFactory, UnitOfWork, UnitOfWorkFactory};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresUnitOfWorkFactory::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_factory() -> PostgresUnitOfWorkFactory {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE storage_places, couriers, orders, outbox")
        .execute(&pool)
        .await
        .unwrap();

    PostgresUnitOfWorkFactory::new(pool)
}

fn courier_at(x: i32, y: i32) -> Courier {
    Courier::new("courier", 1, Location::new(x, y).unwrap()).unwrap()
}

fn order_at(x: i32, y: i32, volume: i32) -> Order {
    Order::new(OrderId::new(), Location::new(x, y).unwrap(), volume).unwrap()
}

#[tokio::test]
#[serial]
async fn add_and_get_courier_with_places() {
    let factory = get_test_factory().await;
    let mut courier = courier_at(3, 7);
    courier.add_storage_place("trunk", 60).unwrap();
    let id = courier.id();

    factory.create().couriers().add(courier.clone()).await.unwrap();

    let loaded = factory.create().couriers().get(id).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "courier");
    assert_eq!(loaded.location(), Location::new(3, 7).unwrap());
    assert_eq!(loaded.storage_places(), courier.storage_places());
}

#[tokio::test]
#[serial]
async fn missing_aggregates_return_none() {
    let factory = get_test_factory().await;
    let mut uow = factory.create();
    assert!(uow.couriers().get(CourierId::new()).await.unwrap().is_none());
    assert!(uow.orders().get(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn duplicate_order_is_rejected() {
    let factory = get_test_factory().await;
    let order = order_at(2, 2, 5);
    factory.create().orders().add(order.clone()).await.unwrap();

    let err = factory.create().orders().add(order).await.unwrap_err();
    assert!(matches!(err, PersistenceError::DuplicateKey { .. }));
}

#[tokio::test]
#[serial]
async fn dispatch_persists_order_and_courier_atomically() {
    let factory = get_test_factory().await;
    factory.create().couriers().add(courier_at(1, 1)).await.unwrap();
    factory.create().orders().add(order_at(4, 4, 5)).await.unwrap();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    let mut order = uow.orders().get_first_created().await.unwrap().unwrap();
    let mut couriers = uow.couriers().get_all_free().await.unwrap();
    let courier = DispatchService::new()
        .dispatch(&mut order, &mut couriers)
        .unwrap()
        .clone();
    uow.orders().update(order.clone()).await.unwrap();
    uow.couriers().update(courier.clone()).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = factory.create();
    let stored = uow.orders().get(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Assigned);
    assert_eq!(stored.courier_id(), Some(courier.id()));
    assert!(uow.couriers().get_all_free().await.unwrap().is_empty());
    assert!(uow.orders().get_first_created().await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn commit_writes_one_outbox_row_per_event() {
    let factory = get_test_factory().await;
    let mut order = order_at(4, 4, 5);
    factory.create().orders().add(order.clone()).await.unwrap();
    order.assign_courier(CourierId::new()).unwrap();
    order.complete().unwrap();
    let event_id = order.domain_events()[0].event_id();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().update(order).await.unwrap();
    uow.commit().await.unwrap();

    let outbox = PostgresOutbox::new(factory.pool().clone());
    let rows = outbox.fetch_unprocessed(20).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, event_id);
    assert_eq!(rows[0].name, "order.completed");
}

#[tokio::test]
#[serial]
async fn replayed_event_is_rejected_at_commit() {
    let factory = get_test_factory().await;
    let mut order = order_at(4, 4, 5);
    factory.create().orders().add(order.clone()).await.unwrap();
    order.assign_courier(CourierId::new()).unwrap();
    order.complete().unwrap();
    let event_id = order.domain_events()[0].event_id();
    let replay = order.clone();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().update(order).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().update(replay).await.unwrap();
    let err = uow.commit().await.unwrap_err();

    assert!(matches!(
        err,
        PersistenceError::Outbox(OutboxError::DuplicateMessage(id)) if id == event_id
    ));
    assert!(!uow.in_transaction());
    let outbox = PostgresOutbox::new(factory.pool().clone());
    assert_eq!(outbox.fetch_unprocessed(20).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn rollback_discards_state_and_events() {
    let factory = get_test_factory().await;
    let mut order = order_at(4, 4, 5);
    factory.create().orders().add(order.clone()).await.unwrap();
    order.assign_courier(CourierId::new()).unwrap();
    order.complete().unwrap();
    let id = order.id();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().update(order).await.unwrap();
    uow.rollback().await.unwrap();

    let stored = factory.create().orders().get(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Created);
    let outbox = PostgresOutbox::new(factory.pool().clone());
    assert!(outbox.fetch_unprocessed(20).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn failed_write_rolls_back_transaction() {
    let factory = get_test_factory().await;
    let mut uow = factory.create();
    let order = order_at(1, 2, 3);
    let id = order.id();

    uow.begin().await.unwrap();
    uow.orders().add(order).await.unwrap();
    let err = uow.couriers().update(courier_at(1, 1)).await.unwrap_err();

    assert!(matches!(err, PersistenceError::NotFound { .. }));
    assert!(!uow.in_transaction());
    assert!(factory.create().orders().get(id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn failed_insert_reports_its_own_error() {
    let factory = get_test_factory().await;
    let existing = order_at(2, 2, 5);
    factory.create().orders().add(existing.clone()).await.unwrap();
    let fresh = order_at(3, 3, 5);
    let fresh_id = fresh.id();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().add(fresh).await.unwrap();
    let err = uow.orders().add(existing).await.unwrap_err();

    assert!(matches!(err, PersistenceError::DuplicateKey { aggregate: "Order", .. }));
    assert!(!uow.in_transaction());
    assert!(factory.create().orders().get(fresh_id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn locked_created_order_is_skipped() {
    let factory = get_test_factory().await;
    let first = order_at(1, 1, 1);
    let second = order_at(2, 2, 1);
    factory.create().orders().add(first.clone()).await.unwrap();
    factory.create().orders().add(second.clone()).await.unwrap();

    let mut holder = factory.create();
    holder.begin().await.unwrap();
    let held = holder.orders().get_first_created().await.unwrap().unwrap();
    assert_eq!(held.id(), first.id());

    let mut other = factory.create();
    other.begin().await.unwrap();
    let next = other.orders().get_first_created().await.unwrap().unwrap();
    assert_eq!(next.id(), second.id());

    other.rollback().await.unwrap();
    holder.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn order_queries_filter_by_status() {
    let factory = get_test_factory().await;
    let created = order_at(1, 1, 1);
    let mut assigned = order_at(2, 2, 1);
    assigned.assign_courier(CourierId::new()).unwrap();
    let mut completed = order_at(3, 3, 1);
    completed.assign_courier(CourierId::new()).unwrap();
    completed.complete().unwrap();

    let mut uow = factory.create();
    uow.begin().await.unwrap();
    uow.orders().add(created).await.unwrap();
    uow.orders().add(assigned.clone()).await.unwrap();
    uow.orders().add(completed).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = factory.create();
    let all_assigned = uow.orders().get_all_assigned().await.unwrap();
    assert_eq!(all_assigned.len(), 1);
    assert_eq!(all_assigned[0].id(), assigned.id());
    assert_eq!(uow.orders().get_not_completed().await.unwrap().len(), 2);
}
