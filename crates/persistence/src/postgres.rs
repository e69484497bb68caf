//! PostgreSQL unit of work.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use common::{CourierId, OrderId};
use domain::{AggregateRoot, Courier, Order, OrderStatus};
use outbox::PostgresOutbox;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::records::{CourierRecord, CourierRow, OrderRecord, StoragePlaceRecord};
use crate::{
    CourierRepository, OrderRepository, PersistenceError, Result, Tracker, UnitOfWork,
    UnitOfWorkFactory,
};

const UNIQUE_VIOLATION: &str = "23505";

/// Creates [`PostgresUnitOfWork`]s over a shared pool.
#[derive(Clone)]
pub struct PostgresUnitOfWorkFactory {
    pool: PgPool,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    type Uow = PostgresUnitOfWork;

    fn create(&self) -> PostgresUnitOfWork {
        PostgresUnitOfWork {
            pool: self.pool.clone(),
            tx: None,
            tracker: Tracker::new(),
        }
    }
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// Reads inside a transaction lock the returned rows. The assignment
/// queries (`get_first_created`, `get_all_free`) skip rows locked by another
/// transaction, so concurrent dispatchers never pick the same order or
/// courier.
pub struct PostgresUnitOfWork {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    tracker: Tracker,
}

/// Connection of the open transaction, or a pooled one outside it.
enum Conn<'a> {
    Tx(&'a mut PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl Deref for Conn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            Conn::Tx(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            Conn::Tx(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CourierFilter {
    All,
    Free,
    ById(Uuid),
}

fn map_unique(e: sqlx::Error, aggregate: &'static str, id: Uuid) -> PersistenceError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return PersistenceError::DuplicateKey { aggregate, id };
    }
    PersistenceError::Database(e)
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: row.try_get("id")?,
        courier_id: row.try_get("courier_id")?,
        location_x: row.try_get("location_x")?,
        location_y: row.try_get("location_y")?,
        volume: row.try_get("volume")?,
        status: row.try_get("status")?,
    })
}

fn courier_from_row(row: &PgRow) -> Result<CourierRecord> {
    Ok(CourierRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        speed: row.try_get("speed")?,
        location_x: row.try_get("location_x")?,
        location_y: row.try_get("location_y")?,
    })
}

fn place_from_row(row: &PgRow) -> Result<StoragePlaceRecord> {
    Ok(StoragePlaceRecord {
        id: row.try_get("id")?,
        courier_id: row.try_get("courier_id")?,
        order_id: row.try_get("order_id")?,
        name: row.try_get("name")?,
        total_volume: row.try_get("total_volume")?,
        position: row.try_get("position")?,
    })
}

impl PostgresUnitOfWork {
    async fn conn(&mut self) -> Result<Conn<'_>> {
        match self.tx.as_mut() {
            Some(tx) => Ok(Conn::Tx(&mut **tx)),
            None => Ok(Conn::Pooled(self.pool.acquire().await?)),
        }
    }

    /// Row-locking clause for reads, empty outside a transaction.
    fn lock_clause(&self, skip_locked: bool) -> &'static str {
        match (self.tx.is_some(), skip_locked) {
            (false, _) => "",
            (true, false) => " FOR UPDATE",
            (true, true) => " FOR UPDATE SKIP LOCKED",
        }
    }

    async fn fetch_orders(&mut self, filter: &str, skip_locked: bool) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT id, courier_id, location_x, location_y, volume, status \
             FROM orders {filter} ORDER BY created_at ASC, id ASC{}",
            self.lock_clause(skip_locked)
        );
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        rows.iter()
            .map(|row| order_from_row(row).and_then(Order::try_from))
            .collect()
    }

    async fn fetch_orders_by_status(
        &mut self,
        status: OrderStatus,
        skip_locked: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT id, courier_id, location_x, location_y, volume, status \
             FROM orders WHERE status = $1 ORDER BY created_at ASC, id ASC{}{}",
            if limit.is_some() { " LIMIT $2" } else { "" },
            self.lock_clause(skip_locked)
        );
        let mut conn = self.conn().await?;
        let mut query = sqlx::query(&sql).bind(status.as_str());
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        rows.iter()
            .map(|row| order_from_row(row).and_then(Order::try_from))
            .collect()
    }

    async fn fetch_couriers(&mut self, filter: CourierFilter) -> Result<Vec<Courier>> {
        let lock = match self.lock_clause(matches!(filter, CourierFilter::Free)) {
            "" => String::new(),
            clause => clause.replacen("FOR UPDATE", "FOR UPDATE OF c", 1),
        };
        let condition = match filter {
            CourierFilter::All => "",
            CourierFilter::Free => {
                "WHERE NOT EXISTS (SELECT 1 FROM storage_places sp \
                 WHERE sp.courier_id = c.id AND sp.order_id IS NOT NULL)"
            }
            CourierFilter::ById(_) => "WHERE c.id = $1",
        };
        let sql = format!(
            "SELECT c.id, c.name, c.speed, c.location_x, c.location_y \
             FROM couriers c {condition} ORDER BY c.id ASC{lock}"
        );

        let mut conn = self.conn().await?;
        let mut query = sqlx::query(&sql);
        if let CourierFilter::ById(id) = filter {
            query = query.bind(id);
        }
        let courier_rows = query.fetch_all(&mut *conn).await?;
        let couriers = courier_rows
            .iter()
            .map(courier_from_row)
            .collect::<Result<Vec<_>>>()?;
        if couriers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = couriers.iter().map(|c| c.id).collect();
        let place_rows = sqlx::query(
            r#"
            SELECT id, courier_id, order_id, name, total_volume, position
            FROM storage_places
            WHERE courier_id = ANY($1)
            ORDER BY courier_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut places = place_rows
            .iter()
            .map(place_from_row)
            .collect::<Result<Vec<_>>>()?;

        couriers
            .into_iter()
            .map(|courier| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    places.drain(..).partition(|p| p.courier_id == courier.id);
                places = rest;
                Courier::try_from(CourierRow {
                    courier,
                    places: own,
                })
            })
            .collect()
    }

    /// Applies `write` in the open transaction, opening an implicit one when
    /// needed. A failed write rolls the transaction back.
    async fn write(&mut self, aggregate: Box<dyn AggregateRoot>, write: Write) -> Result<()> {
        let implicit = self.tx.is_none();
        if implicit {
            self.begin().await?;
        }

        let tx = self.tx.as_mut().ok_or(PersistenceError::NoTransaction)?;
        if let Err(e) = write.apply(&mut **tx).await {
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

enum Write {
    InsertOrder(OrderRecord),
    UpdateOrder(OrderRecord),
    InsertCourier(CourierRow),
    UpdateCourier(CourierRow),
}

impl Write {
    async fn apply(&self, conn: &mut PgConnection) -> Result<()> {
        match self {
            Write::InsertOrder(record) => insert_order(conn, record).await,
            Write::UpdateOrder(record) => update_order(conn, record).await,
            Write::InsertCourier(row) => insert_courier(conn, row).await,
            Write::UpdateCourier(row) => update_courier(conn, row).await,
        }
    }
}

/// Rolls back while an earlier error is being returned.
async fn rollback_quietly(tx: Transaction<'static, Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback after failed commit step failed");
    }
}

async fn insert_order(conn: &mut PgConnection, record: &OrderRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, courier_id, location_x, location_y, volume, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(record.id)
    .bind(record.courier_id)
    .bind(record.location_x)
    .bind(record.location_y)
    .bind(record.volume)
    .bind(&record.status)
    .execute(conn)
    .await
    .map_err(|e| map_unique(e, "Order", record.id))?;
    Ok(())
}

async fn update_order(conn: &mut PgConnection, record: &OrderRecord) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET courier_id = $2, location_x = $3, location_y = $4, volume = $5, status = $6
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.courier_id)
    .bind(record.location_x)
    .bind(record.location_y)
    .bind(record.volume)
    .bind(&record.status)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PersistenceError::NotFound {
            aggregate: "Order",
            id: record.id,
        });
    }
    Ok(())
}

async fn upsert_places(conn: &mut PgConnection, places: &[StoragePlaceRecord]) -> Result<()> {
    for place in places {
        sqlx::query(
            r#"
            INSERT INTO storage_places (id, courier_id, order_id, name, total_volume, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                order_id = EXCLUDED.order_id,
                name = EXCLUDED.name,
                total_volume = EXCLUDED.total_volume,
                position = EXCLUDED.position
            "#,
        )
        .bind(place.id)
        .bind(place.courier_id)
        .bind(place.order_id)
        .bind(&place.name)
        .bind(place.total_volume)
        .bind(place.position)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_courier(conn: &mut PgConnection, row: &CourierRow) -> Result<()> {
    let courier = &row.courier;
    sqlx::query(
        r#"
        INSERT INTO couriers (id, name, speed, location_x, location_y)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(courier.id)
    .bind(&courier.name)
    .bind(courier.speed)
    .bind(courier.location_x)
    .bind(courier.location_y)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique(e, "Courier", courier.id))?;

    upsert_places(conn, &row.places).await
}

async fn update_courier(conn: &mut PgConnection, row: &CourierRow) -> Result<()> {
    let courier = &row.courier;
    let result = sqlx::query(
        r#"
        UPDATE couriers
        SET name = $2, speed = $3, location_x = $4, location_y = $5
        WHERE id = $1
        "#,
    )
    .bind(courier.id)
    .bind(&courier.name)
    .bind(courier.speed)
    .bind(courier.location_x)
    .bind(courier.location_y)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PersistenceError::NotFound {
            aggregate: "Courier",
            id: courier.id,
        });
    }

    upsert_places(conn, &row.places).await
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(PersistenceError::TransactionAlreadyStarted);
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut tx = self.tx.take().ok_or(PersistenceError::NoTransaction)?;

        let messages = match self.tracker.pending_messages() {
            Ok(messages) => messages,
            Err(e) => {
                self.tracker.discard();
                rollback_quietly(tx).await;
                return Err(e);
            }
        };
        if let Err(e) = PostgresOutbox::insert(&mut tx, &messages).await {
            self.tracker.discard();
            rollback_quietly(tx).await;
            return Err(e.into());
        }
        if let Err(e) = tx.commit().await {
            self.tracker.discard();
            return Err(e.into());
        }

        metrics::counter!("outbox_messages_written_total").increment(messages.len() as u64);
        tracing::debug!(outbox_messages = messages.len(), "transaction committed");
        self.tracker.commit_succeeded();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(PersistenceError::NoTransaction)?;
        self.tracker.discard();
        tx.rollback().await?;
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
impl OrderRepository for PostgresUnitOfWork {
    async fn add(&mut self, order: Order) -> Result<()> {
        let record = OrderRecord::from(&order);
        self.write(Box::new(order), Write::InsertOrder(record)).await
    }

    async fn update(&mut self, order: Order) -> Result<()> {
        let record = OrderRecord::from(&order);
        self.write(Box::new(order), Write::UpdateOrder(record)).await
    }

    async fn get(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT id, courier_id, location_x, location_y, volume, status \
             FROM orders WHERE id = $1{}",
            self.lock_clause(false)
        );
        let mut conn = self.conn().await?;
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| order_from_row(&row).and_then(Order::try_from))
            .transpose()
    }

    async fn get_first_created(&mut self) -> Result<Option<Order>> {
        let orders = self
            .fetch_orders_by_status(OrderStatus::Created, true, Some(1))
            .await?;
        Ok(orders.into_iter().next())
    }

    async fn get_all_assigned(&mut self) -> Result<Vec<Order>> {
        self.fetch_orders_by_status(OrderStatus::Assigned, false, None)
            .await
    }

    async fn get_not_completed(&mut self) -> Result<Vec<Order>> {
        self.fetch_orders("WHERE status <> 'Completed'", false).await
    }
}

#[async_trait]
impl CourierRepository for PostgresUnitOfWork {
    async fn add(&mut self, courier: Courier) -> Result<()> {
        let row = CourierRow::from(&courier);
        self.write(Box::new(courier), Write::InsertCourier(row)).await
    }

    async fn update(&mut self, courier: Courier) -> Result<()> {
        let row = CourierRow::from(&courier);
        self.write(Box::new(courier), Write::UpdateCourier(row)).await
    }

    async fn get(&mut self, id: CourierId) -> Result<Option<Courier>> {
        let mut couriers = self
            .fetch_couriers(CourierFilter::ById(id.as_uuid()))
            .await?;
        Ok(couriers.pop())
    }

    async fn get_all_free(&mut self) -> Result<Vec<Courier>> {
        self.fetch_couriers(CourierFilter::Free).await
    }

    async fn get_all(&mut self) -> Result<Vec<Courier>> {
        self.fetch_couriers(CourierFilter::All).await
    }
}
