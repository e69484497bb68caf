//! Storage-shaped records and their pure conversions to and from aggregates.
//!
//! Records mirror the table columns one to one. Converting a record back
//! into an aggregate re-runs the aggregate's validation, so a row that breaks
//! an invariant surfaces as [`PersistenceError::CorruptRecord`].

use common::{CourierId, OrderId, StoragePlaceId};
use domain::{Courier, DomainError, Location, Order, OrderStatus, StoragePlace};
use uuid::Uuid;

use crate::{PersistenceError, Result};

/// Row of the `couriers` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierRecord {
    pub id: Uuid,
    pub name: String,
    pub speed: i32,
    pub location_x: i32,
    pub location_y: i32,
}

/// Row of the `storage_places` table.
///
/// `position` keeps the courier's declaration order, which first-fit
/// placement depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePlaceRecord {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub order_id: Option<Uuid>,
    pub name: String,
    pub total_volume: i32,
    pub position: i32,
}

/// A courier row together with its storage place rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierRow {
    pub courier: CourierRecord,
    pub places: Vec<StoragePlaceRecord>,
}

/// Row of the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: Uuid,
    pub courier_id: Option<Uuid>,
    pub location_x: i32,
    pub location_y: i32,
    pub volume: i32,
    pub status: String,
}

fn corrupt(aggregate: &'static str, id: Uuid, reason: impl ToString) -> PersistenceError {
    PersistenceError::CorruptRecord {
        aggregate,
        id,
        reason: reason.to_string(),
    }
}

impl From<&Courier> for CourierRow {
    fn from(courier: &Courier) -> Self {
        let location = courier.location();
        let courier_id = courier.id().as_uuid();
        let places = courier
            .storage_places()
            .iter()
            .zip(0..)
            .map(|(place, position)| StoragePlaceRecord {
                id: place.id().as_uuid(),
                courier_id,
                order_id: place.order_id().map(|id| id.as_uuid()),
                name: place.name().to_string(),
                total_volume: place.total_volume(),
                position,
            })
            .collect();

        CourierRow {
            courier: CourierRecord {
                id: courier_id,
                name: courier.name().to_string(),
                speed: courier.speed(),
                location_x: location.x(),
                location_y: location.y(),
            },
            places,
        }
    }
}

impl TryFrom<CourierRow> for Courier {
    type Error = PersistenceError;

    fn try_from(row: CourierRow) -> Result<Self> {
        let CourierRow {
            courier,
            mut places,
        } = row;
        let id = courier.id;
        let invalid = move |e: DomainError| corrupt("Courier", id, e);

        places.sort_by_key(|p| p.position);
        let places = places
            .into_iter()
            .map(|p| {
                if p.courier_id != id {
                    return Err(corrupt(
                        "Courier",
                        id,
                        format!("storage place {} belongs to {}", p.id, p.courier_id),
                    ));
                }
                StoragePlace::restore(
                    StoragePlaceId::from_uuid(p.id),
                    p.name,
                    p.total_volume,
                    p.order_id.map(OrderId::from_uuid),
                )
                .map_err(invalid)
            })
            .collect::<Result<Vec<_>>>()?;

        let location = Location::new(courier.location_x, courier.location_y).map_err(invalid)?;
        Courier::restore(
            CourierId::from_uuid(id),
            courier.name,
            courier.speed,
            location,
            places,
        )
        .map_err(invalid)
    }
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        let location = order.location();
        OrderRecord {
            id: order.id().as_uuid(),
            courier_id: order.courier_id().map(|id| id.as_uuid()),
            location_x: location.x(),
            location_y: location.y(),
            volume: order.volume(),
            status: order.status().as_str().to_string(),
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = PersistenceError;

    fn try_from(record: OrderRecord) -> Result<Self> {
        let id = record.id;
        let status: OrderStatus = record.status.parse().map_err(|e| corrupt("Order", id, e))?;
        let location = Location::new(record.location_x, record.location_y)
            .map_err(|e| corrupt("Order", id, e))?;

        Order::restore(
            OrderId::from_uuid(id),
            record.courier_id.map(CourierId::from_uuid),
            location,
            record.volume,
            status,
        )
        .map_err(|e| corrupt("Order", id, e))
    }
}
