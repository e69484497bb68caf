//! Read-side handlers.

use common::{CourierId, OrderId};
use domain::{Courier, Location, Order};
use persistence::{UnitOfWork, UnitOfWorkFactory};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocationView {
    pub x: i32,
    pub y: i32,
}

impl From<Location> for LocationView {
    fn from(location: Location) -> Self {
        Self {
            x: location.x(),
            y: location.y(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourierView {
    pub id: CourierId,
    pub name: String,
    pub location: LocationView,
}

impl From<&Courier> for CourierView {
    fn from(courier: &Courier) -> Self {
        Self {
            id: courier.id(),
            name: courier.name().to_string(),
            location: courier.location().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub location: LocationView,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            location: order.location().into(),
        }
    }
}

/// Answers queries outside any transaction.
pub struct DeliveryQueries<F> {
    uow: F,
}

impl<F: UnitOfWorkFactory> DeliveryQueries<F> {
    pub fn new(uow: F) -> Self {
        Self { uow }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all_couriers(&self) -> Result<Vec<CourierView>> {
        let couriers = self.uow.create().couriers().get_all().await?;
        Ok(couriers.iter().map(CourierView::from).collect())
    }

    /// Orders that are waiting for or on their way to the customer.
    #[tracing::instrument(skip(self))]
    pub async fn get_not_completed_orders(&self) -> Result<Vec<OrderView>> {
        let orders = self.uow.create().orders().get_not_completed().await?;
        Ok(orders.iter().map(OrderView::from).collect())
    }
}
