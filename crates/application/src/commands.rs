//! Command inputs. Constructors validate, so a command value is always
//! well formed.

use common::OrderId;
use domain::DomainError;

use crate::error::Result;

/// Command to accept a new order for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    order_id: OrderId,
    street: String,
    volume: i32,
}

impl CreateOrder {
    pub fn new(order_id: OrderId, street: impl Into<String>, volume: i32) -> Result<Self> {
        let street = street.into();
        if order_id.is_nil() {
            return Err(DomainError::ValueRequired("order id").into());
        }
        if street.trim().is_empty() {
            return Err(DomainError::ValueRequired("street").into());
        }
        if volume <= 0 {
            return Err(DomainError::ValueRequired("volume").into());
        }

        Ok(Self {
            order_id,
            street,
            volume,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }
}

/// Command to register a courier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCourier {
    name: String,
    speed: i32,
}

impl CreateCourier {
    pub fn new(name: impl Into<String>, speed: i32) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValueRequired("name").into());
        }
        if speed <= 0 {
            return Err(DomainError::ValueRequired("speed").into());
        }

        Ok(Self { name, speed })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }
}
