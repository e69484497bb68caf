//! Single-order storage slot owned by a courier.

use common::{OrderId, StoragePlaceId};

use crate::error::{DomainError, Result};

/// A slot in a courier's equipment that holds at most one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePlace {
    id: StoragePlaceId,
    name: String,
    total_volume: i32,
    order_id: Option<OrderId>,
}

impl StoragePlace {
    /// Creates an empty storage place.
    pub fn new(name: impl Into<String>, total_volume: i32) -> Result<Self> {
        Self::restore(StoragePlaceId::new(), name, total_volume, None)
    }

    /// Rebuilds a storage place from persisted state.
    pub fn restore(
        id: StoragePlaceId,
        name: impl Into<String>,
        total_volume: i32,
        order_id: Option<OrderId>,
    ) -> Result<Self> {
        let name = name.into();
        if id.is_nil() {
            return Err(DomainError::ValueRequired("storage place id"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::ValueRequired("name"));
        }
        if total_volume <= 0 {
            return Err(DomainError::ValueRequired("total volume"));
        }
        if order_id.is_some_and(|id| id.is_nil()) {
            return Err(DomainError::ValueRequired("order id"));
        }

        Ok(Self {
            id,
            name,
            total_volume,
            order_id,
        })
    }

    pub fn id(&self) -> StoragePlaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_volume(&self) -> i32 {
        self.total_volume
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn is_occupied(&self) -> bool {
        self.order_id.is_some()
    }

    /// True iff the place is empty and `0 < volume <= total_volume`.
    pub fn can_store(&self, volume: i32) -> bool {
        !self.is_occupied() && volume > 0 && volume <= self.total_volume
    }

    /// Puts an order into the place.
    pub fn store(&mut self, order_id: OrderId, volume: i32) -> Result<()> {
        if order_id.is_nil() {
            return Err(DomainError::ValueRequired("order id"));
        }
        if volume <= 0 {
            return Err(DomainError::ValueRequired("volume"));
        }
        if !self.can_store(volume) {
            return Err(DomainError::CannotStoreOrder);
        }

        self.order_id = Some(order_id);
        Ok(())
    }

    /// Empties the place if it holds `order_id`.
    pub fn clear(&mut self, order_id: OrderId) -> Result<()> {
        if self.order_id != Some(order_id) {
            return Err(DomainError::OrderNotHeld(order_id));
        }
        self.order_id = None;
        Ok(())
    }
}
