//! Courier aggregate implementation.

use common::{CourierId, OrderId, StoragePlaceId};
use rand::Rng;
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, EventBuffer};
use crate::error::{DomainError, Result};
use crate::events::DeliveryEvent;
use crate::kernel::Location;
use crate::order::Order;

use super::StoragePlace;

/// Courier aggregate root.
///
/// A courier moves across the grid at a fixed speed and carries orders in
/// its storage places, one order per place.
#[derive(Debug, Clone)]
pub struct Courier {
    id: CourierId,
    name: String,
    speed: i32,
    location: Location,
    storage_places: Vec<StoragePlace>,
    events: EventBuffer,
}

impl Courier {
    /// Name of the storage place every courier starts with.
    pub const DEFAULT_PLACE_NAME: &'static str = "bag";

    /// Capacity range of the default storage place.
    pub const DEFAULT_PLACE_VOLUME: std::ops::RangeInclusive<i32> = 10..=40;

    /// Creates a courier with a single "bag" of random capacity.
    pub fn new(name: impl Into<String>, speed: i32, location: Location) -> Result<Self> {
        Self::new_with_rng(name, speed, location, &mut rand::thread_rng())
    }

    /// Like [`Courier::new`], drawing the bag capacity from `rng`.
    pub fn new_with_rng<R: Rng + ?Sized>(
        name: impl Into<String>,
        speed: i32,
        location: Location,
        rng: &mut R,
    ) -> Result<Self> {
        let volume = rng.gen_range(Self::DEFAULT_PLACE_VOLUME);
        let bag = StoragePlace::new(Self::DEFAULT_PLACE_NAME, volume)?;
        Self::restore(CourierId::new(), name, speed, location, vec![bag])
    }

    /// Rebuilds a courier from persisted state without raising events.
    pub fn restore(
        id: CourierId,
        name: impl Into<String>,
        speed: i32,
        location: Location,
        storage_places: Vec<StoragePlace>,
    ) -> Result<Self> {
        let name = name.into();
        if id.is_nil() {
            return Err(DomainError::ValueRequired("courier id"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::ValueRequired("name"));
        }
        if speed <= 0 {
            return Err(DomainError::ValueRequired("speed"));
        }
        if storage_places.is_empty() {
            return Err(DomainError::ValueRequired("storage places"));
        }

        Ok(Self {
            id,
            name,
            speed,
            location,
            storage_places,
            events: EventBuffer::new(),
        })
    }
}

// Query methods
impl Courier {
    pub fn id(&self) -> CourierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Storage places in declaration order.
    pub fn storage_places(&self) -> &[StoragePlace] {
        &self.storage_places
    }

    /// True iff no storage place holds an order.
    pub fn is_free(&self) -> bool {
        self.storage_places.iter().all(|p| !p.is_occupied())
    }

    pub fn holds(&self, order_id: OrderId) -> bool {
        self.storage_places
            .iter()
            .any(|p| p.order_id() == Some(order_id))
    }

    /// True iff some storage place can hold the order's volume.
    pub fn can_take_order(&self, order: &Order) -> bool {
        self.storage_places
            .iter()
            .any(|p| p.can_store(order.volume()))
    }

    /// Estimated travel time to `target`: distance divided by speed.
    pub fn steps_to(&self, target: &Location) -> f64 {
        f64::from(self.location.distance_to(target)) / f64::from(self.speed)
    }
}

// Command methods
impl Courier {
    /// Adds another storage place and returns its id.
    pub fn add_storage_place(
        &mut self,
        name: impl Into<String>,
        total_volume: i32,
    ) -> Result<StoragePlaceId> {
        let place = StoragePlace::new(name, total_volume)?;
        let id = place.id();
        self.storage_places.push(place);
        Ok(id)
    }

    /// Stores the order in the first storage place that fits it.
    pub fn take_order(&mut self, order: &Order) -> Result<StoragePlaceId> {
        let place = self
            .storage_places
            .iter_mut()
            .find(|p| p.can_store(order.volume()))
            .ok_or(DomainError::NoFreeStoragePlace)?;

        place.store(order.id(), order.volume())?;
        Ok(place.id())
    }

    /// Frees the storage place holding the order.
    pub fn complete_order(&mut self, order: &Order) -> Result<()> {
        let place = self
            .storage_places
            .iter_mut()
            .find(|p| p.order_id() == Some(order.id()))
            .ok_or(DomainError::OrderNotHeld(order.id()))?;

        place.clear(order.id())
    }

    /// Moves one grid unit towards `target`, x first.
    pub fn step_towards(&mut self, target: &Location) {
        self.location = self.location.step_towards(target);
    }
}

impl PartialEq for Courier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Courier {}

impl AggregateRoot for Courier {
    fn aggregate_type(&self) -> &'static str {
        "Courier"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn domain_events(&self) -> &[DeliveryEvent] {
        self.events.events()
    }

    fn clear_domain_events(&mut self) {
        self.events.clear();
    }
}
