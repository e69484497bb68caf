//! Nearest-courier dispatch.

use crate::courier::Courier;
use crate::error::{DomainError, Result};
use crate::order::Order;

/// Picks the courier that reaches an order soonest and hands it the order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchService;

impl DispatchService {
    pub fn new() -> Self {
        Self
    }

    /// Assigns `order` to the best courier in `couriers` and returns it.
    ///
    /// Only couriers with room for the order are considered. The one with
    /// the smallest [`Courier::steps_to`] wins; on a tie the earliest in the
    /// slice wins. Both mutations are applied to copies first and written
    /// back only when both succeed, so on error neither argument changes.
    #[tracing::instrument(skip_all, fields(order_id = %order.id()))]
    pub fn dispatch<'a>(
        &self,
        order: &mut Order,
        couriers: &'a mut [Courier],
    ) -> Result<&'a mut Courier> {
        if !order.status().can_assign() {
            return Err(DomainError::OrderAlreadyAssigned);
        }
        if couriers.is_empty() {
            return Err(DomainError::MissingInput("couriers"));
        }

        let target = order.location();
        let mut best: Option<(usize, f64)> = None;
        for (index, courier) in couriers.iter().enumerate() {
            if !courier.can_take_order(order) {
                continue;
            }
            let steps = courier.steps_to(&target);
            if best.is_none_or(|(_, min)| steps < min) {
                best = Some((index, steps));
            }
        }
        let (index, steps) = best.ok_or(DomainError::SuitableCourierNotFound)?;

        let mut courier = couriers[index].clone();
        let mut assigned = order.clone();
        courier.take_order(&assigned)?;
        assigned.assign_courier(courier.id())?;

        tracing::debug!(courier_id = %courier.id(), steps, "order dispatched");

        *order = assigned;
        let slot = &mut couriers[index];
        *slot = courier;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use common::{CourierId, OrderId};

    use super::*;
    use crate::courier::StoragePlace;
    use crate::kernel::Location;
    use crate::order::OrderStatus;

    fn courier(x: i32, y: i32, speed: i32, volume: i32) -> Courier {
        Courier::restore(
            CourierId::new(),
            "courier",
            speed,
            Location::new(x, y).unwrap(),
            vec![StoragePlace::new("bag", volume).unwrap()],
        )
        .unwrap()
    }

    fn order(x: i32, y: i32, volume: i32) -> Order {
        Order::new(OrderId::new(), Location::new(x, y).unwrap(), volume).unwrap()
    }

    #[test]
    fn test_single_courier_is_assigned() {
        let mut couriers = vec![courier(1, 1, 1, 15)];
        let mut order = order(4, 4, 5);

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();

        assert_eq!(chosen.steps_to(&order.location()), 6.0);
        assert_eq!(chosen.location().distance_to(&order.location()), 6);
        assert_eq!(chosen.storage_places()[0].order_id(), Some(order.id()));
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert_eq!(order.courier_id(), Some(couriers[0].id()));
    }

    #[test]
    fn test_nearest_courier_wins() {
        let mut couriers = vec![courier(1, 1, 1, 20), courier(2, 2, 1, 20)];
        let mut order = order(2, 2, 5);
        let near = couriers[1].id();

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();

        assert_eq!(chosen.id(), near);
        assert_eq!(order.courier_id(), Some(near));
        assert!(couriers[0].is_free());
    }

    #[test]
    fn test_speed_is_taken_into_account() {
        let mut couriers = vec![courier(5, 5, 1, 20), courier(1, 1, 10, 20)];
        let mut order = order(6, 6, 5);
        let fast = couriers[1].id();

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();
        assert_eq!(chosen.id(), fast);
    }

    #[test]
    fn test_tie_goes_to_first_courier() {
        let mut couriers = vec![courier(1, 3, 1, 20), courier(3, 1, 1, 20)];
        let mut order = order(2, 2, 5);
        let first = couriers[0].id();

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();
        assert_eq!(chosen.id(), first);
    }

    #[test]
    fn test_couriers_without_room_are_skipped() {
        let mut couriers = vec![courier(2, 2, 1, 3), courier(9, 9, 1, 20)];
        let mut order = order(2, 2, 5);
        let roomy = couriers[1].id();

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();
        assert_eq!(chosen.id(), roomy);
    }

    #[test]
    fn test_no_suitable_courier() {
        let mut couriers = vec![courier(1, 1, 1, 2), courier(2, 2, 1, 4)];
        let mut order = order(3, 3, 5);

        let err = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap_err();

        assert_eq!(err, DomainError::SuitableCourierNotFound);
        assert_eq!(order.status(), OrderStatus::Created);
        assert!(couriers.iter().all(Courier::is_free));
    }

    #[test]
    fn test_empty_courier_list() {
        let mut order = order(3, 3, 5);
        let err = DispatchService::new()
            .dispatch(&mut order, &mut [])
            .unwrap_err();
        assert_eq!(err, DomainError::MissingInput("couriers"));
    }

    #[test]
    fn test_assigned_order_is_rejected() {
        let mut couriers = vec![courier(1, 1, 1, 20)];
        let mut order = order(3, 3, 5);
        order.assign_courier(CourierId::new()).unwrap();

        let err = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap_err();

        assert_eq!(err, DomainError::OrderAlreadyAssigned);
        assert!(couriers[0].is_free());
    }
}
