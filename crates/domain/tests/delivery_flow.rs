//! End-to-end domain flows: dispatch an order, walk the courier there and
//! complete the delivery.

use common::{CourierId, OrderId};
use domain::{
    AggregateRoot, Courier, DeliveryEvent, DispatchService, DomainError, Location, Order,
    OrderStatus, StoragePlace,
};

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

/// One movement tick: step once, complete on arrival.
fn tick(order: &mut Order, courier: &mut Courier) -> Result<bool, DomainError> {
    courier.step_towards(&order.location());
    if courier.location() == order.location() {
        order.complete()?;
        courier.complete_order(order)?;
        return Ok(true);
    }
    Ok(false)
}

mod dispatch_scenarios {
    use super::*;

    #[test]
    fn single_courier_takes_order() {
        let mut couriers = vec![courier(1, 1, 1, 15)];
        let mut order = order(4, 4, 5);

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();

        assert_eq!(chosen.location().distance_to(&order.location()), 6);
        assert_eq!(chosen.steps_to(&order.location()), 6.0);
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert_eq!(order.courier_id(), Some(couriers[0].id()));
        assert_eq!(couriers[0].storage_places()[0].order_id(), Some(order.id()));
    }

    #[test]
    fn courier_on_the_spot_beats_distant_one() {
        let mut couriers = vec![courier(1, 1, 1, 20), courier(2, 2, 1, 20)];
        let mut order = order(2, 2, 5);

        let chosen = DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();

        assert_eq!(chosen.steps_to(&order.location()), 0.0);
        assert_eq!(chosen.location(), Location::new(2, 2).unwrap());
        assert_eq!(couriers[0].steps_to(&order.location()), 2.0);
    }

    #[test]
    fn busy_courier_cannot_take_second_order() {
        let mut couriers = vec![courier(1, 1, 1, 10)];
        let mut first = order(2, 2, 6);
        let mut second = order(3, 3, 6);
        let service = DispatchService::new();

        service.dispatch(&mut first, &mut couriers).unwrap();
        let err = service.dispatch(&mut second, &mut couriers).unwrap_err();

        assert_eq!(err, DomainError::SuitableCourierNotFound);
        assert_eq!(second.status(), OrderStatus::Created);
    }
}

mod delivery_scenarios {
    use super::*;

    #[test]
    fn courier_walks_to_order_and_completes_it() {
        let mut couriers = vec![courier(1, 1, 1, 15)];
        let mut order = order(4, 4, 5);
        DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();
        let courier = &mut couriers[0];

        let mut ticks = 0;
        let mut arrived = false;
        while !arrived {
            ticks += 1;
            assert!(ticks <= 6, "courier overshot");
            arrived = tick(&mut order, courier).unwrap();
        }

        assert_eq!(ticks, 6);
        assert_eq!(courier.location(), order.location());
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(courier.is_free());

        let events = order.domain_events();
        assert_eq!(events.len(), 1);
        let DeliveryEvent::OrderCompleted(event) = &events[0];
        assert_eq!(event.order_id, order.id());
        assert_eq!(event.order_status, "Completed");
    }

    #[test]
    fn completed_order_cannot_move_backwards() {
        let mut couriers = vec![courier(3, 3, 1, 15)];
        let mut order = order(3, 3, 5);
        DispatchService::new()
            .dispatch(&mut order, &mut couriers)
            .unwrap();
        assert!(tick(&mut order, &mut couriers[0]).unwrap());

        assert!(order.assign_courier(CourierId::new()).is_err());
        assert!(order.complete().is_err());
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.domain_events().len(), 1);
    }

    #[test]
    fn freed_courier_can_be_dispatched_again() {
        let mut couriers = vec![courier(1, 1, 2, 10)];
        let mut first = order(1, 2, 8);
        let service = DispatchService::new();
        service.dispatch(&mut first, &mut couriers).unwrap();
        while !tick(&mut first, &mut couriers[0]).unwrap() {}

        let mut second = order(5, 5, 8);
        let chosen = service.dispatch(&mut second, &mut couriers).unwrap();
        assert_eq!(chosen.steps_to(&second.location()), 3.5);
        assert_eq!(second.status(), OrderStatus::Assigned);
    }
}
