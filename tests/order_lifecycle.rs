//! Lifecycle behaviour of `OrderService` over the in-memory store: creation,
//! rollback, cancellation, transitions, visibility, listing and concurrency.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use order_core::domain::order::{
    CreateOrderRequest, OrderFilter, OrderItemRequest, OrderStatus, SortOrder,
};
use order_core::domain::policy::Caller;
use order_core::{DomainError, InMemoryStore, OrderService};
use uuid::Uuid;

fn price(p: &str) -> BigDecimal {
    BigDecimal::from_str(p).expect("valid decimal")
}

fn request(items: &[(Uuid, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .iter()
            .map(|&(product_id, quantity)| OrderItemRequest {
                product_id,
                quantity,
            })
            .collect(),
        shipping_address: "742 Evergreen Terrace".to_string(),
        notes: None,
    }
}

fn setup() -> (InMemoryStore, OrderService<InMemoryStore>) {
    let store = InMemoryStore::new();
    let service = OrderService::new(store.clone());
    (store, service)
}

// ── createOrder ──────────────────────────────────────────────────────────────

#[test]
fn create_order_prices_items_and_decrements_stock() {
    let (store, service) = setup();
    let kettle = store.add_product("Kettle", price("24.90"), 5).unwrap();
    let tea = store.add_product("Tea", price("3.15"), 50).unwrap();
    let user = Uuid::new_v4();

    let order = service
        .create_order(user, request(&[(kettle, 2), (tea, 3)]))
        .expect("create failed");

    assert_eq!(order.user_id, user);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, price("59.25"));
    assert_eq!(order.shipping_address, "742 Evergreen Terrace");
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].unit_price, price("24.90"));
    assert_eq!(
        order.items[0].product.as_ref().map(|p| p.name.as_str()),
        Some("Kettle")
    );
    assert_eq!(store.product_stock(kettle).unwrap(), Some(3));
    assert_eq!(store.product_stock(tea).unwrap(), Some(47));
}

#[test]
fn total_is_the_sum_of_captured_unit_prices() {
    let (store, service) = setup();
    let a = store.add_product("A", price("0.10"), 100).unwrap();
    let b = store.add_product("B", price("0.20"), 100).unwrap();

    let order = service
        .create_order(Uuid::new_v4(), request(&[(a, 7), (b, 9)]))
        .unwrap();

    let sum = order
        .items
        .iter()
        .fold(BigDecimal::from(0), |acc, item| {
            acc + &item.unit_price * BigDecimal::from(item.quantity)
        });
    assert_eq!(order.total_amount, sum);
    assert_eq!(order.total_amount.to_string(), "2.50");
}

#[test]
fn insufficient_stock_anywhere_rolls_back_everything() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();
    let b = store.add_product("B", price("1.00"), 1).unwrap();

    let err = service
        .create_order(Uuid::new_v4(), request(&[(a, 2), (b, 5)]))
        .unwrap_err();

    match err {
        DomainError::InsufficientStock {
            product_name,
            available,
            requested,
            ..
        } => {
            assert_eq!(product_name, "B");
            assert_eq!(available, 1);
            assert_eq!(requested, 5);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(store.product_stock(a).unwrap(), Some(10));
    assert_eq!(store.product_stock(b).unwrap(), Some(1));
    assert_eq!(store.order_count().unwrap(), 0);
}

#[test]
fn unknown_product_fails_without_side_effects() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();

    let err = service
        .create_order(Uuid::new_v4(), request(&[(a, 1), (Uuid::new_v4(), 1)]))
        .unwrap_err();

    assert!(matches!(err, DomainError::ProductNotFound(_)));
    assert_eq!(store.product_stock(a).unwrap(), Some(10));
}

#[test]
fn malformed_requests_are_validation_errors() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();
    let user = Uuid::new_v4();

    let mut empty_address = request(&[(a, 1)]);
    empty_address.shipping_address = String::new();
    assert!(matches!(
        service.create_order(user, empty_address),
        Err(DomainError::Validation(_))
    ));

    assert!(matches!(
        service.create_order(user, request(&[])),
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        service.create_order(user, request(&[(a, 0)])),
        Err(DomainError::Validation(_))
    ));

    let mut long_notes = request(&[(a, 1)]);
    long_notes.notes = Some("x".repeat(501));
    assert!(matches!(
        service.create_order(user, long_notes),
        Err(DomainError::Validation(_))
    ));

    assert_eq!(store.product_stock(a).unwrap(), Some(10));
}

// ── cancelOrder ──────────────────────────────────────────────────────────────

#[test]
fn cancel_restores_stock_and_second_cancel_is_invalid_state() {
    let (store, service) = setup();
    let a = store.add_product("A", price("2.00"), 4).unwrap();
    let b = store.add_product("B", price("3.00"), 4).unwrap();
    let user = Uuid::new_v4();
    let caller = Caller::customer(user);
    let order = service
        .create_order(user, request(&[(a, 3), (b, 4)]))
        .unwrap();

    let cancelled = service.cancel_order(order.id, &caller).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.total_amount, order.total_amount);
    assert_eq!(store.product_stock(a).unwrap(), Some(4));
    assert_eq!(store.product_stock(b).unwrap(), Some(4));

    let err = service.cancel_order(order.id, &caller).unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(OrderStatus::Cancelled)));
    assert_eq!(store.product_stock(a).unwrap(), Some(4));
    assert_eq!(store.product_stock(b).unwrap(), Some(4));
}

#[test]
fn confirmed_orders_can_be_cancelled_but_shipped_cannot() {
    let (store, service) = setup();
    let a = store.add_product("A", price("2.00"), 10).unwrap();
    let user = Uuid::new_v4();
    let admin = Caller::admin(Uuid::new_v4());

    let confirmed = service.create_order(user, request(&[(a, 1)])).unwrap();
    service
        .update_status(confirmed.id, OrderStatus::Confirmed, &admin)
        .unwrap();
    let cancelled = service.cancel_order(confirmed.id, &admin).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let shipped = service.create_order(user, request(&[(a, 2)])).unwrap();
    service
        .update_status(shipped.id, OrderStatus::Confirmed, &admin)
        .unwrap();
    service
        .update_status(shipped.id, OrderStatus::Shipped, &admin)
        .unwrap();
    let err = service
        .cancel_order(shipped.id, &Caller::customer(user))
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(OrderStatus::Shipped)));
    assert_eq!(store.product_stock(a).unwrap(), Some(8));
}

#[test]
fn customer_cannot_cancel_someone_elses_order() {
    let (store, service) = setup();
    let a = store.add_product("A", price("2.00"), 10).unwrap();
    let order = service
        .create_order(Uuid::new_v4(), request(&[(a, 1)]))
        .unwrap();

    let err = service
        .cancel_order(order.id, &Caller::customer(Uuid::new_v4()))
        .unwrap_err();

    assert!(matches!(err, DomainError::AccessDenied));
    assert_eq!(store.product_stock(a).unwrap(), Some(9));
}

#[test]
fn failed_restoration_aborts_the_whole_cancellation() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 5).unwrap();
    let b = store.add_product("B", price("1.00"), 5).unwrap();
    let user = Uuid::new_v4();
    let order = service
        .create_order(user, request(&[(a, 2), (b, 2)]))
        .unwrap();
    store.remove_product(b).unwrap();

    let err = service
        .cancel_order(order.id, &Caller::customer(user))
        .unwrap_err();

    assert!(matches!(err, DomainError::ProductNotFound(id) if id == b));
    assert_eq!(store.product_stock(a).unwrap(), Some(3));
    let reloaded = service.get_order(order.id, None).unwrap();
    assert_eq!(reloaded.status, OrderStatus::Pending);
}

#[test]
fn cancelling_a_missing_order_is_not_found() {
    let (_store, service) = setup();
    let err = service
        .cancel_order(Uuid::new_v4(), &Caller::admin(Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(err, DomainError::OrderNotFound));
}

// ── updateStatus ─────────────────────────────────────────────────────────────

#[test]
fn status_follows_the_transition_table() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();
    let admin = Caller::admin(Uuid::new_v4());
    let order = service
        .create_order(Uuid::new_v4(), request(&[(a, 1)]))
        .unwrap();

    let err = service
        .update_status(order.id, OrderStatus::Shipped, &admin)
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        }
    ));

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = service.update_status(order.id, next, &admin).unwrap();
        assert_eq!(updated.status, next);
        assert_eq!(updated.total_amount, order.total_amount);
        assert_eq!(updated.items.len(), order.items.len());
    }

    for next in OrderStatus::ALL {
        assert!(matches!(
            service.update_status(order.id, next, &admin),
            Err(DomainError::InvalidTransition {
                from: OrderStatus::Delivered,
                ..
            })
        ));
    }
}

#[test]
fn only_admins_update_status() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();
    let user = Uuid::new_v4();
    let order = service.create_order(user, request(&[(a, 1)])).unwrap();

    let err = service
        .update_status(order.id, OrderStatus::Confirmed, &Caller::customer(user))
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
    assert_eq!(
        service.get_order(order.id, None).unwrap().status,
        OrderStatus::Pending
    );
}

#[test]
fn updating_a_missing_order_is_not_found() {
    let (_store, service) = setup();
    let err = service
        .update_status(
            Uuid::new_v4(),
            OrderStatus::Confirmed,
            &Caller::admin(Uuid::new_v4()),
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::OrderNotFound));
}

// ── getOrder ─────────────────────────────────────────────────────────────────

#[test]
fn foreign_order_is_access_denied_for_customers_only() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 10).unwrap();
    let owner = Uuid::new_v4();
    let order = service.create_order(owner, request(&[(a, 1)])).unwrap();

    let err = service
        .get_order(order.id, Some(&Caller::customer(Uuid::new_v4())))
        .unwrap_err();
    assert!(matches!(err, DomainError::AccessDenied));

    let seen = service
        .get_order(order.id, Some(&Caller::admin(Uuid::new_v4())))
        .unwrap();
    assert_eq!(seen.id, order.id);

    let own = service
        .get_order(order.id, Some(&Caller::customer(owner)))
        .unwrap();
    assert_eq!(own.user_id, owner);
}

#[test]
fn missing_order_is_not_found() {
    let (_store, service) = setup();
    let err = service
        .get_order(Uuid::new_v4(), Some(&Caller::admin(Uuid::new_v4())))
        .unwrap_err();
    assert!(matches!(err, DomainError::OrderNotFound));
}

// ── listOrders ───────────────────────────────────────────────────────────────

#[test]
fn third_page_of_twenty_five_has_five_orders() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 100).unwrap();
    let user = Uuid::new_v4();
    for _ in 0..25 {
        service.create_order(user, request(&[(a, 1)])).unwrap();
    }

    let page = service
        .list_orders(
            OrderFilter {
                page: Some(3),
                limit: Some(10),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 25);
    assert_eq!(page.page, 3);
    assert_eq!(page.limit, 10);
    assert_eq!(page.total_pages, 3);
}

#[test]
fn customers_only_list_their_own_orders() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 100).unwrap();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for _ in 0..3 {
        service.create_order(alice, request(&[(a, 1)])).unwrap();
    }
    service.create_order(bob, request(&[(a, 1)])).unwrap();

    let mine = service
        .list_orders(OrderFilter::default(), Some(&Caller::customer(alice)))
        .unwrap();
    assert_eq!(mine.total, 3);
    assert!(mine.items.iter().all(|o| o.user_id == alice));

    let all = service
        .list_orders(OrderFilter::default(), Some(&Caller::admin(bob)))
        .unwrap();
    assert_eq!(all.total, 4);

    let history = service.order_history(bob, OrderFilter::default()).unwrap();
    assert_eq!(history.total, 1);
}

#[test]
fn list_filters_by_status_and_sorts_by_total() {
    let (store, service) = setup();
    let a = store.add_product("A", price("5.00"), 100).unwrap();
    let admin = Caller::admin(Uuid::new_v4());
    let user = Uuid::new_v4();

    let small = service.create_order(user, request(&[(a, 1)])).unwrap();
    let large = service.create_order(user, request(&[(a, 4)])).unwrap();
    let medium = service.create_order(user, request(&[(a, 2)])).unwrap();
    service
        .update_status(small.id, OrderStatus::Confirmed, &admin)
        .unwrap();

    let pending = service
        .list_orders(
            OrderFilter {
                status: Some(OrderStatus::Pending),
                sort_by: Some("totalAmount".to_string()),
                sort_order: Some(SortOrder::Asc),
                ..Default::default()
            },
            Some(&admin),
        )
        .unwrap();
    let ids: Vec<Uuid> = pending.items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![medium.id, large.id]);

    let by_default = service
        .list_orders(
            OrderFilter {
                sort_by: Some("not-a-column".to_string()),
                sort_order: Some(SortOrder::Asc),
                ..Default::default()
            },
            Some(&admin),
        )
        .unwrap();
    let created: Vec<_> = by_default.items.iter().map(|o| o.created_at).collect();
    let mut sorted = created.clone();
    sorted.sort();
    assert_eq!(created, sorted);
}

#[test]
fn zero_limit_returns_everything_on_one_page() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 100).unwrap();
    for _ in 0..12 {
        service
            .create_order(Uuid::new_v4(), request(&[(a, 1)]))
            .unwrap();
    }

    let page = service
        .list_orders(
            OrderFilter {
                limit: Some(0),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    assert_eq!(page.items.len(), 12);
    assert_eq!(page.total_pages, 1);
}

#[test]
fn extreme_page_and_limit_are_answered_without_breaking_the_store() {
    let (store, service) = setup();
    let a = store.add_product("A", price("1.00"), 100).unwrap();
    for _ in 0..2 {
        service
            .create_order(Uuid::new_v4(), request(&[(a, 1)]))
            .unwrap();
    }

    let err = service
        .list_orders(
            OrderFilter {
                page: Some(i64::MAX),
                limit: Some(10),
                ..Default::default()
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let page = service
        .list_orders(
            OrderFilter {
                limit: Some(i64::MAX),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages, 1);

    let far = service
        .list_orders(
            OrderFilter {
                page: Some(i64::MAX),
                limit: Some(1),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert!(far.items.is_empty());
    assert_eq!(far.total, 2);

    assert_eq!(service.order_stats().unwrap().total_orders, 2);
}

// ── Reporting ────────────────────────────────────────────────────────────────

#[test]
fn stats_count_every_status_and_exclude_pending_and_cancelled_revenue() {
    let (store, service) = setup();
    let a = store.add_product("A", price("10.00"), 100).unwrap();
    let admin = Caller::admin(Uuid::new_v4());
    let user = Uuid::new_v4();

    let _pending = service.create_order(user, request(&[(a, 1)])).unwrap();
    let confirmed = service.create_order(user, request(&[(a, 2)])).unwrap();
    let delivered = service.create_order(user, request(&[(a, 3)])).unwrap();
    let cancelled = service.create_order(user, request(&[(a, 4)])).unwrap();

    service
        .update_status(confirmed.id, OrderStatus::Confirmed, &admin)
        .unwrap();
    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        service.update_status(delivered.id, next, &admin).unwrap();
    }
    service.cancel_order(cancelled.id, &admin).unwrap();

    let stats = service.order_stats().unwrap();
    assert_eq!(stats.total_orders, 4);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.confirmed_orders, 1);
    assert_eq!(stats.shipped_orders, 0);
    assert_eq!(stats.delivered_orders, 1);
    assert_eq!(stats.cancelled_orders, 1);
    assert_eq!(stats.total_revenue, price("50.00"));

    let by_status = service.orders_by_status(OrderStatus::Cancelled).unwrap();
    assert_eq!(by_status.len(), 1);
    assert_eq!(by_status[0].id, cancelled.id);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[test]
fn concurrent_single_unit_orders_never_oversell() {
    let (store, service) = setup();
    let n = 16;
    let product = store.add_product("Limited", price("9.99"), n).unwrap();
    let service = Arc::new(service);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..=n)
            .map(|_| {
                let service = Arc::clone(&service);
                s.spawn(move || service.create_order(Uuid::new_v4(), request(&[(product, 1)])))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(DomainError::InsufficientStock { available: 0, .. })))
        .count();
    assert_eq!(succeeded, n as usize);
    assert_eq!(short, 1);
    assert_eq!(store.product_stock(product).unwrap(), Some(0));
}

#[test]
fn concurrent_cancels_restore_stock_exactly_once() {
    let (store, service) = setup();
    let product = store.add_product("Limited", price("1.00"), 3).unwrap();
    let user = Uuid::new_v4();
    let order = service
        .create_order(user, request(&[(product, 3)]))
        .unwrap();
    let service = Arc::new(service);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                s.spawn(move || service.cancel_order(order.id, &Caller::customer(user)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(DomainError::InvalidState(_))))
            .count(),
        7
    );
    assert_eq!(store.product_stock(product).unwrap(), Some(3));
}
