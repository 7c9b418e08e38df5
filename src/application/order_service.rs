use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    CreateOrderRequest, NewOrder, NewOrderItem, Order, OrderFilter, OrderStats, OrderStatus, Page,
};
use crate::domain::policy::{self, Caller};
use crate::domain::ports::{Store, UnitOfWork};

use super::reservation::reserve;

/// Order lifecycle: creation, visibility-scoped reads, status transitions and
/// cancellation with stock restoration. Each operation is one transaction.
pub struct OrderService<S> {
    store: S,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reserves stock, prices the cart and persists the order with its items,
    /// all or nothing.
    pub fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<Order, DomainError> {
        request.validate()?;

        let order = self.store.transaction(|uow| {
            let reservation = reserve(uow, &request.items)?;

            let new_order = NewOrder {
                id: Uuid::new_v4(),
                user_id,
                status: OrderStatus::Pending,
                total_amount: reservation.total_amount,
                shipping_address: request.shipping_address.clone(),
                notes: request.notes.clone(),
                created_at: Utc::now(),
                items: reservation
                    .lines
                    .into_iter()
                    .map(|line| NewOrderItem {
                        id: Uuid::new_v4(),
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                    })
                    .collect(),
            };
            uow.insert(&new_order)?;

            reload(uow, new_order.id)
        })?;

        log::info!(
            "Order {} created for user {} ({} items, total {})",
            order.id,
            user_id,
            order.items.len(),
            order.total_amount
        );
        Ok(order)
    }

    /// Customers only ever see their own orders; admins and internal callers
    /// see everything.
    pub fn list_orders(
        &self,
        filter: OrderFilter,
        caller: Option<&Caller>,
    ) -> Result<Page<Order>, DomainError> {
        let query = filter.into_query(policy::listing_owner(caller))?;
        self.store.transaction(|uow| uow.find_with_filters(&query))
    }

    /// A customer's own order history.
    pub fn order_history(
        &self,
        user_id: Uuid,
        filter: OrderFilter,
    ) -> Result<Page<Order>, DomainError> {
        self.list_orders(filter, Some(&Caller::customer(user_id)))
    }

    pub fn get_order(&self, id: Uuid, caller: Option<&Caller>) -> Result<Order, DomainError> {
        let order = self
            .store
            .transaction(|uow| uow.find_by_id(id))?
            .ok_or(DomainError::OrderNotFound)?;
        policy::ensure_can_view(&order, caller)?;
        Ok(order)
    }

    pub fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        self.store.transaction(|uow| uow.find_by_status(status))
    }

    /// Admin-only move along the status table. No other field changes.
    pub fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        caller: &Caller,
    ) -> Result<Order, DomainError> {
        policy::ensure_can_mutate_status(caller)?;

        let (previous, order) = self.store.transaction(|uow| {
            let current = uow.lock_by_id(id)?.ok_or(DomainError::OrderNotFound)?;
            let next = current.status.transition_to(status)?;
            uow.update_status(id, next)?;
            Ok((current.status, reload(uow, id)?))
        })?;

        log::info!(
            "Order {} moved from {} to {} by {}",
            id,
            previous,
            order.status,
            caller.user_id
        );
        Ok(order)
    }

    /// Restores every item's stock and marks the order cancelled in one
    /// transaction. A second cancel fails with `InvalidState`.
    pub fn cancel_order(&self, id: Uuid, caller: &Caller) -> Result<Order, DomainError> {
        let order = self.store.transaction(|uow| {
            let order = uow.lock_by_id(id)?.ok_or(DomainError::OrderNotFound)?;
            policy::ensure_can_view(&order, Some(caller))?;
            policy::ensure_can_cancel(&order, caller)?;
            if !order.status.is_cancellable() {
                return Err(DomainError::InvalidState(order.status));
            }

            for item in &order.items {
                uow.increment_stock(item.product_id, item.quantity)?;
            }
            uow.update_status(id, OrderStatus::Cancelled)?;

            reload(uow, id)
        })?;

        log::info!(
            "Order {} cancelled by {}; restored stock for {} items",
            id,
            caller.user_id,
            order.items.len()
        );
        Ok(order)
    }

    /// Per-status counts and revenue over confirmed, shipped and delivered
    /// orders.
    pub fn order_stats(&self) -> Result<OrderStats, DomainError> {
        self.store.transaction(|uow| uow.stats())
    }
}

fn reload(uow: &mut dyn UnitOfWork, id: Uuid) -> Result<Order, DomainError> {
    uow.find_by_id(id)?
        .ok_or_else(|| DomainError::Internal(format!("order {} missing after write", id)))
}
