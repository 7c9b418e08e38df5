//! In-memory store for tests and local tooling.
//!
//! One mutex guards the whole state. A transaction works on a copy taken under
//! the lock and the copy replaces the state only when the closure returns
//! `Ok`, so transactions are serializable and a failure leaves nothing behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    NewOrder, Order, OrderItem, OrderQuery, OrderStats, OrderStatus, Page, Product, ProductRef,
    SortField, SortOrder,
};
use crate::domain::ports::{Catalog, OrderRepository, Store, UnitOfWork};

#[derive(Debug, Clone)]
struct StoredOrder {
    id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    total_amount: BigDecimal,
    shipping_address: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: BigDecimal,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, StoredOrder>,
    items: Vec<StoredItem>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("in-memory store poisoned".to_string()))
    }

    /// Adds a catalog entry and returns its id.
    pub fn add_product(
        &self,
        name: &str,
        price: BigDecimal,
        stock: i32,
    ) -> Result<Uuid, DomainError> {
        let id = Uuid::new_v4();
        self.lock()?.products.insert(
            id,
            Product {
                id,
                name: name.to_string(),
                price,
                stock,
            },
        );
        Ok(id)
    }

    /// Drops a product from the catalog; existing order items keep their id.
    pub fn remove_product(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self.lock()?.products.remove(&id))
    }

    pub fn product_stock(&self, id: Uuid) -> Result<Option<i32>, DomainError> {
        Ok(self.lock()?.products.get(&id).map(|p| p.stock))
    }

    pub fn order_count(&self) -> Result<usize, DomainError> {
        Ok(self.lock()?.orders.len())
    }
}

impl Store for InMemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, DomainError>,
    {
        let mut guard = self.lock()?;
        let mut working = (*guard).clone();

        let result = f(&mut MemoryUnitOfWork {
            state: &mut working,
        });
        match &result {
            Ok(_) => *guard = working,
            Err(e) => log::debug!("Transaction rolled back: {}", e),
        }
        result
    }
}

struct MemoryUnitOfWork<'s> {
    state: &'s mut MemoryState,
}

impl MemoryUnitOfWork<'_> {
    fn hydrate(&self, order: &StoredOrder) -> Order {
        Order {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount.clone(),
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: self
                .state
                .items
                .iter()
                .filter(|item| item.order_id == order.id)
                .map(|item| OrderItem {
                    id: item.id,
                    order_id: item.order_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.clone(),
                    product: self.state.products.get(&item.product_id).map(|p| ProductRef {
                        id: p.id,
                        name: p.name.clone(),
                    }),
                })
                .collect(),
        }
    }

    fn product_mut(&mut self, id: Uuid) -> Result<&mut Product, DomainError> {
        self.state
            .products
            .get_mut(&id)
            .ok_or(DomainError::ProductNotFound(id))
    }
}

impl Catalog for MemoryUnitOfWork<'_> {
    fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self.state.products.get(&id).cloned())
    }

    fn lock_products(&mut self, _ids: &[Uuid]) -> Result<(), DomainError> {
        // The store mutex already serializes transactions.
        Ok(())
    }

    fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        let product = self.product_mut(id)?;
        if product.stock < quantity {
            return Err(DomainError::InsufficientStock {
                product_id: id,
                product_name: product.name.clone(),
                available: product.stock,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(())
    }

    fn increment_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        self.product_mut(id)?.stock += quantity;
        Ok(())
    }
}

impl OrderRepository for MemoryUnitOfWork<'_> {
    fn insert(&mut self, order: &NewOrder) -> Result<(), DomainError> {
        if self.state.orders.contains_key(&order.id) {
            return Err(DomainError::Internal(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        self.state.orders.insert(
            order.id,
            StoredOrder {
                id: order.id,
                user_id: order.user_id,
                status: order.status,
                total_amount: order.total_amount.clone(),
                shipping_address: order.shipping_address.clone(),
                notes: order.notes.clone(),
                created_at: order.created_at,
                updated_at: order.created_at,
            },
        );
        self.state
            .items
            .extend(order.items.iter().map(|item| StoredItem {
                id: item.id,
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.clone(),
            }));
        Ok(())
    }

    fn find_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.state.orders.get(&id).map(|o| self.hydrate(o)))
    }

    fn lock_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.find_by_id(id)
    }

    fn update_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), DomainError> {
        let order = self
            .state
            .orders
            .get_mut(&id)
            .ok_or(DomainError::OrderNotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    fn find_with_filters(&mut self, query: &OrderQuery) -> Result<Page<Order>, DomainError> {
        let mut matching: Vec<Order> = self
            .state
            .orders
            .values()
            .map(|o| self.hydrate(o))
            .filter(|o| query.matches(o))
            .collect();

        matching.sort_by(|a, b| {
            let by_key = match query.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::TotalAmount => a.total_amount.cmp(&b.total_amount),
                SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            };
            let by_key = match query.sort_order {
                SortOrder::Asc => by_key,
                SortOrder::Desc => by_key.reverse(),
            };
            by_key.then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let items = match query.limit {
            Some(limit) => matching
                .into_iter()
                .skip(query.offset() as usize)
                .take(limit as usize)
                .collect(),
            None => matching,
        };
        Ok(Page::new(items, total, query))
    }

    fn find_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        let mut orders: Vec<Order> = self
            .state
            .orders
            .values()
            .filter(|o| o.status == status)
            .map(|o| self.hydrate(o))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(orders)
    }

    fn stats(&mut self) -> Result<OrderStats, DomainError> {
        let mut stats = OrderStats::default();
        let mut revenue = BigDecimal::from(0);
        for order in self.state.orders.values() {
            stats.record_count(order.status, 1);
            if OrderStatus::REVENUE.contains(&order.status) {
                revenue += &order.total_amount;
            }
        }
        stats.total_revenue = revenue.with_scale_round(2, RoundingMode::HalfUp);
        Ok(stats)
    }
}
