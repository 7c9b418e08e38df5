use uuid::Uuid;

use super::errors::DomainError;
use super::order::{NewOrder, Order, OrderQuery, OrderStats, OrderStatus, Page, Product};

/// Product lookup and atomic stock adjustment, scoped to one transaction.
pub trait Catalog {
    fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError>;

    /// Row-locks the given products until the transaction ends.
    fn lock_products(&mut self, ids: &[Uuid]) -> Result<(), DomainError>;

    /// Atomically removes `quantity` units, failing with `InsufficientStock`
    /// instead of going below zero.
    fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError>;

    fn increment_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError>;
}

/// Order persistence, scoped to one transaction.
pub trait OrderRepository {
    fn insert(&mut self, order: &NewOrder) -> Result<(), DomainError>;

    /// Loads the order with its items and product references.
    fn find_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError>;

    /// Like `find_by_id`, but holds a row lock on the order.
    fn lock_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError>;

    fn update_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), DomainError>;

    fn find_with_filters(&mut self, query: &OrderQuery) -> Result<Page<Order>, DomainError>;

    fn find_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>, DomainError>;

    fn stats(&mut self) -> Result<OrderStats, DomainError>;
}

/// Everything an operation may touch inside one atomic unit.
pub trait UnitOfWork: Catalog + OrderRepository {}

impl<T: Catalog + OrderRepository + ?Sized> UnitOfWork for T {}

pub trait Store: Send + Sync + 'static {
    /// Runs `f` atomically: `Ok` commits, `Err` rolls back every write.
    fn transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, DomainError>;
}
