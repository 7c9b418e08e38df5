//! Pricing & stock reservation.

use bigdecimal::{BigDecimal, RoundingMode};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::OrderItemRequest;
use crate::domain::ports::Catalog;

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub total_amount: BigDecimal,
    pub lines: Vec<ReservationLine>,
}

pub fn validate_items(items: &[OrderItemRequest]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    if let Some(item) = items.iter().find(|i| i.quantity < 1) {
        return Err(DomainError::Validation(format!(
            "quantity for product {} must be at least 1, got {}",
            item.product_id, item.quantity
        )));
    }
    Ok(())
}

/// Validates availability item by item, in input order, decrementing stock as
/// soon as an item passes. Earlier decrements are NOT undone here when a later
/// item fails; the caller must run this inside the transaction that persists
/// the order so a failure rolls everything back.
pub fn reserve<C>(catalog: &mut C, items: &[OrderItemRequest]) -> Result<Reservation, DomainError>
where
    C: Catalog + ?Sized,
{
    validate_items(items)?;

    let mut ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    ids.sort();
    ids.dedup();
    catalog.lock_products(&ids)?;

    let mut total = BigDecimal::from(0);
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = catalog
            .find_product(item.product_id)?
            .ok_or(DomainError::ProductNotFound(item.product_id))?;

        if product.stock < item.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                available: product.stock,
                requested: item.quantity,
            });
        }

        total += &product.price * BigDecimal::from(item.quantity);
        catalog.decrement_stock(product.id, item.quantity)?;
        lines.push(ReservationLine {
            product_id: product.id,
            quantity: item.quantity,
            unit_price: product.price,
        });
    }

    Ok(Reservation {
        total_amount: total.with_scale_round(2, RoundingMode::HalfUp),
        lines,
    })
}
