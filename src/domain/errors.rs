use thiserror::Error;
use uuid::Uuid;

use super::order::OrderStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error(
        "Insufficient stock for product \"{product_name}\". Available: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Order not found")]
    OrderNotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order cannot be cancelled while {0}")]
    InvalidState(OrderStatus),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable machine-readable code for callers rendering their own messages.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::OrderNotFound => "ORDER_NOT_FOUND",
            DomainError::AccessDenied => "ACCESS_DENIED",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::InvalidState(_) => "INVALID_STATE",
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::Internal(_) => "INTERNAL",
        }
    }

    /// True for persistence/infrastructure failures, false for the
    /// caller-facing taxonomy.
    pub fn is_internal(&self) -> bool {
        matches!(self, DomainError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_product_and_quantities() {
        let err = DomainError::InsufficientStock {
            product_id: Uuid::new_v4(),
            product_name: "Desk Lamp".to_string(),
            available: 1,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product \"Desk Lamp\". Available: 1, Requested: 5"
        );
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn invalid_transition_names_both_statuses() {
        let err = DomainError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        };
        assert_eq!(err.to_string(), "Cannot transition from PENDING to SHIPPED");
    }

    #[test]
    fn only_internal_is_internal() {
        assert!(DomainError::Internal("db down".to_string()).is_internal());
        assert!(!DomainError::OrderNotFound.is_internal());
        assert!(!DomainError::AccessDenied.is_internal());
        assert!(!DomainError::Validation("empty".to_string()).is_internal());
    }

    #[test]
    fn access_denied_and_not_found_are_distinct() {
        assert_ne!(DomainError::AccessDenied.code(), DomainError::OrderNotFound.code());
    }
}
