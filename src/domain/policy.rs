//! Role-aware visibility and mutation rules.
//!
//! Every authorization decision in the lifecycle service goes through these
//! predicates; nothing else inspects a caller's role.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// The acting identity supplied by the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn customer(user_id: Uuid) -> Self {
        Caller {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Caller {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Owner restriction applied to listings. `None` caller means internal use.
pub fn listing_owner(caller: Option<&Caller>) -> Option<Uuid> {
    match caller {
        Some(c) if !c.is_admin() => Some(c.user_id),
        _ => None,
    }
}

pub fn can_view(order: &Order, caller: &Caller) -> bool {
    caller.is_admin() || order.user_id == caller.user_id
}

pub fn can_cancel(order: &Order, caller: &Caller) -> bool {
    caller.is_admin() || order.user_id == caller.user_id
}

pub fn can_mutate_status(caller: &Caller) -> bool {
    caller.is_admin()
}

pub fn ensure_can_view(order: &Order, caller: Option<&Caller>) -> Result<(), DomainError> {
    match caller {
        Some(c) if !can_view(order, c) => Err(DomainError::AccessDenied),
        _ => Ok(()),
    }
}

pub fn ensure_can_cancel(order: &Order, caller: &Caller) -> Result<(), DomainError> {
    if can_cancel(order, caller) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "You can only cancel your own orders".to_string(),
        ))
    }
}

pub fn ensure_can_mutate_status(caller: &Caller) -> Result<(), DomainError> {
    if can_mutate_status(caller) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "Only administrators can update order status".to_string(),
        ))
    }
}
