use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

pub const MAX_TEXT_LEN: usize = 500;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

// ── Status state machine ─────────────────────────────────────────────────────

/// Lifecycle status of an order.
///
/// ```text
/// PENDING ──► CONFIRMED ──► SHIPPED ──► DELIVERED
///    │            │
///    └────────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Statuses whose totals count as revenue.
    pub const REVENUE: [OrderStatus; 3] = [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    /// The statuses reachable from `self` in one step.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validates a transition, naming both ends on failure.
    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown order status '{}'", s)))
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

/// A product as seen through the catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub stock: i32,
}

// ── Orders ───────────────────────────────────────────────────────────────────

/// One requested line of a new order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: String,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    /// Checks the address and notes. Items are checked by the reservation.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.shipping_address.trim().is_empty() {
            return Err(DomainError::Validation(
                "shipping address is required".to_string(),
            ));
        }
        if self.shipping_address.chars().count() > MAX_TEXT_LEN {
            return Err(DomainError::Validation(format!(
                "shipping address must be at most {} characters",
                MAX_TEXT_LEN
            )));
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_TEXT_LEN {
                return Err(DomainError::Validation(format!(
                    "notes must be at most {} characters",
                    MAX_TEXT_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Weak reference to the product an item was bought from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    /// `None` when the product no longer exists in the catalog.
    pub product: Option<ProductRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// An order ready to be written, items included.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    TotalAmount,
    Status,
}

impl SortField {
    /// Unrecognised names fall back to `CreatedAt`.
    pub fn parse_or_default(name: Option<&str>) -> Self {
        match name {
            Some("totalAmount") => SortField::TotalAmount,
            Some("status") => SortField::Status,
            _ => SortField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[default]
    #[serde(rename = "DESC")]
    Desc,
}

/// Caller-supplied listing filter. Absent fields take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on `created_at`.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    /// `Some(0)` disables pagination.
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderFilter {
    /// Resolves defaults and restricts the result to `owner` when given.
    pub fn into_query(self, owner: Option<Uuid>) -> Result<OrderQuery, DomainError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page < 1 {
            return Err(DomainError::Validation("page must be at least 1".to_string()));
        }
        let limit = match self.limit.unwrap_or(DEFAULT_LIMIT) {
            0 => None,
            l if l < 0 => {
                return Err(DomainError::Validation("limit must not be negative".to_string()))
            }
            l => Some(l),
        };
        if let Some(limit) = limit {
            if (page - 1).checked_mul(limit).is_none() {
                return Err(DomainError::Validation(
                    "page is out of range for the given limit".to_string(),
                ));
            }
        }
        Ok(OrderQuery {
            owner,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            sort_by: SortField::parse_or_default(self.sort_by.as_deref()),
            sort_order: self.sort_order.unwrap_or_default(),
            page,
            limit,
        })
    }
}

/// A fully resolved listing query handed to the repository.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub owner: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: i64,
    /// `None` returns every matching row.
    pub limit: Option<i64>,
}

impl OrderQuery {
    pub fn offset(&self) -> i64 {
        self.limit
            .map_or(0, |limit| (self.page - 1).saturating_mul(limit))
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.owner.map_or(true, |owner| order.user_id == owner)
            && self.status.map_or(true, |status| order.status == status)
            && self.start_date.map_or(true, |start| order.created_at >= start)
            && self.end_date.map_or(true, |end| order.created_at <= end)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, query: &OrderQuery) -> Self {
        let (limit, total_pages) = match query.limit {
            Some(limit) => (limit, total / limit + i64::from(total % limit != 0)),
            None => (total, 1),
        };
        Page {
            items,
            total,
            page: query.page,
            limit,
            total_pages,
        }
    }
}

// ── Reporting ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub confirmed_orders: i64,
    pub shipped_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub total_revenue: BigDecimal,
}

impl OrderStats {
    pub fn record_count(&mut self, status: OrderStatus, count: i64) {
        self.total_orders += count;
        let slot = match status {
            OrderStatus::Pending => &mut self.pending_orders,
            OrderStatus::Confirmed => &mut self.confirmed_orders,
            OrderStatus::Shipped => &mut self.shipped_orders,
            OrderStatus::Delivered => &mut self.delivered_orders,
            OrderStatus::Cancelled => &mut self.cancelled_orders,
        };
        *slot += count;
    }
}
