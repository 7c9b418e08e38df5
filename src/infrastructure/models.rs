use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, Order, OrderItem, Product, ProductRef};
use crate::schema::{order_items, orders, products};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: &'a str,
    pub total_amount: BigDecimal,
    pub shipping_address: &'a str,
    pub notes: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub stock: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProductRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub price: BigDecimal,
    pub stock: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: row.price,
            stock: row.stock,
        }
    }
}

impl<'a> NewOrderRow<'a> {
    pub fn from_domain(order: &'a NewOrder) -> Self {
        NewOrderRow {
            id: order.id,
            user_id: order.user_id,
            status: order.status.as_str(),
            total_amount: order.total_amount.clone(),
            shipping_address: &order.shipping_address,
            notes: order.notes.as_deref(),
            created_at: order.created_at,
            updated_at: order.created_at,
        }
    }
}

/// Assembles a domain order from its rows. `names` maps product ids to the
/// names still present in the catalog.
pub fn hydrate(
    row: OrderRow,
    items: Vec<OrderItemRow>,
    names: &HashMap<Uuid, String>,
) -> Result<Order, DomainError> {
    let status = row.status.parse().map_err(|_| {
        DomainError::Internal(format!(
            "order {} has unknown status '{}'",
            row.id, row.status
        ))
    })?;

    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        status,
        total_amount: row.total_amount,
        shipping_address: row.shipping_address,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
        items: items
            .into_iter()
            .map(|item| OrderItem {
                product: names.get(&item.product_id).map(|name| ProductRef {
                    id: item.product_id,
                    name: name.clone(),
                }),
                id: item.id,
                order_id: item.order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    })
}
