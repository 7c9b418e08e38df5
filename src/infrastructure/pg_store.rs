use std::collections::HashMap;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::Utc;
use diesel::dsl::{count_star, sum};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    NewOrder, Order, OrderQuery, OrderStats, OrderStatus, Page, Product, SortField, SortOrder,
};
use crate::domain::ports::{Catalog, OrderRepository, Store, UnitOfWork};
use crate::schema::{order_items, orders, products};

use super::models::{
    hydrate, NewOrderItemRow, NewOrderRow, NewProductRow, OrderItemRow, OrderRow, ProductRow,
};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// PostgreSQL-backed store. Every `transaction` runs on one pooled connection
/// inside a database transaction; product and order rows are locked with
/// `FOR UPDATE` before they are changed.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Adds a catalog entry. Used for seeding and tests; the catalog itself is
    /// owned elsewhere.
    pub fn insert_product(
        &self,
        name: &str,
        price: BigDecimal,
        stock: i32,
    ) -> Result<Uuid, DomainError> {
        let mut conn = self.pool.get()?;
        let id = Uuid::new_v4();
        diesel::insert_into(products::table)
            .values(&NewProductRow {
                id,
                name,
                price,
                stock,
            })
            .execute(&mut conn)?;
        Ok(id)
    }

    pub fn product_stock(&self, id: Uuid) -> Result<Option<i32>, DomainError> {
        let mut conn = self.pool.get()?;
        let stock = products::table
            .find(id)
            .select(products::stock)
            .get_result(&mut conn)
            .optional()?;
        Ok(stock)
    }
}

impl Store for PgStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, DomainError>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        let result = conn.transaction::<_, DomainError, _>(|conn| {
            let mut uow = PgUnitOfWork { conn };
            f(&mut uow)
        });
        if let Err(e) = &result {
            if e.is_internal() {
                log::error!("Transaction rolled back: {}", e);
            } else {
                log::debug!("Transaction rolled back: {}", e);
            }
        }
        result
    }
}

struct PgUnitOfWork<'c> {
    conn: &'c mut PgConnection,
}

impl PgUnitOfWork<'_> {
    fn product_names(&mut self, mut ids: Vec<Uuid>) -> Result<HashMap<Uuid, String>, DomainError> {
        ids.sort();
        ids.dedup();
        let rows: Vec<(Uuid, String)> = products::table
            .filter(products::id.eq_any(ids))
            .select((products::id, products::name))
            .load(self.conn)?;
        Ok(rows.into_iter().collect())
    }

    fn hydrate_rows(&mut self, rows: Vec<OrderRow>) -> Result<Vec<Order>, DomainError> {
        let items = OrderItemRow::belonging_to(&rows)
            .select(OrderItemRow::as_select())
            .order((order_items::created_at.asc(), order_items::id.asc()))
            .load(self.conn)?;
        let names = self.product_names(items.iter().map(|i| i.product_id).collect())?;
        let grouped = items.grouped_by(&rows);

        rows.into_iter()
            .zip(grouped)
            .map(|(row, items)| hydrate(row, items, &names))
            .collect()
    }

    fn hydrate_one(&mut self, row: Option<OrderRow>) -> Result<Option<Order>, DomainError> {
        match row {
            Some(row) => Ok(self.hydrate_rows(vec![row])?.pop()),
            None => Ok(None),
        }
    }
}

fn filtered(query: &OrderQuery) -> orders::BoxedQuery<'static, Pg> {
    let mut q = orders::table.into_boxed();
    if let Some(owner) = query.owner {
        q = q.filter(orders::user_id.eq(owner));
    }
    if let Some(status) = query.status {
        q = q.filter(orders::status.eq(status.as_str()));
    }
    if let Some(start) = query.start_date {
        q = q.filter(orders::created_at.ge(start));
    }
    if let Some(end) = query.end_date {
        q = q.filter(orders::created_at.le(end));
    }
    q
}

impl Catalog for PgUnitOfWork<'_> {
    fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError> {
        let row = products::table
            .find(id)
            .select(ProductRow::as_select())
            .get_result(self.conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    fn lock_products(&mut self, ids: &[Uuid]) -> Result<(), DomainError> {
        products::table
            .filter(products::id.eq_any(ids.to_vec()))
            .order(products::id.asc())
            .select(products::id)
            .for_update()
            .load::<Uuid>(self.conn)?;
        Ok(())
    }

    fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(id))
                .filter(products::stock.ge(quantity)),
        )
        .set((
            products::stock.eq(products::stock - quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(self.conn)?;

        if updated == 1 {
            return Ok(());
        }
        match self.find_product(id)? {
            Some(product) => Err(DomainError::InsufficientStock {
                product_id: id,
                product_name: product.name,
                available: product.stock,
                requested: quantity,
            }),
            None => Err(DomainError::ProductNotFound(id)),
        }
    }

    fn increment_stock(&mut self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        let updated = diesel::update(products::table.find(id))
            .set((
                products::stock.eq(products::stock + quantity),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::ProductNotFound(id));
        }
        Ok(())
    }
}

impl OrderRepository for PgUnitOfWork<'_> {
    fn insert(&mut self, order: &NewOrder) -> Result<(), DomainError> {
        diesel::insert_into(orders::table)
            .values(&NewOrderRow::from_domain(order))
            .execute(self.conn)?;

        let items: Vec<NewOrderItemRow> = order
            .items
            .iter()
            .map(|item| NewOrderItemRow {
                id: item.id,
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.clone(),
                created_at: order.created_at,
            })
            .collect();
        diesel::insert_into(order_items::table)
            .values(&items)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let row = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .get_result(self.conn)
            .optional()?;
        self.hydrate_one(row)
    }

    fn lock_by_id(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let row = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .for_update()
            .get_result(self.conn)
            .optional()?;
        self.hydrate_one(row)
    }

    fn update_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), DomainError> {
        let updated = diesel::update(orders::table.find(id))
            .set((
                orders::status.eq(status.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::OrderNotFound);
        }
        Ok(())
    }

    fn find_with_filters(&mut self, query: &OrderQuery) -> Result<Page<Order>, DomainError> {
        let total: i64 = filtered(query).count().get_result(self.conn)?;

        let sorted = match (query.sort_by, query.sort_order) {
            (SortField::CreatedAt, SortOrder::Asc) => {
                filtered(query).order(orders::created_at.asc())
            }
            (SortField::CreatedAt, SortOrder::Desc) => {
                filtered(query).order(orders::created_at.desc())
            }
            (SortField::TotalAmount, SortOrder::Asc) => {
                filtered(query).order(orders::total_amount.asc())
            }
            (SortField::TotalAmount, SortOrder::Desc) => {
                filtered(query).order(orders::total_amount.desc())
            }
            (SortField::Status, SortOrder::Asc) => filtered(query).order(orders::status.asc()),
            (SortField::Status, SortOrder::Desc) => filtered(query).order(orders::status.desc()),
        };
        let mut rows_query = sorted.then_order_by(orders::id.asc());
        if let Some(limit) = query.limit {
            rows_query = rows_query.limit(limit).offset(query.offset());
        }
        let rows = rows_query.select(OrderRow::as_select()).load(self.conn)?;

        let orders = self.hydrate_rows(rows)?;
        Ok(Page::new(orders, total, query))
    }

    fn find_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        let rows = orders::table
            .filter(orders::status.eq(status.as_str()))
            .order((orders::created_at.desc(), orders::id.asc()))
            .select(OrderRow::as_select())
            .load(self.conn)?;
        self.hydrate_rows(rows)
    }

    fn stats(&mut self) -> Result<OrderStats, DomainError> {
        let counts: Vec<(String, i64)> = orders::table
            .group_by(orders::status)
            .select((orders::status, count_star()))
            .load(self.conn)?;

        let mut stats = OrderStats::default();
        for (status, count) in counts {
            let status: OrderStatus = status
                .parse()
                .map_err(|e: DomainError| DomainError::Internal(e.to_string()))?;
            stats.record_count(status, count);
        }

        let revenue_statuses: Vec<&str> = OrderStatus::REVENUE.iter().map(|s| s.as_str()).collect();
        let revenue: Option<BigDecimal> = orders::table
            .filter(orders::status.eq_any(revenue_statuses))
            .select(sum(orders::total_amount))
            .get_result(self.conn)?;
        stats.total_revenue = revenue
            .unwrap_or_else(|| BigDecimal::from(0))
            .with_scale_round(2, RoundingMode::HalfUp);

        Ok(stats)
    }
}
