use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Address, AddressKind, Currency, CustomerId, Fields, ItemId, Money, Order, OrderId, OrderItem,
    OrderParts, OrderStatus, ProductId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderFilters, RepositoryError, Result, repository::OrderRepository};

const ORDER_COLUMNS: &str = "id, customer_id, email, status, total_amount_cents, currency, \
     metadata, version, created_at, updated_at";

/// A positional parameter for dynamically built queries.
enum SqlArg {
    Uuid(Uuid),
    Text(String),
    BigInt(i64),
    Timestamp(DateTime<Utc>),
}

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_header(row: &PgRow) -> Result<OrderParts> {
        let status: String = row.try_get("status")?;
        let currency: String = row.try_get("currency")?;
        let metadata: serde_json::Value = row.try_get("metadata")?;

        Ok(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            email: row.try_get("email")?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| RepositoryError::DataIntegrity(e.to_string()))?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            currency: Currency::new(currency)
                .map_err(|e| RepositoryError::DataIntegrity(e.to_string()))?,
            items: Vec::new(),
            shipping_address: None,
            billing_address: None,
            metadata: serde_json::from_value::<Fields>(metadata)?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<(OrderId, OrderItem)> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity).map_err(|_| {
            RepositoryError::DataIntegrity(format!("negative item quantity {quantity}"))
        })?;

        let item = OrderItem {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity,
            total: Money::from_cents(row.try_get("total_cents")?),
        };
        Ok((OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?), item))
    }

    fn row_to_address(row: &PgRow) -> Result<(OrderId, AddressKind, Address)> {
        let kind: String = row.try_get("kind")?;
        let kind = kind
            .parse::<AddressKind>()
            .map_err(|e| RepositoryError::DataIntegrity(e.to_string()))?;

        let address = Address {
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            country: row.try_get("country")?,
            postal_code: row.try_get("postal_code")?,
        };
        Ok((
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            kind,
            address,
        ))
    }

    /// Loads items and addresses for the given headers and assembles orders,
    /// preserving the order of `headers`.
    async fn assemble(&self, headers: Vec<OrderParts>) -> Result<Vec<Order>> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = headers.iter().map(|h| h.id.as_uuid()).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT order_id, id, product_id, name, price_cents, quantity, total_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let address_rows = sqlx::query(
            r#"
            SELECT order_id, kind, street, city, state, country, postal_code
            FROM order_addresses
            WHERE order_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let (order_id, item) = Self::row_to_item(row)?;
            items.entry(order_id).or_default().push(item);
        }

        let mut addresses: HashMap<OrderId, Vec<(AddressKind, Address)>> = HashMap::new();
        for row in &address_rows {
            let (order_id, kind, address) = Self::row_to_address(row)?;
            addresses.entry(order_id).or_default().push((kind, address));
        }

        headers
            .into_iter()
            .map(|mut parts| {
                parts.items = items.remove(&parts.id).unwrap_or_default();
                for (kind, address) in addresses.remove(&parts.id).unwrap_or_default() {
                    match kind {
                        AddressKind::Shipping => parts.shipping_address = Some(address),
                        AddressKind::Billing => parts.billing_address = Some(address),
                    }
                }
                Ok(Order::from_parts(parts)?)
            })
            .collect()
    }

    /// Appends the WHERE clause for `filters` to `sql`, returning the
    /// arguments in parameter order.
    fn push_filters(sql: &mut String, filters: &OrderFilters) -> Vec<SqlArg> {
        let mut args = Vec::new();
        let mut push = |sql: &mut String, clause: &str, arg: SqlArg| {
            args.push(arg);
            sql.push_str(&format!(" AND {clause} ${}", args.len()));
        };

        if let Some(customer_id) = filters.customer_id {
            push(sql, "customer_id =", SqlArg::Uuid(customer_id.as_uuid()));
        }
        if let Some(status) = filters.status {
            push(sql, "status =", SqlArg::Text(status.as_str().to_string()));
        }
        if let Some(ref email) = filters.email {
            push(sql, "email ILIKE", SqlArg::Text(format!("%{}%", escape_like(email))));
        }
        if let Some(ref currency) = filters.currency {
            push(sql, "currency =", SqlArg::Text(currency.as_str().to_string()));
        }
        if let Some(min) = filters.min_amount {
            push(sql, "total_amount_cents >=", SqlArg::BigInt(min.cents()));
        }
        if let Some(max) = filters.max_amount {
            push(sql, "total_amount_cents <=", SqlArg::BigInt(max.cents()));
        }
        if let Some(from) = filters.date_from {
            push(sql, "created_at >=", SqlArg::Timestamp(from));
        }
        if let Some(to) = filters.date_to {
            push(sql, "created_at <=", SqlArg::Timestamp(to));
        }
        args
    }

    fn bind_args<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        args: Vec<SqlArg>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        for arg in args {
            query = match arg {
                SqlArg::Uuid(v) => query.bind(v),
                SqlArg::Text(v) => query.bind(v),
                SqlArg::BigInt(v) => query.bind(v),
                SqlArg::Timestamp(v) => query.bind(v),
            };
        }
        query
    }

    async fn current_version(&self, id: OrderId) -> Result<Option<i64>> {
        let version = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }
}

/// Escapes LIKE wildcards so the filter is a plain substring match.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn create(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let metadata = serde_json::to_value(order.metadata())?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, email, status, total_amount_cents, currency, metadata, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.email())
        .bind(order.status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.currency().as_str())
        .bind(metadata)
        .bind(order.version())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Duplicate(order.id());
            }
            RepositoryError::Database(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataIntegrity(format!("quantity {} too large", item.quantity))
            })?;
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, id, position, product_id, name, price_cents, quantity, total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(item.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(&item.name)
            .bind(item.price.cents())
            .bind(quantity)
            .bind(item.total.cents())
            .execute(&mut *tx)
            .await?;
        }

        for kind in [AddressKind::Shipping, AddressKind::Billing] {
            let Some(address) = order.address(kind) else {
                continue;
            };
            sqlx::query(
                r#"
                INSERT INTO order_addresses (order_id, kind, street, city, state, country, postal_code)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(kind.as_str())
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.country)
            .bind(&address.postal_code)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound(id))?;

        let header = Self::row_to_header(&row)?;
        self.assemble(vec![header])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound(id))
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn update(&self, order: &Order) -> Result<i64> {
        let metadata = serde_json::to_value(order.metadata())?;

        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET customer_id = $2, email = $3, status = $4, total_amount_cents = $5,
                currency = $6, metadata = $7, updated_at = $8, version = version + 1
            WHERE id = $1 AND version = $9
            RETURNING version
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.email())
        .bind(order.status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.currency().as_str())
        .bind(metadata)
        .bind(order.updated_at())
        .bind(order.version())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = new_version {
            return Ok(version);
        }

        match self.current_version(order.id()).await? {
            None => Err(RepositoryError::NotFound(order.id())),
            Some(actual) => Err(RepositoryError::ConcurrencyConflict {
                order_id: order.id(),
                expected: order.version(),
                actual,
            }),
        }
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW(), version = version + 1 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = NOW(), version = version + 1
            WHERE id = $1 AND status NOT IN ('delivered', 'refunded', 'cancelled')
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn list(&self, filters: &OrderFilters) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let args = Self::push_filters(&mut sql, filters);

        // Sort column and direction come from closed enums, never from input.
        sql.push_str(&format!(
            " ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
            filters.sort_by.column(),
            filters.sort_order.sql(),
            filters.sort_order.sql(),
            filters.effective_limit(),
            filters.effective_offset(),
        ));

        let rows = Self::bind_args(sqlx::query(&sql), args)
            .fetch_all(&self.pool)
            .await?;

        let headers = rows
            .iter()
            .map(Self::row_to_header)
            .collect::<Result<Vec<_>>>()?;
        self.assemble(headers).await
    }

    async fn count(&self, filters: &OrderFilters) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM orders WHERE 1=1");
        let args = Self::push_filters(&mut sql, filters);

        let row = Self::bind_args(sqlx::query(&sql), args)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn exists(&self, id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("a_b%c"), "a\\_b\\%c");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn filters_number_parameters_in_order() {
        let filters = OrderFilters::new()
            .customer_id(CustomerId::new())
            .email("jane")
            .min_amount(Money::from_cents(100))
            .max_amount(Money::from_cents(900));

        let mut sql = String::from("SELECT COUNT(*) FROM orders WHERE 1=1");
        let args = PostgresOrderRepository::push_filters(&mut sql, &filters);

        assert_eq!(args.len(), 4);
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM orders WHERE 1=1 AND customer_id = $1 AND email ILIKE $2 \
             AND total_amount_cents >= $3 AND total_amount_cents <= $4"
        );
    }

    #[test]
    fn empty_filters_add_no_clauses() {
        let mut sql = String::from("SELECT 1 WHERE 1=1");
        let args = PostgresOrderRepository::push_filters(&mut sql, &OrderFilters::new());
        assert!(args.is_empty());
        assert_eq!(sql, "SELECT 1 WHERE 1=1");
    }
}
