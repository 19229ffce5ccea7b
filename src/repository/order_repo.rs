use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::models::order::{Order, OrderStatus, OrderView, WalkInOrder};
use crate::models::Amount;

const ORDER_COLUMNS: &str =
    "id, product_id, customer_id, quantity, status, notes, total_amount, created_at";

const ORDER_VIEW_SELECT: &str = r#"
    SELECT o.id, o.product_id AS product, pr.name AS product_name,
           o.customer_id AS customer, u.username AS customer_name,
           cp.first_name AS customer_first_name, cp.last_name AS customer_last_name,
           o.quantity, o.status, o.notes, o.total_amount, o.created_at,
           d.status AS delivery_status
    FROM orders o
    LEFT JOIN products pr ON pr.id = o.product_id
    LEFT JOIN profiles cp ON cp.id = o.customer_id
    LEFT JOIN users u ON u.id = cp.user_id
    LEFT JOIN deliveries d ON d.order_id = o.id
"#;

/// Columns written on order creation.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub product_id: i64,
    pub customer_id: Option<i64>,
    pub quantity: i64,
    pub notes: String,
    pub total_amount: Amount,
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_view(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<OrderView>> {
    sqlx::query_as::<_, OrderView>(&format!("{} WHERE o.id = ?", ORDER_VIEW_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Orders newest first; `customer` narrows to one customer's orders.
pub async fn list_views(
    conn: &mut SqliteConnection,
    customer: Option<i64>,
) -> sqlx::Result<Vec<OrderView>> {
    sqlx::query_as::<_, OrderView>(&format!(
        "{} WHERE (?1 IS NULL OR o.customer_id = ?1) ORDER BY o.created_at DESC, o.id DESC",
        ORDER_VIEW_SELECT
    ))
    .bind(customer)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert(conn: &mut SqliteConnection, record: &OrderRecord) -> sqlx::Result<i64> {
    Ok(sqlx::query(
        "INSERT INTO orders (product_id, customer_id, quantity, status, notes, total_amount, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.product_id)
    .bind(record.customer_id)
    .bind(record.quantity)
    .bind(OrderStatus::Processing)
    .bind(&record.notes)
    .bind(record.total_amount)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid())
}

pub async fn update(conn: &mut SqliteConnection, order: &Order) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE orders SET product_id = ?, quantity = ?, notes = ?, total_amount = ?, status = ?
         WHERE id = ?",
    )
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(&order.notes)
    .bind(order.total_amount)
    .bind(order.status)
    .bind(order.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: OrderStatus,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Non-cancelled order totals for one calendar day (UTC).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailySalesRow {
    pub day: NaiveDate,
    pub total: f64,
    pub orders: i64,
}

/// The most recent `limit` days that had orders, newest first.
pub async fn daily_sales(
    conn: &mut SqliteConnection,
    limit: i64,
) -> sqlx::Result<Vec<DailySalesRow>> {
    sqlx::query_as::<_, DailySalesRow>(
        "SELECT date(created_at) AS day,
                SUM(CAST(total_amount AS REAL)) AS total,
                COUNT(*) AS orders
         FROM orders
         WHERE status != 'cancelled'
         GROUP BY date(created_at)
         ORDER BY day DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpenderRow {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub spend: Amount,
}

/// Customers ranked by non-cancelled order totals.
pub async fn top_spenders(
    conn: &mut SqliteConnection,
    limit: i64,
) -> sqlx::Result<Vec<SpenderRow>> {
    sqlx::query_as::<_, SpenderRow>(
        "SELECT u.username, cp.first_name, cp.last_name,
                printf('%.2f', SUM(CAST(o.total_amount AS REAL))) AS spend
         FROM orders o
         JOIN profiles cp ON cp.id = o.customer_id
         LEFT JOIN users u ON u.id = cp.user_id
         WHERE o.status != 'cancelled'
         GROUP BY o.customer_id
         ORDER BY SUM(CAST(o.total_amount AS REAL)) DESC, o.customer_id
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

/// A non-cancelled order's amount and when it was placed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    pub created_at: DateTime<Utc>,
    pub total_amount: Amount,
}

/// Non-cancelled orders placed on or after `since`.
pub async fn sales_since(
    conn: &mut SqliteConnection,
    since: NaiveDate,
) -> sqlx::Result<Vec<SaleRow>> {
    sqlx::query_as::<_, SaleRow>(
        "SELECT created_at, total_amount FROM orders
         WHERE status != 'cancelled' AND date(created_at) >= ?
         ORDER BY created_at",
    )
    .bind(since)
    .fetch_all(&mut *conn)
    .await
}

const WALK_IN_SELECT: &str = "SELECT w.id, w.product_id AS product, p.name AS product_name, \
     w.quantity, w.created_at \
     FROM walk_in_orders w JOIN products p ON p.id = w.product_id";

pub async fn walk_ins(conn: &mut SqliteConnection) -> sqlx::Result<Vec<WalkInOrder>> {
    sqlx::query_as::<_, WalkInOrder>(&format!(
        "{} ORDER BY w.created_at DESC, w.id DESC",
        WALK_IN_SELECT
    ))
    .fetch_all(&mut *conn)
    .await
}

pub async fn find_walk_in(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<WalkInOrder>> {
    sqlx::query_as::<_, WalkInOrder>(&format!("{} WHERE w.id = ?", WALK_IN_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_walk_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
) -> sqlx::Result<i64> {
    Ok(
        sqlx::query("INSERT INTO walk_in_orders (product_id, quantity, created_at) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
    )
}

pub async fn delete_walk_in(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM walk_in_orders WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
