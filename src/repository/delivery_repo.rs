use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::delivery::{Delivery, DeliveryStatus, DeliveryView};

const DELIVERY_COLUMNS: &str = "id, order_id, driver_id, vehicle_id, route_id, status, \
     delivered_quantity, returned_containers, created_at, updated_at, delivered_at";

const DELIVERY_VIEW_SELECT: &str = r#"
    SELECT d.id, d.order_id AS "order", d.order_id,
           pr.name AS order_product_name, o.quantity AS order_quantity, o.status AS order_status,
           d.driver_id AS driver, du.username AS driver_username,
           d.vehicle_id AS vehicle, v.name AS vehicle_name,
           d.route_id AS route, r.route_number,
           d.status, d.delivered_quantity, d.returned_containers,
           cp.first_name AS customer_first_name, cp.last_name AS customer_last_name,
           a.full_address || ', ' || b.name || ', ' || m.name AS customer_address,
           cp.phone AS customer_phone,
           d.created_at, d.updated_at, d.delivered_at
    FROM deliveries d
    JOIN orders o ON o.id = d.order_id
    LEFT JOIN products pr ON pr.id = o.product_id
    LEFT JOIN profiles dp ON dp.id = d.driver_id
    LEFT JOIN users du ON du.id = dp.user_id
    LEFT JOIN vehicles v ON v.id = d.vehicle_id
    LEFT JOIN routes r ON r.id = d.route_id
    LEFT JOIN profiles cp ON cp.id = o.customer_id
    LEFT JOIN addresses a ON a.id = cp.address_id
    LEFT JOIN barangays b ON b.id = a.barangay_id
    LEFT JOIN municipalities m ON m.id = b.municipality_id
"#;

/// Narrowing applied to delivery listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryScope {
    pub driver: Option<i64>,
    pub customer: Option<i64>,
    pub open_only: bool,
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Delivery>> {
    sqlx::query_as::<_, Delivery>(&format!(
        "SELECT {} FROM deliveries WHERE id = ?",
        DELIVERY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_by_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> sqlx::Result<Option<Delivery>> {
    sqlx::query_as::<_, Delivery>(&format!(
        "SELECT {} FROM deliveries WHERE order_id = ?",
        DELIVERY_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_view(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<DeliveryView>> {
    sqlx::query_as::<_, DeliveryView>(&format!("{} WHERE d.id = ?", DELIVERY_VIEW_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Deliveries newest first within the given scope.
pub async fn list_views(
    conn: &mut SqliteConnection,
    scope: DeliveryScope,
) -> sqlx::Result<Vec<DeliveryView>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR d.driver_id = ?1)
              AND (?2 IS NULL OR o.customer_id = ?2)
              AND (?3 = 0 OR d.status NOT IN ('delivered', 'cancelled'))
            ORDER BY d.created_at DESC, d.id DESC",
        DELIVERY_VIEW_SELECT
    );
    let rows = sqlx::query_as::<_, DeliveryView>(&sql)
        .bind(scope.driver)
        .bind(scope.customer)
        .bind(scope.open_only)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

pub async fn insert(
    conn: &mut SqliteConnection,
    order_id: i64,
    driver_id: Option<i64>,
    vehicle_id: Option<i64>,
    route_id: Option<i64>,
    status: DeliveryStatus,
) -> sqlx::Result<i64> {
    let now = Utc::now();
    Ok(sqlx::query(
        "INSERT INTO deliveries (order_id, driver_id, vehicle_id, route_id, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(driver_id)
    .bind(vehicle_id)
    .bind(route_id)
    .bind(status)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid())
}

/// Writes back every mutable column and bumps `updated_at`.
pub async fn update(conn: &mut SqliteConnection, delivery: &Delivery) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE deliveries
         SET driver_id = ?, vehicle_id = ?, route_id = ?, status = ?, delivered_quantity = ?,
             returned_containers = ?, delivered_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(delivery.driver_id)
    .bind(delivery.vehicle_id)
    .bind(delivery.route_id)
    .bind(delivery.status)
    .bind(delivery.delivered_quantity)
    .bind(delivery.returned_containers)
    .bind(delivery.delivered_at)
    .bind(Utc::now())
    .bind(delivery.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM deliveries WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_for_order(conn: &mut SqliteConnection, order_id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM deliveries WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delivered and returned containers for one product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BacklogRow {
    pub name: String,
    pub delivered: i64,
    pub returned: i64,
}

/// Products with containers still out, by name.
pub async fn container_backlog(conn: &mut SqliteConnection) -> sqlx::Result<Vec<BacklogRow>> {
    sqlx::query_as::<_, BacklogRow>(
        "SELECT pr.name AS name,
                SUM(COALESCE(d.delivered_quantity, o.quantity)) AS delivered,
                SUM(d.returned_containers) AS returned
         FROM deliveries d
         JOIN orders o ON o.id = d.order_id
         JOIN products pr ON pr.id = o.product_id
         WHERE d.status = 'delivered'
         GROUP BY pr.id
         HAVING delivered > returned
         ORDER BY pr.name",
    )
    .fetch_all(&mut *conn)
    .await
}

/// Delivered quantities per order, for container math.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveredRow {
    pub customer_id: Option<i64>,
    pub product_id: Option<i64>,
    pub delivered_quantity: i64,
    pub returned_containers: i64,
}

pub async fn delivered_rows(conn: &mut SqliteConnection) -> sqlx::Result<Vec<DeliveredRow>> {
    sqlx::query_as::<_, DeliveredRow>(
        "SELECT o.customer_id, o.product_id,
                COALESCE(d.delivered_quantity, o.quantity) AS delivered_quantity,
                d.returned_containers
         FROM deliveries d
         JOIN orders o ON o.id = d.order_id
         WHERE d.status = 'delivered'
         ORDER BY d.id",
    )
    .fetch_all(&mut *conn)
    .await
}
