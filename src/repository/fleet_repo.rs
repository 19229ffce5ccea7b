use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::fleet::{Deployment, DeploymentStatus, DeploymentView, Route, Vehicle};

const DEPLOYMENT_COLUMNS: &str = "id, driver_id, vehicle_id, route_id, product_id, stock, \
     initial_stock, returned_containers, status, created_at, returned_at";

const DEPLOYMENT_VIEW_SELECT: &str = r#"
    SELECT dp.id, dp.driver_id AS driver, dp.vehicle_id AS vehicle, dp.route_id AS route,
           dp.product_id AS product, dp.stock, dp.initial_stock, dp.returned_containers,
           dp.status, dp.created_at, dp.returned_at,
           pf.first_name AS driver_first_name, pf.last_name AS driver_last_name,
           v.name AS vehicle_name, v.plate_number AS vehicle_plate_number,
           r.route_number, pr.name AS product_name,
           COALESCE((SELECT group_concat(m.name, ', ')
                     FROM route_municipalities rm
                     JOIN municipalities m ON m.id = rm.municipality_id
                     WHERE rm.route_id = dp.route_id), '') AS municipality_names
    FROM deployments dp
    JOIN profiles pf ON pf.id = dp.driver_id
    JOIN vehicles v ON v.id = dp.vehicle_id
    JOIN routes r ON r.id = dp.route_id
    JOIN products pr ON pr.id = dp.product_id
"#;

pub async fn vehicles(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Vehicle>> {
    sqlx::query_as::<_, Vehicle>("SELECT id, name, plate_number, stock_limit FROM vehicles ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_vehicle(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Vehicle>> {
    sqlx::query_as::<_, Vehicle>(
        "SELECT id, name, plate_number, stock_limit FROM vehicles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_vehicle(conn: &mut SqliteConnection, vehicle: &Vehicle) -> sqlx::Result<i64> {
    Ok(
        sqlx::query("INSERT INTO vehicles (name, plate_number, stock_limit) VALUES (?, ?, ?)")
            .bind(&vehicle.name)
            .bind(&vehicle.plate_number)
            .bind(vehicle.stock_limit)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
    )
}

pub async fn update_vehicle(conn: &mut SqliteConnection, vehicle: &Vehicle) -> sqlx::Result<()> {
    sqlx::query("UPDATE vehicles SET name = ?, plate_number = ?, stock_limit = ? WHERE id = ?")
        .bind(&vehicle.name)
        .bind(&vehicle.plate_number)
        .bind(vehicle.stock_limit)
        .bind(vehicle.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_vehicle(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn routes(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Route>> {
    sqlx::query_as::<_, Route>("SELECT id, route_number FROM routes ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_route(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Route>> {
    sqlx::query_as::<_, Route>("SELECT id, route_number FROM routes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_route(conn: &mut SqliteConnection, route_number: &str) -> sqlx::Result<i64> {
    Ok(sqlx::query("INSERT INTO routes (route_number) VALUES (?)")
        .bind(route_number)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid())
}

pub async fn rename_route(
    conn: &mut SqliteConnection,
    id: i64,
    route_number: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE routes SET route_number = ? WHERE id = ?")
        .bind(route_number)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Replaces the municipality membership of a route.
pub async fn set_route_municipalities(
    conn: &mut SqliteConnection,
    route_id: i64,
    municipalities: &[i64],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM route_municipalities WHERE route_id = ?")
        .bind(route_id)
        .execute(&mut *conn)
        .await?;
    for municipality in municipalities {
        sqlx::query(
            "INSERT OR IGNORE INTO route_municipalities (route_id, municipality_id) VALUES (?, ?)",
        )
        .bind(route_id)
        .bind(municipality)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Replaces the barangay membership of a route.
pub async fn set_route_barangays(
    conn: &mut SqliteConnection,
    route_id: i64,
    barangays: &[i64],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM route_barangays WHERE route_id = ?")
        .bind(route_id)
        .execute(&mut *conn)
        .await?;
    for barangay in barangays {
        sqlx::query("INSERT OR IGNORE INTO route_barangays (route_id, barangay_id) VALUES (?, ?)")
            .bind(route_id)
            .bind(barangay)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn delete_route(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM routes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_deployment(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<Deployment>> {
    sqlx::query_as::<_, Deployment>(&format!(
        "SELECT {} FROM deployments WHERE id = ?",
        DEPLOYMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_deployment_view(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<DeploymentView>> {
    sqlx::query_as::<_, DeploymentView>(&format!("{} WHERE dp.id = ?", DEPLOYMENT_VIEW_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Deployments newest first; `driver` and `statuses` narrow the listing.
pub async fn deployment_views(
    conn: &mut SqliteConnection,
    driver: Option<i64>,
    statuses: &[DeploymentStatus],
) -> sqlx::Result<Vec<DeploymentView>> {
    let statuses = if statuses.is_empty() {
        None
    } else {
        Some(serde_json::json!(statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>()).to_string())
    };
    sqlx::query_as::<_, DeploymentView>(&format!(
        "{} WHERE (?1 IS NULL OR dp.driver_id = ?1)
              AND (?2 IS NULL OR dp.status IN (SELECT value FROM json_each(?2)))
            ORDER BY dp.created_at DESC, dp.id DESC",
        DEPLOYMENT_VIEW_SELECT
    ))
    .bind(driver)
    .bind(statuses)
    .fetch_all(&mut *conn)
    .await
}

/// Active deployments on routes that cover the given barangay.
pub async fn deployments_covering_barangay(
    conn: &mut SqliteConnection,
    barangay: i64,
) -> sqlx::Result<Vec<DeploymentView>> {
    sqlx::query_as::<_, DeploymentView>(&format!(
        "{} WHERE dp.status = 'active'
              AND dp.route_id IN (SELECT route_id FROM route_barangays WHERE barangay_id = ?)
            ORDER BY dp.created_at DESC, dp.id DESC",
        DEPLOYMENT_VIEW_SELECT
    ))
    .bind(barangay)
    .fetch_all(&mut *conn)
    .await
}

/// The driver's most recent deployment, optionally limited to active ones for a product.
pub async fn latest_deployment(
    conn: &mut SqliteConnection,
    driver: i64,
    active_only: bool,
    product: Option<i64>,
) -> sqlx::Result<Option<Deployment>> {
    sqlx::query_as::<_, Deployment>(&format!(
        "SELECT {} FROM deployments
         WHERE driver_id = ?1
           AND (?2 = 0 OR status = 'active')
           AND (?3 IS NULL OR product_id = ?3)
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
        DEPLOYMENT_COLUMNS
    ))
    .bind(driver)
    .bind(active_only)
    .bind(product)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_deployment(
    conn: &mut SqliteConnection,
    deployment: &Deployment,
) -> sqlx::Result<i64> {
    Ok(sqlx::query(
        "INSERT INTO deployments
            (driver_id, vehicle_id, route_id, product_id, stock, initial_stock,
             returned_containers, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(deployment.driver_id)
    .bind(deployment.vehicle_id)
    .bind(deployment.route_id)
    .bind(deployment.product_id)
    .bind(deployment.stock)
    .bind(deployment.initial_stock)
    .bind(deployment.returned_containers)
    .bind(deployment.status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid())
}

pub async fn update_deployment(
    conn: &mut SqliteConnection,
    deployment: &Deployment,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE deployments
         SET driver_id = ?, vehicle_id = ?, route_id = ?, product_id = ?, stock = ?,
             initial_stock = ?, returned_containers = ?, status = ?, returned_at = ?
         WHERE id = ?",
    )
    .bind(deployment.driver_id)
    .bind(deployment.vehicle_id)
    .bind(deployment.route_id)
    .bind(deployment.product_id)
    .bind(deployment.stock)
    .bind(deployment.initial_stock)
    .bind(deployment.returned_containers)
    .bind(deployment.status)
    .bind(deployment.returned_at)
    .bind(deployment.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Takes `quantity` units off the deployment and credits the returned
/// containers; returns false when stock was insufficient.
pub async fn draw_stock(
    conn: &mut SqliteConnection,
    deployment_id: i64,
    quantity: i64,
    returned_containers: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE deployments
         SET stock = stock - ?1, returned_containers = returned_containers + ?2
         WHERE id = ?3 AND stock >= ?1 AND status = 'active'",
    )
    .bind(quantity)
    .bind(returned_containers)
    .bind(deployment_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_deployment(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM deployments WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
