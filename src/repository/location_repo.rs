use sqlx::SqliteConnection;

use crate::models::location::{Address, Barangay, Municipality};

const BARANGAY_SELECT: &str = "SELECT b.id, b.municipality_id AS municipality, b.name, \
     m.name AS municipality_name \
     FROM barangays b JOIN municipalities m ON m.id = b.municipality_id";

const ADDRESS_SELECT: &str = "SELECT a.id, a.barangay_id AS barangay, a.full_address, \
     b.name AS barangay_name, m.name AS municipality_name \
     FROM addresses a \
     JOIN barangays b ON b.id = a.barangay_id \
     JOIN municipalities m ON m.id = b.municipality_id";

pub async fn municipalities(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Municipality>> {
    sqlx::query_as::<_, Municipality>("SELECT id, name FROM municipalities ORDER BY name")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_municipality(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<Municipality>> {
    sqlx::query_as::<_, Municipality>("SELECT id, name FROM municipalities WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_municipality(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
    Ok(sqlx::query("INSERT INTO municipalities (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid())
}

pub async fn update_municipality(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE municipalities SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_municipality(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM municipalities WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn barangays(
    conn: &mut SqliteConnection,
    municipality: Option<i64>,
) -> sqlx::Result<Vec<Barangay>> {
    sqlx::query_as::<_, Barangay>(&format!(
        "{} WHERE (?1 IS NULL OR b.municipality_id = ?1) ORDER BY b.name",
        BARANGAY_SELECT
    ))
    .bind(municipality)
    .fetch_all(&mut *conn)
    .await
}

pub async fn find_barangay(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Barangay>> {
    sqlx::query_as::<_, Barangay>(&format!("{} WHERE b.id = ?", BARANGAY_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn route_barangays(
    conn: &mut SqliteConnection,
    route_id: i64,
) -> sqlx::Result<Vec<Barangay>> {
    sqlx::query_as::<_, Barangay>(&format!(
        "{} JOIN route_barangays rb ON rb.barangay_id = b.id WHERE rb.route_id = ? ORDER BY b.name",
        BARANGAY_SELECT
    ))
    .bind(route_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn route_municipalities(
    conn: &mut SqliteConnection,
    route_id: i64,
) -> sqlx::Result<Vec<Municipality>> {
    sqlx::query_as::<_, Municipality>(
        "SELECT m.id, m.name FROM municipalities m
         JOIN route_municipalities rm ON rm.municipality_id = m.id
         WHERE rm.route_id = ? ORDER BY m.name",
    )
    .bind(route_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_barangay(
    conn: &mut SqliteConnection,
    municipality: i64,
    name: &str,
) -> sqlx::Result<i64> {
    Ok(
        sqlx::query("INSERT INTO barangays (municipality_id, name) VALUES (?, ?)")
            .bind(municipality)
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
    )
}

pub async fn update_barangay(
    conn: &mut SqliteConnection,
    id: i64,
    municipality: i64,
    name: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE barangays SET municipality_id = ?, name = ? WHERE id = ?")
        .bind(municipality)
        .bind(name)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_barangay(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM barangays WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn addresses(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Address>> {
    sqlx::query_as::<_, Address>(&format!("{} ORDER BY a.id", ADDRESS_SELECT))
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_address(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Address>> {
    sqlx::query_as::<_, Address>(&format!("{} WHERE a.id = ?", ADDRESS_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_address_id(
    conn: &mut SqliteConnection,
    barangay: i64,
    full_address: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM addresses WHERE barangay_id = ? AND full_address = ?")
        .bind(barangay)
        .bind(full_address)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_address(
    conn: &mut SqliteConnection,
    barangay: i64,
    full_address: &str,
) -> sqlx::Result<i64> {
    Ok(
        sqlx::query("INSERT INTO addresses (barangay_id, full_address) VALUES (?, ?)")
            .bind(barangay)
            .bind(full_address)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
    )
}

pub async fn update_address(
    conn: &mut SqliteConnection,
    id: i64,
    barangay: i64,
    full_address: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE addresses SET barangay_id = ?, full_address = ? WHERE id = ?")
        .bind(barangay)
        .bind(full_address)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_address(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
