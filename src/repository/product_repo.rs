use sqlx::SqliteConnection;

use crate::models::product::Product;

pub async fn list(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Product>> {
    sqlx::query_as::<_, Product>("SELECT id, name, price, liters FROM products ORDER BY name, id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT id, name, price, liters FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT id, name, price, liters FROM products WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> sqlx::Result<i64> {
    Ok(
        sqlx::query("INSERT INTO products (name, price, liters) VALUES (?, ?, ?)")
            .bind(&product.name)
            .bind(product.price)
            .bind(product.liters)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid(),
    )
}

pub async fn update(conn: &mut SqliteConnection, product: &Product) -> sqlx::Result<()> {
    sqlx::query("UPDATE products SET name = ?, price = ?, liters = ? WHERE id = ?")
        .bind(&product.name)
        .bind(product.price)
        .bind(product.liters)
        .bind(product.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
