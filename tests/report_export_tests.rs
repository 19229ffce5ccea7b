mod common;

use axum::http::{header, StatusCode};
use common::{deploy, spawn_app};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use waterstation::config::database;
use waterstation::services::{accounts, containers};

fn amount(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.as_f64().unwrap(),
    }
}

// ===== Reports =====

#[tokio::test]
async fn test_report_counts_delivered_and_skips_cancelled() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let customer = app.customer().await;
    let staff = app.staff().await;
    let driver = app.driver().await;
    let driver_id = app.profile_id(&driver).await;

    let (_, kept) = app
        .post("/api/orders", &customer, json!({ "product": product, "quantity": 3 }))
        .await;
    let (_, dropped) = app
        .post("/api/orders", &customer, json!({ "product": product, "quantity": 5 }))
        .await;
    app.post(
        &format!("/api/orders/{}/process", dropped["id"]),
        &staff,
        json!({ "status": "cancelled" }),
    )
    .await;
    app.post(
        &format!("/api/orders/{}/process", kept["id"]),
        &staff,
        json!({ "status": "out", "driver_id": driver_id }),
    )
    .await;
    let (status, _) = app
        .post(
            &format!("/api/orders/{}/process", kept["id"]),
            &driver,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let admin = app.admin().await;
    let (status, report) = app.get("/api/reports", &admin).await;
    assert_eq!(status, StatusCode::OK);

    let sales = report["sales"].as_array().unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0]["orders"], 1);
    assert_eq!(sales[0]["total"].as_f64(), Some(90.0));
    assert!(sales[0]["created_at__date"].is_string());

    assert_eq!(
        report["to_be_returned"],
        json!([{ "name": "Refill 5L", "delivered": 3, "returned": 0, "outstanding": 3 }])
    );

    let top = report["top_customers"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["customer__user__username"], "cust1");
    assert_eq!(amount(&top[0]["spend"]), 90.0);

    assert_eq!(report["revenue_summary"]["today"].as_f64(), Some(90.0));
    assert_eq!(report["revenue_summary"]["month"].as_f64(), Some(90.0));

    let (status, _) = app.get("/api/reports", &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_report_ranks_customers_and_groups_by_day() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let staff = app.staff().await;
    let small = app.product_id("Refill 5L").await;
    let large = app.product_id("Refill 20L").await;
    let (_, other) = app
        .post(
            "/api/customers",
            &admin,
            json!({ "username": "cust2", "email": "cust2@example.com", "password": "Pass@123" }),
        )
        .await;
    let customer = app.customer().await;

    app.post("/api/orders", &customer, json!({ "product": small })).await;
    let (status, _) = app
        .post(
            "/api/orders",
            &staff,
            json!({ "product": large, "quantity": 2, "customer": other["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, report) = app.get("/api/reports", &admin).await;
    let sales = report["sales"].as_array().unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0]["orders"], 2);
    assert_eq!(sales[0]["total"].as_f64(), Some(150.0));

    let top = report["top_customers"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["customer__user__username"], "cust2");
    assert_eq!(amount(&top[0]["spend"]), 120.0);
    assert_eq!(top[1]["customer__user__username"], "cust1");
    assert_eq!(amount(&top[1]["spend"]), 30.0);
    assert_eq!(report["revenue_summary"]["week"].as_f64(), Some(150.0));
}

#[tokio::test]
async fn test_empty_report_has_zero_revenue() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (status, report) = app.get("/api/reports", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["sales"], json!([]));
    assert_eq!(report["to_be_returned"], json!([]));
    assert_eq!(report["top_customers"], json!([]));
    assert_eq!(report["revenue_summary"]["week"].as_f64(), Some(0.0));
}

// ===== CSV exports =====

#[tokio::test]
async fn test_customer_export_is_a_csv_attachment() {
    let app = spawn_app().await;
    let staff = app.staff().await;

    let response = app
        .send("GET", "/api/export/customers.csv", Some(&staff), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=customers.csv"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("username,email,phone,address"));
    assert_eq!(lines.next(), Some("cust1,cust@example.com,0917-222-2222,"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_product_export_lists_catalog() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (status, body) = app.get("/api/export/products.csv", &admin).await;
    assert_eq!(status, StatusCode::OK);

    let text = body.as_str().unwrap();
    assert!(text.starts_with("name,price,liters\n"));
    assert!(text.contains("Refill 5L,30.00,5.00"));
    assert!(text.contains("Refill 20L,60.00,20.00"));
}

#[tokio::test]
async fn test_exports_are_back_office_only() {
    let app = spawn_app().await;
    let driver = app.driver().await;
    for uri in [
        "/api/export/customers.csv",
        "/api/export/staff.csv",
        "/api/export/products.csv",
    ] {
        let (status, _) = app.get(uri, &driver).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

// ===== Maintenance commands =====

#[tokio::test]
async fn test_seed_is_idempotent_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("station.db").display());

    let pool = assert_ok!(database::create_pool(&url, 4).await);
    assert_ok!(database::init_db(&pool).await);
    let first = assert_ok!(accounts::seed(&pool).await);
    assert_eq!(first.users_created, 5);
    assert_eq!(first.products_created, 2);
    pool.close().await;

    let reopened = assert_ok!(database::create_pool(&url, 4).await);
    assert_ok!(database::init_db(&reopened).await);
    let second = assert_ok!(accounts::seed(&reopened).await);
    assert_eq!(second.users_created, 0);
    assert_eq!(second.products_created, 0);
}

#[tokio::test]
async fn test_missing_database_directory_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("missing/station.db").display());
    assert_err!(database::create_pool(&url, 1).await);
}

#[tokio::test]
async fn test_recompute_rebuilds_outstanding_containers() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let customer = app.customer().await;
    let staff = app.staff().await;
    let driver = app.driver().await;
    let driver_id = app.profile_id(&driver).await;

    let (_, order) = app
        .post("/api/orders", &customer, json!({ "product": product, "quantity": 4 }))
        .await;
    let uri = format!("/api/orders/{}/process", order["id"]);
    app.post(&uri, &staff, json!({ "status": "out", "driver_id": driver_id }))
        .await;
    app.post(&uri, &driver, json!({ "status": "delivered" })).await;

    let (_, counter) = app
        .post(
            "/api/orders",
            &staff,
            json!({ "product": product, "quantity": 3, "notes": "walk-in" }),
        )
        .await;
    let (status, _) = app
        .post(
            &format!("/api/orders/{}/process", counter["id"]),
            &staff,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let customer_id = app.profile_id(&customer).await;
    let walk_in = app.walk_in().await;
    let walk_in_id = app.profile_id(&walk_in).await;
    sqlx::query("UPDATE profiles SET outstanding_containers = '{}' WHERE id = ?")
        .bind(customer_id)
        .execute(&app.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE profiles SET outstanding_containers = ? WHERE id = ?")
        .bind(format!(r#"{{"{}":99}}"#, product))
        .bind(walk_in_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let updated = assert_ok!(containers::recompute_all(&app.pool).await);
    assert_eq!(updated, 2);

    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"][product.to_string()], 4);
    let (_, counter_profile) = app.get("/api/me", &walk_in).await;
    let held = counter_profile["outstanding_containers"].as_object().unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[&product.to_string()], 3);
}
