mod common;

use axum::http::StatusCode;
use common::{deploy, spawn_app};
use serde_json::json;

// ===== Vehicles and routes =====

#[tokio::test]
async fn test_vehicle_stock_limit_must_be_positive() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (status, body) = app
        .post(
            "/api/vehicles",
            &admin,
            json!({ "name": "Van", "plate_number": "XYZ-1", "stock_limit": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["stock_limit"].is_array());

    let staff = app.staff().await;
    let (status, _) = app
        .post(
            "/api/vehicles",
            &staff,
            json!({ "name": "Van", "plate_number": "XYZ-1", "stock_limit": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_route_reports_member_names() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 5).await;
    let admin = app.admin().await;

    let (status, route) = app
        .get(&format!("/api/routes/{}", fleet.route), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["municipalities"], json!([fleet.municipality]));
    assert_eq!(route["barangays"], json!([fleet.barangay]));
    assert_eq!(route["municipality_names"], "Tanauan");

    let (status, _) = app
        .post(
            "/api/routes",
            &admin,
            json!({ "route_number": "R-2", "municipalities": [9999] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===== Deployment validation =====

#[tokio::test]
async fn test_deployment_stock_cannot_exceed_vehicle_limit() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let fleet = deploy(&app, product, 10).await;
    let admin = app.admin().await;
    let driver = app.driver().await;
    let driver_id = app.profile_id(&driver).await;

    let (status, body) = app
        .post(
            "/api/deployments",
            &admin,
            json!({
                "driver": driver_id,
                "vehicle": fleet.vehicle,
                "route": fleet.route,
                "product": product,
                "stock": 60,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["stock"][0], "Stock (60) exceeds vehicle limit (50)!");

    let (status, body) = app
        .patch(
            &format!("/api/deployments/{}", fleet.deployment),
            &admin,
            json!({ "stock": 51 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["stock"][0], "Stock (51) exceeds vehicle limit (50)!");
}

#[tokio::test]
async fn test_deployment_requires_a_driver() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let fleet = deploy(&app, product, 10).await;
    let admin = app.admin().await;
    let staff = app.staff().await;
    let staff_id = app.profile_id(&staff).await;

    let (status, body) = app
        .post(
            "/api/deployments",
            &admin,
            json!({
                "driver": staff_id,
                "vehicle": fleet.vehicle,
                "route": fleet.route,
                "product": product,
                "stock": 5,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["driver"][0], "Invalid driver ID or driver not found.");
}

#[tokio::test]
async fn test_stock_update_shifts_initial_stock() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 10).await;
    let admin = app.admin().await;

    let (status, deployment) = app
        .patch(
            &format!("/api/deployments/{}", fleet.deployment),
            &admin,
            json!({ "stock": 15 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deployment["stock"], 15);
    assert_eq!(deployment["initial_stock"], 15);
}

// ===== Deployment lifecycle =====

#[tokio::test]
async fn test_return_then_complete() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 10).await;
    let admin = app.admin().await;
    let driver = app.driver().await;
    let uri = format!("/api/deployments/{}", fleet.deployment);

    let (status, body) = app
        .post(&format!("{}/complete", uri), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Only returned deployments"));

    let (status, deployment) = app
        .post(
            &format!("{}/return", uri),
            &driver,
            json!({ "returned_containers": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deployment["status"], "returned");
    assert_eq!(deployment["returned_containers"], 4);
    assert!(deployment["returned_at"].is_string());

    let (status, _) = app
        .post(&format!("{}/return", uri), &driver, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, deployment) = app
        .post(&format!("{}/complete", uri), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deployment["status"], "completed");

    let (_, active) = app.get("/api/deployments?status=active", &admin).await;
    assert!(active.as_array().unwrap().is_empty());
    let (_, done) = app
        .get("/api/deployments?status=returned,completed", &admin)
        .await;
    assert_eq!(done.as_array().unwrap().len(), 1);
    let (status, _) = app.get("/api/deployments?status=lost", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_without_body_is_accepted() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 10).await;
    let driver = app.driver().await;

    let (status, deployment) = app
        .call(
            "POST",
            &format!("/api/deployments/{}/return", fleet.deployment),
            Some(&driver),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deployment["returned_containers"], 0);
}

#[tokio::test]
async fn test_return_with_malformed_body_is_rejected() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 10).await;
    let driver = app.driver().await;
    let uri = format!("/api/deployments/{}", fleet.deployment);

    let status = app
        .post_raw(&format!("{}/return", uri), &driver, r#"{"returned_containers": "four"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let admin = app.admin().await;
    let (_, deployment) = app.get(&uri, &admin).await;
    assert_eq!(deployment["status"], "active");
}

// ===== Deployment access =====

#[tokio::test]
async fn test_my_deployment_is_for_drivers_only() {
    let app = spawn_app().await;
    let driver = app.driver().await;
    let (status, body) = app.get("/api/deployments/my-deployment", &driver).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No deployment found for this driver");

    let customer = app.customer().await;
    let (status, body) = app.get("/api/deployments/my-deployment", &customer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only drivers can access their deployment");

    let (status, _) = app.get("/api/deployments", &customer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_sees_deployments_for_own_barangay() {
    let app = spawn_app().await;
    let fleet = deploy(&app, app.product_id("Refill 5L").await, 10).await;
    let customer = app.customer().await;

    let (status, body) = app
        .get("/api/deployments/by-customer-barangay", &customer)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No address found for customer");
    assert_eq!(body["deployments"], json!([]));

    app.patch(
        "/api/me",
        &customer,
        json!({
            "municipality": fleet.municipality,
            "barangay": fleet.barangay,
            "address_details": "Blk 2 Lot 7",
        }),
    )
    .await;
    let (_, body) = app
        .get("/api/deployments/by-customer-barangay", &customer)
        .await;
    assert_eq!(body["message"], "Found 1 deployments for your barangay");
    assert_eq!(body["deployments"][0]["id"], fleet.deployment);
    assert_eq!(body["deployments"][0]["vehicle_plate_number"], "ABC-123");

    let driver = app.driver().await;
    let (status, body) = app
        .get("/api/deployments/by-customer-barangay", &driver)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only customers can access this endpoint");
}

// ===== Locations =====

#[tokio::test]
async fn test_barangays_filter_by_municipality() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (_, a) = app
        .post("/api/municipalities", &admin, json!({ "name": "Sto. Tomas" }))
        .await;
    let (_, b) = app
        .post("/api/municipalities", &admin, json!({ "name": "Calamba" }))
        .await;
    for name in ["San Roque", "San Pedro"] {
        app.post(
            "/api/barangays",
            &admin,
            json!({ "municipality": a["id"], "name": name }),
        )
        .await;
    }
    app.post(
        "/api/barangays",
        &admin,
        json!({ "municipality": b["id"], "name": "Real" }),
    )
    .await;

    let customer = app.customer().await;
    let (status, listed) = app
        .get(&format!("/api/barangays?municipality={}", a["id"]), &customer)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, _) = app
        .post("/api/municipalities", &customer, json!({ "name": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/barangays",
            &admin,
            json!({ "municipality": 9999, "name": "Ghost" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["municipality"][0],
        "Invalid pk \"9999\" - object does not exist."
    );
}

// ===== Products =====

#[tokio::test]
async fn test_product_catalog_permissions() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let staff = app.staff().await;
    let customer = app.customer().await;

    let (status, products) = app.get("/api/products", &customer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products[0]["name"], "Refill 20L");

    let (status, _) = app
        .post("/api/products", &staff, json!({ "name": "Refill 10L", "price": "45.00" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, product) = app
        .post("/api/products", &admin, json!({ "name": "Refill 10L", "price": "45.00" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/products/{}", product["id"]);

    let (status, _) = app.patch(&uri, &staff, json!({ "price": "50.00" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_product_in_use_cannot_be_deleted() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let customer = app.customer().await;
    app.post("/api/orders", &customer, json!({ "product": product }))
        .await;
    let admin = app.admin().await;

    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/products/{}", product),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
