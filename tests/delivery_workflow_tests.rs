mod common;

use axum::http::StatusCode;
use common::{deploy, spawn_app, TestApp};
use serde_json::{json, Value};

/// Places a customer order and sends it out with driver1. Returns
/// `(order_id, delivery_id)`.
async fn dispatch(app: &TestApp, product: i64, quantity: i64) -> (i64, i64) {
    let customer = app.customer().await;
    let (_, order) = app
        .post(
            "/api/orders",
            &customer,
            json!({ "product": product, "quantity": quantity }),
        )
        .await;
    let order_id = order["id"].as_i64().unwrap();

    let staff = app.staff().await;
    let driver = app.driver().await;
    let driver_id = app.profile_id(&driver).await;
    let (status, body) = app
        .post(
            &format!("/api/orders/{}/process", order_id),
            &staff,
            json!({ "status": "out", "driver_id": driver_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "dispatch failed: {}", body);

    let (_, deliveries) = app.get("/api/deliveries", &driver).await;
    let delivery_id = deliveries
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["order"] == order_id)
        .and_then(|d| d["id"].as_i64())
        .unwrap();
    (order_id, delivery_id)
}

fn messages(notifications: &Value) -> Vec<String> {
    notifications
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["message"].as_str().map(str::to_string))
        .collect()
}

// ===== Dispatch =====

#[tokio::test]
async fn test_dispatch_assigns_driver_vehicle_and_route() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let fleet = deploy(&app, product, 10).await;
    let (order_id, delivery_id) = dispatch(&app, product, 3).await;

    let admin = app.admin().await;
    let (status, delivery) = app
        .get(&format!("/api/deliveries/{}", delivery_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["status"], "assigned");
    assert_eq!(delivery["vehicle"], fleet.vehicle);
    assert_eq!(delivery["route"], fleet.route);
    assert_eq!(delivery["driver_username"], "driver1");
    assert_eq!(delivery["order_status"], "out");

    let customer = app.customer().await;
    let (_, notes) = app.get("/api/notifications", &customer).await;
    assert!(messages(&notes).contains(&format!(
        "Your order #{} is now Out for Delivery by D Driver.",
        order_id
    )));
}

#[tokio::test]
async fn test_driver_cannot_reassign_or_send_out() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (order_id, _) = dispatch(&app, product, 1).await;

    let driver = app.driver().await;
    let uri = format!("/api/orders/{}/process", order_id);
    let (status, _) = app.post(&uri, &driver, json!({ "driver_id": null })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&uri, &driver, json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not allowed for your role");
}

#[tokio::test]
async fn test_unassigning_driver_removes_delivery() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (order_id, delivery_id) = dispatch(&app, product, 1).await;

    let staff = app.staff().await;
    let (status, order) = app
        .post(
            &format!("/api/orders/{}/process", order_id),
            &staff,
            json!({ "driver_id": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["delivery_status"], Value::Null);

    let (status, _) = app
        .get(&format!("/api/deliveries/{}", delivery_id), &staff)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ===== Completion =====

#[tokio::test]
async fn test_full_delivery_draws_stock_and_tracks_containers() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let fleet = deploy(&app, product, 10).await;
    let (order_id, delivery_id) = dispatch(&app, product, 3).await;

    let driver = app.driver().await;
    let (status, delivery) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "in_route" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["status"], "in_route");

    let (status, delivery) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "delivered", "delivered_quantity": 3, "returned_containers": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", delivery);
    assert_eq!(delivery["status"], "delivered");
    assert_eq!(delivery["order_status"], "delivered");
    assert_eq!(delivery["delivered_quantity"], 3);
    assert!(delivery["delivered_at"].is_string());

    let admin = app.admin().await;
    let (_, deployment) = app
        .get(&format!("/api/deployments/{}", fleet.deployment), &admin)
        .await;
    assert_eq!(deployment["stock"], 7);
    assert_eq!(deployment["initial_stock"], 10);
    assert_eq!(deployment["returned_containers"], 1);

    let customer = app.customer().await;
    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"][product.to_string()], 2);

    let (_, notes) = app.get("/api/notifications", &customer).await;
    assert!(messages(&notes).contains(&format!(
        "Your order #{} has been Delivered. Thank you for choosing our service!",
        order_id
    )));

    // Finished deliveries drop off the driver's working list but stay in history.
    let (_, open) = app.get("/api/deliveries", &driver).await;
    assert!(open.as_array().unwrap().is_empty());
    let (_, mine) = app.get("/api/deliveries/my-deliveries", &driver).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back_everything() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    let fleet = deploy(&app, product, 2).await;
    let (order_id, delivery_id) = dispatch(&app, product, 3).await;

    let driver = app.driver().await;
    let (status, body) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Insufficient stock: deployment has 2 left but 3 were delivered."
    );

    let admin = app.admin().await;
    let (_, delivery) = app
        .get(&format!("/api/deliveries/{}", delivery_id), &admin)
        .await;
    assert_eq!(delivery["status"], "assigned");
    let (_, order) = app.get(&format!("/api/orders/{}", order_id), &admin).await;
    assert_eq!(order["status"], "out");
    let (_, deployment) = app
        .get(&format!("/api/deployments/{}", fleet.deployment), &admin)
        .await;
    assert_eq!(deployment["stock"], 2);

    let customer = app.customer().await;
    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"], json!({}));
}

#[tokio::test]
async fn test_delivery_without_active_deployment_fails() {
    let app = spawn_app().await;
    let five = app.product_id("Refill 5L").await;
    let twenty = app.product_id("Refill 20L").await;
    deploy(&app, twenty, 10).await;
    let (_, delivery_id) = dispatch(&app, five, 1).await;

    let driver = app.driver().await;
    let (status, body) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "No active deployment found for this driver and product."
    );
}

#[tokio::test]
async fn test_driver_completes_through_order_process() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 20L").await;
    let fleet = deploy(&app, product, 5).await;
    let (order_id, _) = dispatch(&app, product, 2).await;

    let driver = app.driver().await;
    let (status, order) = app
        .post(
            &format!("/api/orders/{}/process", order_id),
            &driver,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", order);
    assert_eq!(order["status"], "delivered");

    let (_, deployment) = app.get("/api/deployments/my-deployment", &driver).await;
    assert_eq!(deployment["id"], fleet.deployment);
    assert_eq!(deployment["stock"], 3);
}

#[tokio::test]
async fn test_delivered_quantity_is_bounded_by_order() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (_, delivery_id) = dispatch(&app, product, 2).await;

    let driver = app.driver().await;
    let (status, body) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "delivered", "delivered_quantity": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["delivered_quantity"].is_array());
}

// ===== Container returns =====

#[tokio::test]
async fn test_returns_reconcile_outstanding_containers() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (order_id, delivery_id) = dispatch(&app, product, 4).await;

    let driver = app.driver().await;
    app.patch(
        &format!("/api/deliveries/{}", delivery_id),
        &driver,
        json!({ "status": "delivered" }),
    )
    .await;

    let customer = app.customer().await;
    let key = product.to_string();
    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"][&key], 4);

    let uri = format!("/api/orders/{}/returns", order_id);
    let (status, _) = app.patch(&uri, &driver, json!({ "returned_containers": 3 })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"][&key], 1);

    // A lower count gives containers back to the customer.
    app.patch(&uri, &driver, json!({ "returned_containers": 1 })).await;
    let (_, me) = app.get("/api/me", &customer).await;
    assert_eq!(me["outstanding_containers"][&key], 3);

    let (status, body) = app.patch(&uri, &driver, json!({ "returned_containers": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["returned_containers"].is_array());

    let staff = app.staff().await;
    let (status, _) = app.patch(&uri, &staff, json!({ "returned_containers": 2 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_counter_take_back_reduces_outstanding() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (_, delivery_id) = dispatch(&app, product, 3).await;

    let driver = app.driver().await;
    app.patch(
        &format!("/api/deliveries/{}", delivery_id),
        &driver,
        json!({ "status": "delivered" }),
    )
    .await;

    let customer = app.customer().await;
    let customer_id = app.profile_id(&customer).await;
    let uri = format!("/api/customers/{}/return-containers", customer_id);
    let staff = app.staff().await;

    let (status, body) = app
        .post(&uri, &staff, json!({ "product": product, "quantity": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["quantity"].is_array());

    let (status, body) = app
        .post(&uri, &staff, json!({ "product": product, "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outstanding_containers"], json!({}));

    let (status, _) = app
        .post(&uri, &customer, json!({ "product": product, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ===== Delivery visibility =====

#[tokio::test]
async fn test_delivery_visibility_by_role() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (_, delivery_id) = dispatch(&app, product, 1).await;
    let uri = format!("/api/deliveries/{}", delivery_id);

    let customer = app.customer().await;
    let (status, _) = app.get(&uri, &customer).await;
    assert_eq!(status, StatusCode::OK);
    let (_, mine) = app.get("/api/deliveries/my-deliveries", &customer).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let admin = app.admin().await;
    let (_, other) = app
        .post(
            "/api/customers",
            &admin,
            json!({ "username": "cust2", "email": "cust2@example.com", "password": "Pass@123" }),
        )
        .await;
    assert_eq!(other["role"], "customer");
    let stranger = app.login("cust2", "Pass@123").await;
    let (status, _) = app.get(&uri, &stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app.get("/api/deliveries", &stranger).await;
    assert!(listed.as_array().unwrap().is_empty());

    let staff = app.staff().await;
    let (status, _) = app.get("/api/deliveries/my-deliveries", &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .patch(&uri, &staff, json!({ "status": "in_route" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancelling_delivery_cancels_order() {
    let app = spawn_app().await;
    let product = app.product_id("Refill 5L").await;
    deploy(&app, product, 10).await;
    let (order_id, delivery_id) = dispatch(&app, product, 1).await;

    let driver = app.driver().await;
    let (status, delivery) = app
        .patch(
            &format!("/api/deliveries/{}", delivery_id),
            &driver,
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["status"], "cancelled");
    assert_eq!(delivery["order_status"], "cancelled");

    let admin = app.admin().await;
    let (_, cancelled) = app.get("/api/cancelled-orders", &admin).await;
    assert_eq!(cancelled[0]["order"], order_id);
}
