//! Shared harness: the full router over a seeded in-memory database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

use waterstation::config::{database, Config};
use waterstation::create_router;
use waterstation::services::{accounts, AppState};

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
}

pub async fn spawn_app() -> TestApp {
    let config = Config::for_tests();
    let pool = database::create_pool(&config.database_url, config.max_db_connections)
        .await
        .unwrap();
    database::init_db(&pool).await.unwrap();
    accounts::seed(&pool).await.unwrap();

    let state = Arc::new(AppState::new(pool.clone(), config));
    TestApp {
        router: create_router(state),
        pool,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Posts a body verbatim, for payloads that are not valid JSON.
    pub async fn post_raw(&self, uri: &str, token: &str, body: &'static str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", uri, Some(token), Some(body)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/token",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login as {} failed: {}", username, body);
        body["access"].as_str().unwrap().to_string()
    }

    pub async fn admin(&self) -> String {
        self.login("admin1", "Admin@123").await
    }

    pub async fn staff(&self) -> String {
        self.login("staff1", "Staff@123").await
    }

    pub async fn driver(&self) -> String {
        self.login("driver1", "Driver@123").await
    }

    pub async fn customer(&self) -> String {
        self.login("cust1", "Customer@123").await
    }

    pub async fn walk_in(&self) -> String {
        self.login("walkin_customer", "Walkin@123").await
    }

    /// Profile id of the caller.
    pub async fn profile_id(&self, token: &str) -> i64 {
        let (_, me) = self.get("/api/me", token).await;
        me["id"].as_i64().unwrap()
    }

    pub async fn product_id(&self, name: &str) -> i64 {
        let token = self.admin().await;
        let (_, products) = self.get("/api/products", &token).await;
        products
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == name)
            .and_then(|p| p["id"].as_i64())
            .unwrap()
    }
}

/// A route covering one barangay, a truck, and an active deployment of
/// `stock` units of `product` for driver1.
pub struct Fleet {
    pub municipality: i64,
    pub barangay: i64,
    pub route: i64,
    pub vehicle: i64,
    pub deployment: i64,
}

pub async fn deploy(app: &TestApp, product: i64, stock: i64) -> Fleet {
    let admin = app.admin().await;
    let driver = app.driver().await;
    let driver_id = app.profile_id(&driver).await;

    let (_, municipality) = app
        .post("/api/municipalities", &admin, json!({ "name": "Tanauan" }))
        .await;
    let municipality = municipality["id"].as_i64().unwrap();
    let (_, barangay) = app
        .post(
            "/api/barangays",
            &admin,
            json!({ "municipality": municipality, "name": "Poblacion" }),
        )
        .await;
    let barangay = barangay["id"].as_i64().unwrap();
    let (_, route) = app
        .post(
            "/api/routes",
            &admin,
            json!({ "route_number": "R-1", "municipalities": [municipality], "barangays": [barangay] }),
        )
        .await;
    let route = route["id"].as_i64().unwrap();
    let (_, vehicle) = app
        .post(
            "/api/vehicles",
            &admin,
            json!({ "name": "Truck 1", "plate_number": "ABC-123", "stock_limit": 50 }),
        )
        .await;
    let vehicle = vehicle["id"].as_i64().unwrap();

    let (status, deployment) = app
        .post(
            "/api/deployments",
            &admin,
            json!({
                "driver": driver_id,
                "vehicle": vehicle,
                "route": route,
                "product": product,
                "stock": stock,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "deployment failed: {}", deployment);

    Fleet {
        municipality,
        barangay,
        route,
        vehicle,
        deployment: deployment["id"].as_i64().unwrap(),
    }
}
