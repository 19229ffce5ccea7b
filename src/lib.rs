//! Backend for a water refilling station: customer orders, deliveries
//! against truck deployments, returnable containers, and back-office reports.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

use axum::{
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    account, audit, auth, deliveries, exports, fleet, health, locations, orders, people, products,
    reports,
};
use crate::services::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        // Auth and own account
        .route("/token", post(auth::obtain_token))
        .route("/token/refresh", post(auth::refresh_token))
        .route("/account/register", post(account::register))
        .route("/account/change-password", post(account::change_password))
        .route("/me", get(account::me).patch(account::update_me))
        // People
        .route(
            "/customers",
            get(people::list_customers).post(people::create_customer),
        )
        .route(
            "/customers/:id",
            get(people::get_customer)
                .put(people::update_customer)
                .patch(people::update_customer)
                .delete(people::delete_customer),
        )
        .route(
            "/customers/:id/return-containers",
            post(people::return_containers),
        )
        .route("/staff", get(people::list_staff).post(people::create_staff))
        .route(
            "/staff/:id",
            get(people::get_staff)
                .put(people::update_staff)
                .patch(people::update_staff)
                .delete(people::delete_staff),
        )
        .route("/drivers", get(people::list_drivers))
        .route("/drivers/:id", get(people::get_driver))
        .route("/users", post(people::create_user))
        .route("/users/:id", patch(people::update_user))
        .route("/profiles", get(people::list_profiles))
        .route("/profiles/:id", get(people::get_profile))
        // Locations
        .route(
            "/municipalities",
            get(locations::list_municipalities).post(locations::create_municipality),
        )
        .route(
            "/municipalities/:id",
            get(locations::get_municipality)
                .put(locations::update_municipality)
                .patch(locations::update_municipality)
                .delete(locations::delete_municipality),
        )
        .route(
            "/barangays",
            get(locations::list_barangays).post(locations::create_barangay),
        )
        .route(
            "/barangays/:id",
            get(locations::get_barangay)
                .put(locations::update_barangay)
                .patch(locations::update_barangay)
                .delete(locations::delete_barangay),
        )
        .route(
            "/addresses",
            get(locations::list_addresses).post(locations::create_address),
        )
        .route(
            "/addresses/:id",
            get(locations::get_address)
                .put(locations::update_address)
                .patch(locations::update_address)
                .delete(locations::delete_address),
        )
        // Catalog
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        // Orders
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/statuses", get(orders::order_statuses))
        .route(
            "/orders/:id",
            get(orders::get_order)
                .put(orders::update_order)
                .patch(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id/process", post(orders::process_order))
        .route("/orders/:id/returns", patch(orders::record_returns))
        .route(
            "/walk-in-orders",
            get(orders::list_walk_ins).post(orders::create_walk_in),
        )
        .route(
            "/walk-in-orders/:id",
            get(orders::get_walk_in).delete(orders::delete_walk_in),
        )
        // Deliveries
        .route(
            "/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route("/deliveries/my-deliveries", get(deliveries::my_deliveries))
        .route(
            "/deliveries/:id",
            get(deliveries::get_delivery)
                .patch(deliveries::update_delivery)
                .delete(deliveries::delete_delivery),
        )
        // Fleet
        .route(
            "/vehicles",
            get(fleet::list_vehicles).post(fleet::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            get(fleet::get_vehicle)
                .put(fleet::update_vehicle)
                .patch(fleet::update_vehicle)
                .delete(fleet::delete_vehicle),
        )
        .route("/routes", get(fleet::list_routes).post(fleet::create_route))
        .route(
            "/routes/:id",
            get(fleet::get_route)
                .put(fleet::update_route)
                .patch(fleet::update_route)
                .delete(fleet::delete_route),
        )
        .route(
            "/deployments",
            get(fleet::list_deployments).post(fleet::create_deployment),
        )
        .route("/deployments/my-deployment", get(fleet::my_deployment))
        .route(
            "/deployments/by-customer-barangay",
            get(fleet::deployments_for_customer),
        )
        .route(
            "/deployments/:id",
            get(fleet::get_deployment)
                .put(fleet::update_deployment)
                .patch(fleet::update_deployment)
                .delete(fleet::delete_deployment),
        )
        .route("/deployments/:id/return", post(fleet::return_deployment))
        .route("/deployments/:id/complete", post(fleet::complete_deployment))
        // Audit
        .route("/order-history", get(audit::order_history))
        .route("/cancelled-orders", get(audit::cancelled_orders))
        .route("/activity", get(audit::activity))
        .route("/activity/my-logs", get(audit::my_logs))
        .route("/notifications", get(audit::notifications))
        .route("/notifications/read-all", post(audit::mark_all_read))
        .route("/notifications/:id/read", post(audit::mark_read))
        // Reports and exports
        .route("/reports", get(reports::report))
        .route("/export/customers.csv", get(exports::export_customers))
        .route("/export/staff.csv", get(exports::export_staff))
        .route("/export/products.csv", get(exports::export_products));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
