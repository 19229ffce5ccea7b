//! Vehicles, routes and deployments.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqliteConnection;
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::fleet::{
    Deployment, DeploymentInput, DeploymentPatch, DeploymentReturn, DeploymentStatus,
    DeploymentView, Route, RouteInput, RoutePatch, RouteView, Vehicle, VehicleInput, VehiclePatch,
};
use crate::models::user::Role;
use crate::repository::{fleet_repo, location_repo, user_repo};
use crate::services::{fulfillment, AppState};
use crate::utils::{check_not_blank, split_list};

#[derive(Debug, Default, Deserialize)]
pub struct DeploymentQuery {
    pub status: Option<String>,
}

fn check_vehicle(vehicle: &Vehicle) -> AppResult<()> {
    check_not_blank("name", &vehicle.name)?;
    check_not_blank("plate_number", &vehicle.plate_number)?;
    if vehicle.stock_limit < 1 {
        return Err(AppError::validation(
            "stock_limit",
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    Ok(())
}

pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Vehicle>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(fleet_repo::vehicles(&mut conn).await?))
}

pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vehicle>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(fleet_repo::find_vehicle(&mut conn, id).await?)?))
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<VehicleInput>,
) -> AppResult<Created<Vehicle>> {
    user.require_admin()?;
    let mut vehicle = Vehicle {
        id: 0,
        name: input.name.trim().to_string(),
        plate_number: input.plate_number.trim().to_string(),
        stock_limit: input.stock_limit,
    };
    check_vehicle(&vehicle)?;

    let mut conn = state.db.acquire().await?;
    vehicle.id = fleet_repo::insert_vehicle(&mut conn, &vehicle).await?;
    Ok(created(vehicle))
}

pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<VehiclePatch>,
) -> AppResult<Json<Vehicle>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let mut vehicle = found(fleet_repo::find_vehicle(&mut conn, id).await?)?;

    if let Some(name) = patch.name {
        vehicle.name = name.trim().to_string();
    }
    if let Some(plate_number) = patch.plate_number {
        vehicle.plate_number = plate_number.trim().to_string();
    }
    if let Some(stock_limit) = patch.stock_limit {
        vehicle.stock_limit = stock_limit;
    }
    check_vehicle(&vehicle)?;

    fleet_repo::update_vehicle(&mut conn, &vehicle).await?;
    Ok(Json(vehicle))
}

pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !fleet_repo::delete_vehicle(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn route_view(conn: &mut SqliteConnection, route: Route) -> AppResult<RouteView> {
    let municipalities = location_repo::route_municipalities(conn, route.id).await?;
    let barangays = location_repo::route_barangays(conn, route.id).await?;
    Ok(RouteView::new(route, municipalities, barangays))
}

async fn set_members(
    conn: &mut SqliteConnection,
    route_id: i64,
    municipalities: Option<&[i64]>,
    barangays: Option<&[i64]>,
) -> AppResult<()> {
    if let Some(ids) = municipalities {
        for &id in ids {
            location_repo::find_municipality(conn, id).await?.ok_or_else(|| {
                AppError::validation(
                    "municipalities",
                    format!("Invalid pk \"{}\" - object does not exist.", id),
                )
            })?;
        }
        fleet_repo::set_route_municipalities(conn, route_id, ids).await?;
    }
    if let Some(ids) = barangays {
        for &id in ids {
            location_repo::find_barangay(conn, id).await?.ok_or_else(|| {
                AppError::validation(
                    "barangays",
                    format!("Invalid pk \"{}\" - object does not exist.", id),
                )
            })?;
        }
        fleet_repo::set_route_barangays(conn, route_id, ids).await?;
    }
    Ok(())
}

pub async fn list_routes(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<RouteView>>> {
    let mut conn = state.db.acquire().await?;
    let routes = fleet_repo::routes(&mut conn).await?;

    let mut views = Vec::with_capacity(routes.len());
    for route in routes {
        views.push(route_view(&mut conn, route).await?);
    }
    Ok(Json(views))
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RouteView>> {
    let mut conn = state.db.acquire().await?;
    let route = found(fleet_repo::find_route(&mut conn, id).await?)?;
    Ok(Json(route_view(&mut conn, route).await?))
}

pub async fn create_route(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<RouteInput>,
) -> AppResult<Created<RouteView>> {
    user.require_admin()?;
    check_not_blank("route_number", &input.route_number)?;

    let mut tx = state.db.begin().await?;
    let id = fleet_repo::insert_route(&mut tx, input.route_number.trim()).await?;
    set_members(
        &mut tx,
        id,
        Some(input.municipalities.as_slice()),
        Some(input.barangays.as_slice()),
    )
    .await?;
    let route = found(fleet_repo::find_route(&mut tx, id).await?)?;
    let view = route_view(&mut tx, route).await?;
    tx.commit().await?;
    Ok(created(view))
}

/// Membership lists that are present replace the stored ones.
pub async fn update_route(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<RoutePatch>,
) -> AppResult<Json<RouteView>> {
    user.require_admin()?;

    let mut tx = state.db.begin().await?;
    found(fleet_repo::find_route(&mut tx, id).await?)?;
    if let Some(route_number) = &patch.route_number {
        check_not_blank("route_number", route_number)?;
        fleet_repo::rename_route(&mut tx, id, route_number.trim()).await?;
    }
    set_members(
        &mut tx,
        id,
        patch.municipalities.as_deref(),
        patch.barangays.as_deref(),
    )
    .await?;

    let route = found(fleet_repo::find_route(&mut tx, id).await?)?;
    let view = route_view(&mut tx, route).await?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn delete_route(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !fleet_repo::delete_route(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn parse_statuses(raw: Option<&str>) -> AppResult<Vec<DeploymentStatus>> {
    split_list(raw)
        .into_iter()
        .map(|s| s.parse().map_err(|e: String| AppError::validation("status", e)))
        .collect()
}

pub async fn list_deployments(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<DeploymentQuery>,
) -> AppResult<Json<Vec<DeploymentView>>> {
    let driver = match user.role() {
        Role::Admin | Role::Staff => None,
        Role::Driver => Some(user.profile_id()),
        _ => {
            return Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    };
    let statuses = parse_statuses(query.status.as_deref())?;

    let mut conn = state.db.acquire().await?;
    Ok(Json(fleet_repo::deployment_views(&mut conn, driver, &statuses).await?))
}

pub async fn get_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeploymentView>> {
    let mut conn = state.db.acquire().await?;
    let view = found(fleet_repo::find_deployment_view(&mut conn, id).await?)?;

    let visible = match user.role() {
        Role::Admin | Role::Staff => true,
        Role::Driver => view.driver == user.profile_id(),
        _ => false,
    };
    if !visible {
        return Err(AppError::not_found("Not found."));
    }
    Ok(Json(view))
}

pub async fn create_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<DeploymentInput>,
) -> AppResult<Created<DeploymentView>> {
    user.require_admin()?;

    let mut deployment = Deployment {
        id: 0,
        driver_id: input.driver,
        vehicle_id: input.vehicle,
        route_id: input.route,
        product_id: input.product,
        stock: input.stock,
        initial_stock: input.stock,
        returned_containers: 0,
        status: DeploymentStatus::Active,
        created_at: Utc::now(),
        returned_at: None,
    };

    let mut tx = state.db.begin().await?;
    fulfillment::check_deployment(&mut tx, &deployment).await?;
    deployment.id = fleet_repo::insert_deployment(&mut tx, &deployment).await?;
    let view = found(fleet_repo::find_deployment_view(&mut tx, deployment.id).await?)?;
    tx.commit().await?;

    tracing::info!(
        deployment_id = deployment.id,
        driver_id = deployment.driver_id,
        stock = deployment.stock,
        "Deployment created"
    );
    Ok(created(view))
}

/// Re-validates the merged record. A stock change moves `initial_stock` by
/// the same amount so delivered counts stay consistent.
pub async fn update_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<DeploymentPatch>,
) -> AppResult<Json<DeploymentView>> {
    user.require_admin()?;

    let mut tx = state.db.begin().await?;
    let mut deployment = found(fleet_repo::find_deployment(&mut tx, id).await?)?;
    if let Some(driver) = patch.driver {
        deployment.driver_id = driver;
    }
    if let Some(vehicle) = patch.vehicle {
        deployment.vehicle_id = vehicle;
    }
    if let Some(route) = patch.route {
        deployment.route_id = route;
    }
    if let Some(product) = patch.product {
        deployment.product_id = product;
    }
    if let Some(stock) = patch.stock {
        deployment.initial_stock += stock - deployment.stock;
        deployment.stock = stock;
    }

    fulfillment::check_deployment(&mut tx, &deployment).await?;
    fleet_repo::update_deployment(&mut tx, &deployment).await?;
    let view = found(fleet_repo::find_deployment_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn delete_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !fleet_repo::delete_deployment(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<DeploymentView>> {
    if user.role() != Role::Driver {
        return Err(AppError::forbidden(
            "Only drivers can access their deployment",
        ));
    }

    let mut conn = state.db.acquire().await?;
    let latest = fleet_repo::latest_deployment(&mut conn, user.profile_id(), false, None)
        .await?
        .ok_or_else(|| AppError::not_found("No deployment found for this driver"))?;
    let view = found(fleet_repo::find_deployment_view(&mut conn, latest.id).await?)?;
    Ok(Json(view))
}

pub async fn deployments_for_customer(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Value>> {
    if !user.is_customer() {
        return Err(AppError::forbidden(
            "Only customers can access this endpoint",
        ));
    }

    let mut conn = state.db.acquire().await?;
    let Some(barangay) = user_repo::profile_barangay(&mut conn, user.profile_id()).await? else {
        return Ok(Json(json!({
            "deployments": [],
            "message": "No address found for customer",
        })));
    };

    let deployments = fleet_repo::deployments_covering_barangay(&mut conn, barangay).await?;
    Ok(Json(json!({
        "message": format!("Found {} deployments for your barangay", deployments.len()),
        "deployments": deployments,
    })))
}

pub async fn return_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> AppResult<Json<DeploymentView>> {
    // An empty body records a return with no containers back.
    let returned = if body.iter().all(u8::is_ascii_whitespace) {
        0
    } else {
        serde_json::from_slice::<DeploymentReturn>(&body)
            .map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e)))?
            .returned_containers
    };

    let mut tx = state.db.begin().await?;
    fulfillment::return_deployment(&mut tx, &user, id, returned).await?;
    let view = found(fleet_repo::find_deployment_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn complete_deployment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeploymentView>> {
    user.require_admin()?;

    let mut tx = state.db.begin().await?;
    fulfillment::complete_deployment(&mut tx, &user, id).await?;
    let view = found(fleet_repo::find_deployment_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}
