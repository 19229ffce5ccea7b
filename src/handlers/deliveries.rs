use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::delivery::{DeliveryPatch, DeliveryView, NewDelivery};
use crate::models::user::{Account, Role};
use crate::repository::delivery_repo::{self, DeliveryScope};
use crate::repository::order_repo;
use crate::services::{fulfillment, AppState};

/// Drivers see their open deliveries, customers those of their own orders.
fn list_scope(user: &Account) -> DeliveryScope {
    match user.role() {
        Role::Admin | Role::Staff => DeliveryScope::default(),
        Role::Driver => DeliveryScope {
            driver: Some(user.profile_id()),
            open_only: true,
            ..Default::default()
        },
        Role::Customer | Role::WalkInCustomer => DeliveryScope {
            customer: Some(user.profile_id()),
            ..Default::default()
        },
    }
}

pub async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<DeliveryView>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(delivery_repo::list_views(&mut conn, list_scope(&user)).await?))
}

/// Full history for the caller, finished deliveries included.
pub async fn my_deliveries(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<DeliveryView>>> {
    let scope = match user.role() {
        Role::Driver => DeliveryScope {
            driver: Some(user.profile_id()),
            ..Default::default()
        },
        Role::Customer | Role::WalkInCustomer => DeliveryScope {
            customer: Some(user.profile_id()),
            ..Default::default()
        },
        _ => {
            return Err(AppError::forbidden(
                "Only drivers and customers have their own deliveries.",
            ))
        }
    };
    let mut conn = state.db.acquire().await?;
    Ok(Json(delivery_repo::list_views(&mut conn, scope).await?))
}

pub async fn get_delivery(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeliveryView>> {
    let mut conn = state.db.acquire().await?;
    let view = found(delivery_repo::find_view(&mut conn, id).await?)?;

    let visible = match user.role() {
        Role::Admin | Role::Staff => true,
        Role::Driver => view.driver == Some(user.profile_id()),
        Role::Customer | Role::WalkInCustomer => order_repo::find(&mut conn, view.order_id)
            .await?
            .is_some_and(|o| o.customer_id == Some(user.profile_id())),
    };
    if !visible {
        return Err(AppError::not_found("Not found."));
    }
    Ok(Json(view))
}

pub async fn create_delivery(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewDelivery>,
) -> AppResult<Created<DeliveryView>> {
    user.require_admin()?;

    let mut tx = state.db.begin().await?;
    let id = fulfillment::create_delivery(&mut tx, input).await?;
    let view = found(delivery_repo::find_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(created(view))
}

pub async fn update_delivery(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<DeliveryPatch>,
) -> AppResult<Json<DeliveryView>> {
    let mut tx = state.db.begin().await?;
    fulfillment::update_delivery(&mut tx, &user, id, patch).await?;
    let view = found(delivery_repo::find_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn delete_delivery(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !delivery_repo::delete(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}
