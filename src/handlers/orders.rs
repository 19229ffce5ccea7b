use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::SqliteConnection;
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::order::{
    ContainerReturn, NewOrder, NewWalkInOrder, OrderPatch, OrderStatus, OrderView, ProcessOrder,
    WalkInOrder,
};
use crate::models::user::Account;
use crate::repository::{order_repo, product_repo};
use crate::services::{fulfillment, AppState};

/// Customers only ever see their own orders.
async fn visible_order(
    conn: &mut SqliteConnection,
    user: &Account,
    id: i64,
) -> AppResult<OrderView> {
    let view = found(order_repo::find_view(conn, id).await?)?;
    if user.is_customer() && view.customer != Some(user.profile_id()) {
        return Err(AppError::not_found("Not found."));
    }
    Ok(view)
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OrderView>>> {
    let customer = user.is_customer().then(|| user.profile_id());
    let mut conn = state.db.acquire().await?;
    Ok(Json(order_repo::list_views(&mut conn, customer).await?))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<OrderView>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(visible_order(&mut conn, &user, id).await?))
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewOrder>,
) -> AppResult<Created<OrderView>> {
    let mut tx = state.db.begin().await?;
    let order_id = fulfillment::create_order(&mut tx, &user, input).await?;
    let view = found(order_repo::find_view(&mut tx, order_id).await?)?;
    tx.commit().await?;
    Ok(created(view))
}

pub async fn update_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<OrderPatch>,
) -> AppResult<Json<OrderView>> {
    user.require_back_office()?;

    let mut tx = state.db.begin().await?;
    fulfillment::update_order(&mut tx, id, patch).await?;
    let view = found(order_repo::find_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !order_repo::delete(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    tracing::info!(order_id = id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Status change and/or driver assignment; all of it commits or none of it does.
pub async fn process_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<ProcessOrder>,
) -> AppResult<Json<OrderView>> {
    let mut tx = state.db.begin().await?;
    fulfillment::process_order(&mut tx, &user, id, request).await?;
    let view = found(order_repo::find_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn record_returns(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<ContainerReturn>,
) -> AppResult<Json<OrderView>> {
    let mut tx = state.db.begin().await?;
    fulfillment::record_returns(&mut tx, &user, id, req.returned_containers).await?;
    let view = found(order_repo::find_view(&mut tx, id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn order_statuses(_user: CurrentUser) -> Json<Vec<&'static str>> {
    Json(OrderStatus::ALL.iter().map(|s| s.as_str()).collect())
}

pub async fn list_walk_ins(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<WalkInOrder>>> {
    user.require_back_office()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(order_repo::walk_ins(&mut conn).await?))
}

pub async fn get_walk_in(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<WalkInOrder>> {
    user.require_back_office()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(order_repo::find_walk_in(&mut conn, id).await?)?))
}

pub async fn create_walk_in(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewWalkInOrder>,
) -> AppResult<Created<WalkInOrder>> {
    user.require_back_office()?;
    if input.quantity < 1 {
        return Err(AppError::validation(
            "quantity",
            "Ensure this value is greater than or equal to 1.",
        ));
    }

    let mut conn = state.db.acquire().await?;
    product_repo::find(&mut conn, input.product).await?.ok_or_else(|| {
        AppError::validation(
            "product",
            format!("Invalid pk \"{}\" - object does not exist.", input.product),
        )
    })?;
    let id = order_repo::insert_walk_in(&mut conn, input.product, input.quantity).await?;
    tracing::info!(walk_in_id = id, product_id = input.product, quantity = input.quantity, "Walk-in sale recorded");
    Ok(created(found(order_repo::find_walk_in(&mut conn, id).await?)?))
}

pub async fn delete_walk_in(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_back_office()?;
    let mut conn = state.db.acquire().await?;
    if !order_repo::delete_walk_in(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}
