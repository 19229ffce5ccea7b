//! Read side of the audit trail plus per-user notifications.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{AppError, AppResult};
use crate::middleware::auth::CurrentUser;
use crate::models::audit::{ActivityLog, CancelledOrder, HistoryFilter, Notification, OrderHistoryEntry};
use crate::models::user::Role;
use crate::repository::audit_repo;
use crate::services::AppState;

pub async fn order_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<Vec<OrderHistoryEntry>>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(audit_repo::history(&mut conn, &filter).await?))
}

pub async fn cancelled_orders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<CancelledOrder>>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(audit_repo::cancellations(&mut conn).await?))
}

pub async fn activity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ActivityLog>>> {
    let actor = match user.role() {
        Role::Admin | Role::Staff => None,
        Role::Driver => Some(user.profile_id()),
        Role::Customer | Role::WalkInCustomer => return Ok(Json(Vec::new())),
    };
    let mut conn = state.db.acquire().await?;
    Ok(Json(audit_repo::activity(&mut conn, actor).await?))
}

pub async fn my_logs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ActivityLog>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(audit_repo::activity(&mut conn, Some(user.profile_id())).await?))
}

pub async fn notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Notification>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(audit_repo::notifications(&mut conn, user.profile_id()).await?))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    if !audit_repo::mark_read(&mut conn, user.profile_id(), id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(Json(json!({ "status": "marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    let updated = audit_repo::mark_all_read(&mut conn, user.profile_id()).await?;
    Ok(Json(json!({ "status": "all marked as read", "updated": updated })))
}
