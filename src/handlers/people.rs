//! Customers, staff, drivers and the admin-only user/profile endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqliteConnection;
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::user::{ContainerMap, NewUser, ProfileUpdate, ProfileView, Role};
use crate::repository::{audit_repo, user_repo};
use crate::services::accounts::{self, Signup};
use crate::services::{containers, AppState};

#[derive(Debug, Deserialize)]
pub struct TakeBackRequest {
    pub product: i64,
    pub quantity: i64,
}

async fn view_with_role(
    conn: &mut SqliteConnection,
    role: Role,
    profile_id: i64,
) -> AppResult<ProfileView> {
    found(
        user_repo::profile_view(conn, profile_id)
            .await?
            .filter(|p| p.role == role),
    )
}

async fn create_with_role(
    state: &AppState,
    role: Role,
    input: NewUser,
) -> AppResult<Created<ProfileView>> {
    let signup = Signup {
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        phone: input.phone.trim().to_string(),
        role,
        ..Signup::customer(&input.username, &input.email, &input.password)
    };

    let mut tx = state.db.begin().await?;
    let profile_id = accounts::open_account(&mut tx, signup).await?;
    let view = found(user_repo::profile_view(&mut tx, profile_id).await?)?;
    tx.commit().await?;
    Ok(created(view))
}

async fn update_with_role(
    state: &AppState,
    role: Option<Role>,
    profile_id: i64,
    update: ProfileUpdate,
) -> AppResult<Json<ProfileView>> {
    let mut tx = state.db.begin().await?;
    let target = found(
        user_repo::find_account_by_profile(&mut tx, profile_id)
            .await?
            .filter(|a| role.map_or(true, |r| a.profile.role == r)),
    )?;

    accounts::update_profile(&mut tx, &target, update, role.is_none()).await?;
    let view = found(user_repo::profile_view(&mut tx, profile_id).await?)?;
    tx.commit().await?;
    Ok(Json(view))
}

async fn delete_with_role(state: &AppState, role: Role, profile_id: i64) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    let target = found(
        user_repo::find_account_by_profile(&mut tx, profile_id)
            .await?
            .filter(|a| a.profile.role == role),
    )?;
    user_repo::delete_user(&mut tx, target.user.id).await?;
    tx.commit().await?;

    tracing::info!(profile_id, role = %role, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ProfileView>>> {
    let only = user.is_customer().then(|| user.profile_id());
    let mut conn = state.db.acquire().await?;
    let customers = user_repo::profile_views(&mut conn, Some(Role::Customer), only).await?;
    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ProfileView>> {
    if user.is_customer() && user.profile_id() != id {
        return Err(AppError::not_found("Not found."));
    }
    let mut conn = state.db.acquire().await?;
    Ok(Json(view_with_role(&mut conn, Role::Customer, id).await?))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewUser>,
) -> AppResult<Created<ProfileView>> {
    user.require_admin()?;
    create_with_role(&state, Role::Customer, input).await
}

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    user.require_admin()?;
    update_with_role(&state, Some(Role::Customer), id, update).await
}

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    delete_with_role(&state, Role::Customer, id).await
}

/// Containers handed back at the counter or on a route without a delivery.
pub async fn return_containers(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<TakeBackRequest>,
) -> AppResult<Json<serde_json::Value>> {
    user.require(&[Role::Admin, Role::Staff, Role::Driver])?;

    let mut tx = state.db.begin().await?;
    let remaining: ContainerMap = containers::take_back(&mut tx, id, req.product, req.quantity).await?;
    audit_repo::log_activity(
        &mut tx,
        Some(user.profile_id()),
        "return_containers",
        &format!("profile:{}", id),
        json!({ "product": req.product, "quantity": req.quantity }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(customer_id = id, product_id = req.product, quantity = req.quantity, "Containers taken back");
    Ok(Json(json!({ "outstanding_containers": remaining })))
}

pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ProfileView>>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(user_repo::profile_views(&mut conn, Some(Role::Staff), None).await?))
}

pub async fn get_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ProfileView>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(view_with_role(&mut conn, Role::Staff, id).await?))
}

pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewUser>,
) -> AppResult<Created<ProfileView>> {
    user.require_admin()?;
    create_with_role(&state, Role::Staff, input).await
}

pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    user.require_admin()?;
    update_with_role(&state, Some(Role::Staff), id, update).await
}

pub async fn delete_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    delete_with_role(&state, Role::Staff, id).await
}

pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<ProfileView>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(user_repo::profile_views(&mut conn, Some(Role::Driver), None).await?))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ProfileView>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(view_with_role(&mut conn, Role::Driver, id).await?))
}

/// Admin creation of an account with any role; defaults to customer.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<NewUser>,
) -> AppResult<Created<ProfileView>> {
    user.require_admin()?;
    let role = input.role.unwrap_or(Role::Customer);
    create_with_role(&state, role, input).await
}

/// Profile update by profile id, including the role.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    user.require_admin()?;
    update_with_role(&state, None, id, update).await
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ProfileView>>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(user_repo::profile_views(&mut conn, None, None).await?))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ProfileView>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(user_repo::profile_view(&mut conn, id).await?)?))
}
