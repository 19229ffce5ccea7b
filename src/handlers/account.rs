use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{created, found, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::user::{ProfileUpdate, ProfileView};
use crate::repository::user_repo;
use crate::services::accounts::{self, Signup};
use crate::services::AppState;

/// Missing fields deserialize as empty so the handler can answer with its own 400.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Created<Value>> {
    let signup = Signup {
        phone: req.phone.trim().to_string(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        ..Signup::customer(&req.username, &req.email, &req.password)
    };

    let mut tx = state.db.begin().await?;
    let profile_id = accounts::open_account(&mut tx, signup).await?;
    let profile = found(user_repo::profile_view(&mut tx, profile_id).await?)?;
    tx.commit().await?;

    Ok(created(json!({
        "message": "User registered successfully",
        "user": profile,
    })))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    accounts::change_password(&mut conn, &user, &req.old_password, &req.new_password).await?;
    Ok(Json(json!({ "status": "Password changed successfully" })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<ProfileView>> {
    let mut conn = state.db.acquire().await?;
    let profile = found(user_repo::profile_view(&mut conn, user.profile_id()).await?)?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    let mut tx = state.db.begin().await?;
    accounts::update_profile(&mut tx, &user, update, false).await?;
    let profile = found(user_repo::profile_view(&mut tx, user.profile_id()).await?)?;
    tx.commit().await?;
    Ok(Json(profile))
}
