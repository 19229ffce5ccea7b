use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{AppError, AppResult};
use crate::middleware::auth::{issue_pair, issue_token, validate_jwt, TokenKind, TokenPair};
use crate::repository::user_repo;
use crate::services::{accounts, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh: String,
}

pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let mut conn = state.db.acquire().await?;
    let account = accounts::authenticate(&mut conn, &req.username, &req.password).await?;

    let pair = issue_pair(&state.config, account.user.id, account.role())?;
    tracing::info!(user_id = account.user.id, role = %account.role(), "Token pair issued");
    Ok(Json(pair))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let claims = validate_jwt(&req.refresh, &state.config.jwt_secret, TokenKind::Refresh)?;
    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    // Role comes from the database so a changed role takes effect on refresh.
    let mut conn = state.db.acquire().await?;
    let account = user_repo::find_account(&mut conn, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let access = issue_token(&state.config, user_id, account.role(), TokenKind::Access)?;
    Ok(Json(json!({ "access": access })))
}
