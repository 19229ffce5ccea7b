use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppResult;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.db).await?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
