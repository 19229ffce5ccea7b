use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use super::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::services::reports::{self, Report};
use crate::services::AppState;

pub async fn report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<Report>> {
    user.require_admin()?;

    let mut conn = state.db.acquire().await?;
    let report = reports::build(&mut conn, Utc::now().date_naive()).await?;
    Ok(Json(report))
}
