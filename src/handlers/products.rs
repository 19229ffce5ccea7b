use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::product::{Product, ProductInput, ProductPatch};
use crate::models::Amount;
use crate::repository::product_repo;
use crate::services::AppState;

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(product_repo::list(&mut conn).await?))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(product_repo::find(&mut conn, id).await?)?))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<ProductInput>,
) -> AppResult<Created<Product>> {
    user.require_admin()?;

    let mut product = Product {
        id: 0,
        name: input.name.trim().to_string(),
        price: Amount::new(input.price.0),
        liters: input.liters.map_or(Amount::from(1), |l| Amount::new(l.0)),
    };
    product.check()?;

    let mut conn = state.db.acquire().await?;
    product.id = product_repo::insert(&mut conn, &product).await?;
    tracing::info!(product_id = product.id, name = %product.name, "Product created");
    Ok(created(product))
}

/// Serves both PUT and PATCH; fields left out keep their value.
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    user.require_back_office()?;

    let mut conn = state.db.acquire().await?;
    let mut product = found(product_repo::find(&mut conn, id).await?)?;
    product.apply(patch);
    product.name = product.name.trim().to_string();
    product.check()?;

    product_repo::update(&mut conn, &product).await?;
    Ok(Json(product))
}

/// Products referenced by orders are protected by the foreign key; that surfaces as 409.
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !product_repo::delete(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    tracing::info!(product_id = id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
