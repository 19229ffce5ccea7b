use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqliteConnection;
use std::sync::Arc;

use super::{created, found, AppError, AppResult, Created};
use crate::middleware::auth::CurrentUser;
use crate::models::location::{
    Address, AddressInput, Barangay, BarangayInput, Municipality, MunicipalityInput,
};
use crate::repository::location_repo;
use crate::services::AppState;
use crate::utils::check_not_blank;

#[derive(Debug, Default, Deserialize)]
pub struct BarangayQuery {
    pub municipality: Option<i64>,
}

/// PUT and PATCH share these: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct MunicipalityPatch {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BarangayPatch {
    pub municipality: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddressPatch {
    pub barangay: Option<i64>,
    pub full_address: Option<String>,
}

async fn check_municipality(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    location_repo::find_municipality(conn, id).await?.ok_or_else(|| {
        AppError::validation(
            "municipality",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        )
    })?;
    Ok(())
}

async fn check_barangay(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    location_repo::find_barangay(conn, id).await?.ok_or_else(|| {
        AppError::validation(
            "barangay",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        )
    })?;
    Ok(())
}

pub async fn list_municipalities(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Municipality>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(location_repo::municipalities(&mut conn).await?))
}

pub async fn get_municipality(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Municipality>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(location_repo::find_municipality(&mut conn, id).await?)?))
}

pub async fn create_municipality(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<MunicipalityInput>,
) -> AppResult<Created<Municipality>> {
    user.require_admin()?;
    check_not_blank("name", &input.name)?;

    let mut conn = state.db.acquire().await?;
    let id = location_repo::insert_municipality(&mut conn, input.name.trim()).await?;
    Ok(created(found(location_repo::find_municipality(&mut conn, id).await?)?))
}

pub async fn update_municipality(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<MunicipalityPatch>,
) -> AppResult<Json<Municipality>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let current = found(location_repo::find_municipality(&mut conn, id).await?)?;

    let name = patch.name.unwrap_or(current.name);
    check_not_blank("name", &name)?;
    location_repo::update_municipality(&mut conn, id, name.trim()).await?;
    Ok(Json(found(location_repo::find_municipality(&mut conn, id).await?)?))
}

pub async fn delete_municipality(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !location_repo::delete_municipality(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_barangays(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<BarangayQuery>,
) -> AppResult<Json<Vec<Barangay>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(location_repo::barangays(&mut conn, query.municipality).await?))
}

pub async fn get_barangay(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Barangay>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(location_repo::find_barangay(&mut conn, id).await?)?))
}

pub async fn create_barangay(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<BarangayInput>,
) -> AppResult<Created<Barangay>> {
    user.require_admin()?;
    check_not_blank("name", &input.name)?;

    let mut conn = state.db.acquire().await?;
    check_municipality(&mut conn, input.municipality).await?;
    let id = location_repo::insert_barangay(&mut conn, input.municipality, input.name.trim()).await?;
    Ok(created(found(location_repo::find_barangay(&mut conn, id).await?)?))
}

pub async fn update_barangay(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<BarangayPatch>,
) -> AppResult<Json<Barangay>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let current = found(location_repo::find_barangay(&mut conn, id).await?)?;

    let municipality = patch.municipality.unwrap_or(current.municipality);
    let name = patch.name.unwrap_or(current.name);
    check_not_blank("name", &name)?;
    check_municipality(&mut conn, municipality).await?;

    location_repo::update_barangay(&mut conn, id, municipality, name.trim()).await?;
    Ok(Json(found(location_repo::find_barangay(&mut conn, id).await?)?))
}

pub async fn delete_barangay(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !location_repo::delete_barangay(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Address>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(location_repo::addresses(&mut conn).await?))
}

pub async fn get_address(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Address>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(found(location_repo::find_address(&mut conn, id).await?)?))
}

pub async fn create_address(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<AddressInput>,
) -> AppResult<Created<Address>> {
    user.require_admin()?;
    check_not_blank("full_address", &input.full_address)?;

    let mut conn = state.db.acquire().await?;
    check_barangay(&mut conn, input.barangay).await?;
    let id = location_repo::insert_address(&mut conn, input.barangay, input.full_address.trim()).await?;
    Ok(created(found(location_repo::find_address(&mut conn, id).await?)?))
}

pub async fn update_address(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<AddressPatch>,
) -> AppResult<Json<Address>> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let current = found(location_repo::find_address(&mut conn, id).await?)?;

    let barangay = patch.barangay.unwrap_or(current.barangay);
    let full_address = patch.full_address.unwrap_or(current.full_address);
    check_not_blank("full_address", &full_address)?;
    check_barangay(&mut conn, barangay).await?;

    location_repo::update_address(&mut conn, id, barangay, full_address.trim()).await?;
    Ok(Json(found(location_repo::find_address(&mut conn, id).await?)?))
}

pub async fn delete_address(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    let mut conn = state.db.acquire().await?;
    if !location_repo::delete_address(&mut conn, id).await? {
        return Err(AppError::not_found("Not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}
