pub mod account;
pub mod audit;
pub mod auth;
pub mod deliveries;
pub mod exports;
pub mod fleet;
pub mod health;
pub mod locations;
pub mod orders;
pub mod people;
pub mod products;
pub mod reports;

use axum::{http::StatusCode, Json};
use serde::Serialize;

pub use crate::error::{AppError, AppResult};

pub type Created<T> = (StatusCode, Json<T>);

pub fn created<T: Serialize>(body: T) -> Created<T> {
    (StatusCode::CREATED, Json(body))
}

/// Turns a missing row into the generic 404 body.
pub fn found<T>(row: Option<T>) -> AppResult<T> {
    row.ok_or_else(|| AppError::not_found("Not found."))
}
