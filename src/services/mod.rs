pub mod accounts;
pub mod containers;
pub mod fulfillment;
pub mod notification;
pub mod reports;

use crate::config::Config;
use sqlx::SqlitePool;

pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self { db, config }
    }
}
