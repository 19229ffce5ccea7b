use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::Amount;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderHistoryEntry {
    pub id: i64,
    pub order: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub updated_by: Option<i64>,
    pub updated_by_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CancelledOrder {
    pub id: i64,
    pub order: i64,
    pub order_id: i64,
    pub customer_name: Option<String>,
    pub total_amount: Amount,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Option<i64>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub actor: Option<i64>,
    pub actor_username: Option<String>,
    pub actor_first_name: Option<String>,
    pub actor_last_name: Option<String>,
    pub actor_role: Option<String>,
    pub action: String,
    pub entity: String,
    pub meta: Json<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationKind {
    Sms,
    Email,
    Inapp,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user: i64,
    pub user_username: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub status: Option<String>,
    pub order: Option<i64>,
}
