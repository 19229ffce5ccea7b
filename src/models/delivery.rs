use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    InRoute,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Assigned,
        DeliveryStatus::InRoute,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::InRoute => "in_route",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn can_transition(&self, to: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, to),
            (Pending, Assigned | InRoute | Cancelled)
                | (Assigned, InRoute | Delivered | Cancelled)
                | (InRoute, Delivered | Cancelled)
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid delivery status: {}", s))
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub route_id: Option<i64>,
    pub status: DeliveryStatus,
    pub delivered_quantity: Option<i64>,
    pub returned_containers: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DeliveryView {
    pub id: i64,
    pub order: i64,
    pub order_id: i64,
    pub order_product_name: Option<String>,
    pub order_quantity: i64,
    pub order_status: String,
    pub driver: Option<i64>,
    pub driver_username: Option<String>,
    pub vehicle: Option<i64>,
    pub vehicle_name: Option<String>,
    pub route: Option<i64>,
    pub route_number: Option<String>,
    pub status: DeliveryStatus,
    pub delivered_quantity: Option<i64>,
    pub returned_containers: i64,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryPatch {
    pub status: Option<String>,
    pub delivered_quantity: Option<i64>,
    pub returned_containers: Option<i64>,
    pub vehicle: Option<i64>,
    pub route: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDelivery {
    pub order: i64,
    pub driver: Option<i64>,
    pub vehicle: Option<i64>,
    pub route: Option<i64>,
}
