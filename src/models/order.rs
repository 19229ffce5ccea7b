use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Out,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Processing,
        OrderStatus::Out,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Out => "out",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Out => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Walk-in orders skip the `out` leg and may go straight to `delivered`.
    pub fn can_transition(&self, to: OrderStatus, walk_in: bool) -> bool {
        match (self, to) {
            (OrderStatus::Processing, OrderStatus::Out | OrderStatus::Cancelled) => true,
            (OrderStatus::Processing, OrderStatus::Delivered) => walk_in,
            (OrderStatus::Out, OrderStatus::Delivered | OrderStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid status: {}", s))
    }
}

/// True when free-text notes mark the order as a counter sale.
pub fn is_walk_in_note(notes: &str) -> bool {
    let lowered = notes.to_lowercase();
    lowered.contains("walk-in") || lowered.contains("walk in")
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub product_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub quantity: i64,
    pub status: OrderStatus,
    pub notes: String,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_walk_in(&self) -> bool {
        is_walk_in_note(&self.notes)
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderView {
    pub id: i64,
    pub product: Option<i64>,
    pub product_name: Option<String>,
    pub customer: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub quantity: i64,
    pub status: OrderStatus,
    pub notes: String,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub delivery_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub product: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub customer: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub product: Option<i64>,
    pub quantity: Option<i64>,
    pub notes: Option<String>,
}

/// Distinguishes an absent `driver_id` from an explicit `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverChange {
    #[default]
    Keep,
    Unassign,
    Assign(i64),
}

impl<'de> Deserialize<'de> for DriverChange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<i64> = Option::deserialize(deserializer)?;
        Ok(match value {
            Some(id) => DriverChange::Assign(id),
            None => DriverChange::Unassign,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessOrder {
    pub status: Option<String>,
    #[serde(default)]
    pub driver_id: DriverChange,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerReturn {
    pub returned_containers: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct WalkInOrder {
    pub id: i64,
    pub product: i64,
    pub product_name: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWalkInOrder {
    pub product: i64,
    pub quantity: i64,
}
