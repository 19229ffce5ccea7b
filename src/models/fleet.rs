use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::location::{Barangay, Municipality};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub name: String,
    pub plate_number: String,
    pub stock_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleInput {
    pub name: String,
    pub plate_number: String,
    pub stock_limit: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    pub name: Option<String>,
    pub plate_number: Option<String>,
    pub stock_limit: Option<i64>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Route {
    pub id: i64,
    pub route_number: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RouteView {
    pub id: i64,
    pub route_number: String,
    pub municipalities: Vec<i64>,
    pub barangays: Vec<i64>,
    pub municipalities_detail: Vec<Municipality>,
    pub barangays_detail: Vec<Barangay>,
    pub municipality_names: String,
}

impl RouteView {
    pub fn new(route: Route, municipalities: Vec<Municipality>, barangays: Vec<Barangay>) -> Self {
        let municipality_names = municipalities
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: route.id,
            route_number: route.route_number,
            municipalities: municipalities.iter().map(|m| m.id).collect(),
            barangays: barangays.iter().map(|b| b.id).collect(),
            municipalities_detail: municipalities,
            barangays_detail: barangays,
            municipality_names,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteInput {
    pub route_number: String,
    #[serde(default)]
    pub municipalities: Vec<i64>,
    #[serde(default)]
    pub barangays: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutePatch {
    pub route_number: Option<String>,
    pub municipalities: Option<Vec<i64>>,
    pub barangays: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    Returned,
    Completed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Active => "active",
            DeploymentStatus::Returned => "returned",
            DeploymentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeploymentStatus::Active),
            "returned" => Ok(DeploymentStatus::Returned),
            "completed" => Ok(DeploymentStatus::Completed),
            other => Err(format!("Invalid deployment status: {}", other)),
        }
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Deployment {
    pub id: i64,
    pub driver_id: i64,
    pub vehicle_id: i64,
    pub route_id: i64,
    pub product_id: i64,
    pub stock: i64,
    pub initial_stock: i64,
    pub returned_containers: i64,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DeploymentView {
    pub id: i64,
    pub driver: i64,
    pub vehicle: i64,
    pub route: i64,
    pub product: i64,
    pub stock: i64,
    pub initial_stock: i64,
    pub returned_containers: i64,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub driver_first_name: String,
    pub driver_last_name: String,
    pub vehicle_name: String,
    pub vehicle_plate_number: String,
    pub route_number: String,
    pub product_name: String,
    pub municipality_names: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentInput {
    pub driver: i64,
    pub vehicle: i64,
    pub route: i64,
    pub product: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentPatch {
    pub driver: Option<i64>,
    pub vehicle: Option<i64>,
    pub route: Option<i64>,
    pub product: Option<i64>,
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentReturn {
    #[serde(default)]
    pub returned_containers: i64,
}

/// Checks a deployment's stock against the vehicle it rides in.
pub fn check_stock(stock: i64, vehicle: &Vehicle) -> Result<(), (&'static str, String)> {
    if stock <= 0 {
        return Err(("stock", "Stock must be a positive integer.".to_string()));
    }
    if stock > vehicle.stock_limit {
        return Err((
            "stock",
            format!("Stock ({}) exceeds vehicle limit ({})!", stock, vehicle.stock_limit),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck() -> Vehicle {
        Vehicle {
            id: 1,
            name: "Truck".into(),
            plate_number: "ABC-123".into(),
            stock_limit: 50,
        }
    }

    #[test]
    fn stock_within_limit_is_accepted() {
        assert!(check_stock(50, &truck()).is_ok());
    }

    #[test]
    fn stock_over_limit_names_both_numbers() {
        let (_, message) = check_stock(51, &truck()).unwrap_err();
        assert_eq!(message, "Stock (51) exceeds vehicle limit (50)!");
    }

    #[test]
    fn zero_stock_is_rejected() {
        let (field, _) = check_stock(0, &truck()).unwrap_err();
        assert_eq!(field, "stock");
    }

    #[test]
    fn route_view_joins_municipality_names() {
        let view = RouteView::new(
            Route { id: 3, route_number: "R1".into() },
            vec![
                Municipality { id: 1, name: "Tanauan".into() },
                Municipality { id: 2, name: "Malvar".into() },
            ],
            Vec::new(),
        );
        assert_eq!(view.municipality_names, "Tanauan, Malvar");
        assert_eq!(view.municipalities, vec![1, 2]);
    }
}
