use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unreturned containers per product id.
pub type ContainerMap = BTreeMap<i64, i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    #[serde(rename = "admin")]
    #[sqlx(rename = "admin")]
    Admin,
    #[serde(rename = "staff")]
    #[sqlx(rename = "staff")]
    Staff,
    #[serde(rename = "driver")]
    #[sqlx(rename = "driver")]
    Driver,
    #[serde(rename = "customer")]
    #[sqlx(rename = "customer")]
    Customer,
    #[serde(rename = "walk-in_customer")]
    #[sqlx(rename = "walk-in_customer")]
    WalkInCustomer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Driver => "driver",
            Role::Customer => "customer",
            Role::WalkInCustomer => "walk-in_customer",
        }
    }

    pub fn is_back_office(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }

    /// Registered and walk-in customers share the same narrowed view.
    pub fn is_customer(&self) -> bool {
        matches!(self, Role::Customer | Role::WalkInCustomer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "driver" => Ok(Role::Driver),
            "customer" => Ok(Role::Customer),
            "walk-in_customer" => Ok(Role::WalkInCustomer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub phone: String,
    pub address_id: Option<i64>,
    pub outstanding_containers: Json<ContainerMap>,
}

/// The authenticated principal: user and profile loaded together.
#[derive(Clone, Debug)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

impl Account {
    /// Superusers act as admins regardless of their profile role.
    pub fn role(&self) -> Role {
        if self.user.is_superuser {
            Role::Admin
        } else {
            self.profile.role
        }
    }

    pub fn profile_id(&self) -> i64 {
        self.profile.id
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role())
    }

    pub fn is_back_office(&self) -> bool {
        self.role().is_back_office()
    }

    /// True when every read must be narrowed to this profile's own records.
    pub fn is_customer(&self) -> bool {
        self.role().is_customer()
    }
}

/// Address as embedded in a profile representation.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ProfileAddress {
    pub id: i64,
    pub full_address: String,
    pub barangay: i64,
    pub municipality: i64,
    pub barangay_name: String,
    pub municipality_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<ProfileAddress>,
    pub outstanding_containers: ContainerMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub municipality: Option<i64>,
    pub barangay: Option<i64>,
    pub address_details: Option<String>,
    /// Only honoured on admin-facing endpoints.
    pub role: Option<Role>,
}

impl ProfileUpdate {
    pub fn touches_address(&self) -> bool {
        self.municipality.is_some()
            || self.barangay.is_some()
            || self
                .address_details
                .as_deref()
                .map(|d| !d.is_empty())
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Option<Role>,
}
