use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Municipality {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Barangay {
    pub id: i64,
    pub municipality: i64,
    pub name: String,
    pub municipality_name: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: i64,
    pub barangay: i64,
    pub full_address: String,
    pub barangay_name: String,
    pub municipality_name: String,
}

impl Address {
    pub fn label(&self) -> String {
        format!("{}, {}, {}", self.full_address, self.barangay_name, self.municipality_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MunicipalityInput {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarangayInput {
    pub municipality: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub barangay: i64,
    pub full_address: String,
}
