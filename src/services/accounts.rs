use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::product::Product;
use crate::models::user::{Account, ProfileUpdate, Role};
use crate::models::Amount;
use crate::repository::user_repo::{self, UserRecord};
use crate::repository::{location_repo, product_repo};
use crate::utils;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Everything needed to open an account.
#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl Signup {
    pub fn customer(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            role: Role::Customer,
            is_superuser: false,
        }
    }
}

/// Checks credentials; any mismatch is reported as 401 without saying which part failed.
pub async fn authenticate(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> AppResult<Account> {
    let user = user_repo::find_user_by_username(conn, username.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(password, &user.password_hash) {
        tracing::info!(user_id = user.id, "Rejected login");
        return Err(AppError::Unauthorized);
    }

    user_repo::find_account(conn, user.id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Creates the user and its profile; returns the profile id.
pub async fn open_account(conn: &mut SqliteConnection, signup: Signup) -> AppResult<i64> {
    if signup.username.is_empty() || signup.email.is_empty() || signup.password.is_empty() {
        return Err(AppError::bad_request(
            "Username, email, and password are required",
        ));
    }
    utils::check_username(&signup.username).map_err(|m| AppError::validation("username", m))?;
    utils::check_email(&signup.email).map_err(|m| AppError::validation("email", m))?;

    if user_repo::username_exists(conn, &signup.username).await? {
        return Err(AppError::bad_request("Username already exists"));
    }
    if user_repo::email_taken(conn, &signup.email, None).await? {
        return Err(AppError::bad_request("Email already exists"));
    }

    let record = UserRecord {
        password_hash: hash_password(&signup.password)?,
        username: signup.username,
        email: signup.email,
        first_name: signup.first_name,
        last_name: signup.last_name,
        is_superuser: signup.is_superuser,
        role: signup.role,
        phone: signup.phone,
    };
    let profile_id = user_repo::insert_user_with_profile(conn, &record).await?;

    tracing::info!(profile_id, role = %record.role, "Account created");
    Ok(profile_id)
}

pub async fn change_password(
    conn: &mut SqliteConnection,
    account: &Account,
    old_password: &str,
    new_password: &str,
) -> AppResult<()> {
    if old_password.is_empty() || new_password.is_empty() {
        return Err(AppError::bad_request(
            "Both old_password and new_password are required",
        ));
    }
    if !verify_password(old_password, &account.user.password_hash) {
        return Err(AppError::bad_request("Incorrect current password"));
    }

    let hash = hash_password(new_password)?;
    user_repo::set_password(conn, account.user.id, &hash).await?;
    tracing::info!(user_id = account.user.id, "Password changed");
    Ok(())
}

/// Applies a profile update to `target`. `allow_role` gates the role field.
pub async fn update_profile(
    conn: &mut SqliteConnection,
    target: &Account,
    update: ProfileUpdate,
    allow_role: bool,
) -> AppResult<()> {
    let mut user = target.user.clone();
    let mut profile = target.profile.clone();

    if let Some(email) = update.email.as_deref().map(str::trim) {
        utils::check_email(email).map_err(|m| AppError::validation("email", m))?;
        if user_repo::email_taken(conn, email, Some(user.id)).await? {
            return Err(AppError::validation("email", "Email already exists"));
        }
        user.email = email.to_string();
    }
    if let Some(first_name) = &update.first_name {
        user.first_name = first_name.clone();
        profile.first_name = first_name.clone();
    }
    if let Some(last_name) = &update.last_name {
        user.last_name = last_name.clone();
        profile.last_name = last_name.clone();
    }
    if let Some(middle_name) = &update.middle_name {
        profile.middle_name = middle_name.clone();
    }
    if let Some(phone) = &update.phone {
        profile.phone = phone.clone();
    }
    if allow_role {
        if let Some(role) = update.role {
            profile.role = role;
        }
    }

    if update.touches_address() {
        let municipality = update.municipality.ok_or_else(|| {
            AppError::validation("municipality", "Municipality is required when setting an address.")
        })?;
        let barangay = update.barangay.ok_or_else(|| {
            AppError::validation("barangay", "Barangay is required when setting an address.")
        })?;
        let details = update
            .address_details
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                AppError::validation("address_details", "House Number / Lot Number / Street is required.")
            })?;

        location_repo::find_municipality(conn, municipality)
            .await?
            .ok_or_else(|| AppError::validation("municipality", "Invalid municipality selected."))?;
        let barangay = location_repo::find_barangay(conn, barangay)
            .await?
            .filter(|b| b.municipality == municipality)
            .ok_or_else(|| AppError::validation("barangay", "Invalid barangay selected."))?;

        match profile.address_id {
            Some(address_id) => {
                location_repo::update_address(conn, address_id, barangay.id, details).await?;
            }
            None => {
                let address_id = match location_repo::find_address_id(conn, barangay.id, details).await? {
                    Some(existing) => existing,
                    None => location_repo::insert_address(conn, barangay.id, details).await?,
                };
                profile.address_id = Some(address_id);
            }
        }
    }

    user_repo::update_user(conn, &user).await?;
    user_repo::update_profile(conn, &profile).await?;
    tracing::debug!(profile_id = profile.id, "Profile updated");
    Ok(())
}

/// Default accounts and products for a fresh installation.
struct DefaultUser {
    username: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
    superuser: bool,
    first_name: &'static str,
    last_name: &'static str,
    phone: &'static str,
}

const DEFAULT_USERS: &[DefaultUser] = &[
    DefaultUser {
        username: "admin1",
        email: "admin@example.com",
        password: "Admin@123",
        role: Role::Admin,
        superuser: true,
        first_name: "Aqua",
        last_name: "Admin",
        phone: "0917-000-0000",
    },
    DefaultUser {
        username: "staff1",
        email: "staff@example.com",
        password: "Staff@123",
        role: Role::Staff,
        superuser: false,
        first_name: "Sam",
        last_name: "Dispatcher",
        phone: "0917-111-1111",
    },
    DefaultUser {
        username: "driver1",
        email: "driver@example.com",
        password: "Driver@123",
        role: Role::Driver,
        superuser: false,
        first_name: "D",
        last_name: "Driver",
        phone: "0917-333-3333",
    },
    DefaultUser {
        username: "cust1",
        email: "cust@example.com",
        password: "Customer@123",
        role: Role::Customer,
        superuser: false,
        first_name: "Cathy",
        last_name: "Customer",
        phone: "0917-222-2222",
    },
    DefaultUser {
        username: WALK_IN_USERNAME,
        email: "walkin@example.com",
        password: "Walkin@123",
        role: Role::WalkInCustomer,
        superuser: false,
        first_name: "Walk-in",
        last_name: "Customer",
        phone: "",
    },
];

/// Profile that counter sales without a named customer are booked against.
pub const WALK_IN_USERNAME: &str = "walkin_customer";

const DEFAULT_PRODUCTS: &[(&str, i64, i64)] = &[("Refill 5L", 30, 5), ("Refill 20L", 60, 20)];

#[derive(Debug, Default, Clone, Copy)]
pub struct SeedReport {
    pub users_created: usize,
    pub products_created: usize,
}

/// Creates whatever default users and products are missing.
pub async fn seed(pool: &SqlitePool) -> anyhow::Result<SeedReport> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    for user in DEFAULT_USERS {
        if user_repo::username_exists(&mut tx, user.username).await? {
            continue;
        }
        let signup = Signup {
            first_name: user.first_name.to_string(),
            last_name: user.last_name.to_string(),
            phone: user.phone.to_string(),
            role: user.role,
            is_superuser: user.superuser,
            ..Signup::customer(user.username, user.email, user.password)
        };
        open_account(&mut tx, signup)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", user.username, e))?;
        report.users_created += 1;
    }

    for (name, price, liters) in DEFAULT_PRODUCTS {
        if product_repo::find_by_name(&mut tx, name).await?.is_some() {
            continue;
        }
        let product = Product {
            id: 0,
            name: name.to_string(),
            price: Amount::from(*price),
            liters: Amount::from(*liters),
        };
        product_repo::insert(&mut tx, &product).await?;
        report.products_created += 1;
    }

    tx.commit().await?;
    tracing::info!(
        users = report.users_created,
        products = report.products_created,
        "Seed complete"
    );
    Ok(report)
}
