use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqliteConnection;

use crate::models::user::{
    Account, ContainerMap, Profile, ProfileAddress, ProfileView, Role, User,
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, is_superuser, created_at";

const PROFILE_COLUMNS: &str = "id, user_id, role, first_name, last_name, middle_name, phone, \
     address_id, outstanding_containers";

const PROFILE_VIEW_SELECT: &str = r#"
    SELECT p.id, u.username, p.role, p.first_name, p.last_name, p.middle_name,
           u.email, p.phone, p.outstanding_containers,
           a.id AS address_id, a.full_address,
           b.id AS barangay_id, b.name AS barangay_name,
           m.id AS municipality_id, m.name AS municipality_name
    FROM profiles p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN addresses a ON a.id = p.address_id
    LEFT JOIN barangays b ON b.id = a.barangay_id
    LEFT JOIN municipalities m ON m.id = b.municipality_id
"#;

#[derive(sqlx::FromRow)]
struct ProfileViewRow {
    id: i64,
    username: String,
    role: Role,
    first_name: String,
    last_name: String,
    middle_name: String,
    email: String,
    phone: String,
    outstanding_containers: Json<ContainerMap>,
    address_id: Option<i64>,
    full_address: Option<String>,
    barangay_id: Option<i64>,
    barangay_name: Option<String>,
    municipality_id: Option<i64>,
    municipality_name: Option<String>,
}

impl From<ProfileViewRow> for ProfileView {
    fn from(row: ProfileViewRow) -> Self {
        let address = match (row.address_id, row.barangay_id, row.municipality_id) {
            (Some(id), Some(barangay), Some(municipality)) => Some(ProfileAddress {
                id,
                full_address: row.full_address.unwrap_or_default(),
                barangay,
                municipality,
                barangay_name: row.barangay_name.unwrap_or_default(),
                municipality_name: row.municipality_name.unwrap_or_default(),
            }),
            _ => None,
        };

        ProfileView {
            id: row.id,
            username: row.username,
            role: row.role,
            first_name: row.first_name,
            last_name: row.last_name,
            middle_name: row.middle_name,
            email: row.email,
            phone: row.phone,
            address,
            outstanding_containers: row.outstanding_containers.0,
        }
    }
}

/// Columns written when a user and its profile are created together.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub role: Role,
    pub phone: String,
}

pub async fn find_user(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn username_exists(conn: &mut SqliteConnection, username: &str) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// True when another user (not `except`) already owns this email.
pub async fn email_taken(
    conn: &mut SqliteConnection,
    email: &str,
    except: Option<i64>,
) -> sqlx::Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE lower(email) = lower(?) AND id != ?")
            .bind(email)
            .bind(except.unwrap_or(0))
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

/// Inserts the user row and its profile; returns the new profile id.
pub async fn insert_user_with_profile(
    conn: &mut SqliteConnection,
    record: &UserRecord,
) -> sqlx::Result<i64> {
    let user_id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, is_superuser, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.username)
    .bind(&record.email)
    .bind(&record.password_hash)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(record.is_superuser)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let profile_id = sqlx::query(
        "INSERT INTO profiles (user_id, role, first_name, last_name, phone)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(record.role)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.phone)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(profile_id)
}

pub async fn update_user(conn: &mut SqliteConnection, user: &User) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET email = ?, first_name = ?, last_name = ? WHERE id = ?")
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_password(
    conn: &mut SqliteConnection,
    user_id: i64,
    password_hash: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_user(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_profile(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {} FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_profile_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>(
        "SELECT p.id, p.user_id, p.role, p.first_name, p.last_name, p.middle_name, p.phone,
                p.address_id, p.outstanding_containers
         FROM profiles p JOIN users u ON u.id = p.user_id
         WHERE u.username = ?",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn profiles_with_role(
    conn: &mut SqliteConnection,
    role: Role,
) -> sqlx::Result<Vec<Profile>> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {} FROM profiles WHERE role = ? ORDER BY id",
        PROFILE_COLUMNS
    ))
    .bind(role)
    .fetch_all(&mut *conn)
    .await
}

/// Loads the user together with its profile.
pub async fn find_account(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> sqlx::Result<Option<Account>> {
    let Some(user) = find_user(conn, user_id).await? else {
        return Ok(None);
    };
    let profile = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(profile.map(|profile| Account { user, profile }))
}

pub async fn find_account_by_profile(
    conn: &mut SqliteConnection,
    profile_id: i64,
) -> sqlx::Result<Option<Account>> {
    match find_profile(conn, profile_id).await? {
        Some(profile) => find_account(conn, profile.user_id).await,
        None => Ok(None),
    }
}

pub async fn update_profile(conn: &mut SqliteConnection, profile: &Profile) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE profiles
         SET role = ?, first_name = ?, last_name = ?, middle_name = ?, phone = ?, address_id = ?
         WHERE id = ?",
    )
    .bind(profile.role)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.middle_name)
    .bind(&profile.phone)
    .bind(profile.address_id)
    .bind(profile.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_outstanding(
    conn: &mut SqliteConnection,
    profile_id: i64,
    containers: &ContainerMap,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE profiles SET outstanding_containers = ? WHERE id = ?")
        .bind(Json(containers))
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn profile_view(
    conn: &mut SqliteConnection,
    profile_id: i64,
) -> sqlx::Result<Option<ProfileView>> {
    let row = sqlx::query_as::<_, ProfileViewRow>(&format!("{} WHERE p.id = ?", PROFILE_VIEW_SELECT))
        .bind(profile_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(ProfileView::from))
}

/// Profile listing; `role` narrows to one role, `only` to a single profile.
pub async fn profile_views(
    conn: &mut SqliteConnection,
    role: Option<Role>,
    only: Option<i64>,
) -> sqlx::Result<Vec<ProfileView>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR p.role = ?1) AND (?2 IS NULL OR p.id = ?2) ORDER BY p.id",
        PROFILE_VIEW_SELECT
    );
    let rows = sqlx::query_as::<_, ProfileViewRow>(&sql)
        .bind(role)
        .bind(only)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(ProfileView::from).collect())
}

/// Address label of a profile, used by exports and delivery views.
pub async fn address_labels(
    conn: &mut SqliteConnection,
    role: Role,
) -> sqlx::Result<Vec<(String, String, String, Option<String>)>> {
    sqlx::query_as(
        "SELECT u.username, u.email, p.phone,
                a.full_address || ', ' || b.name || ', ' || m.name
         FROM profiles p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN addresses a ON a.id = p.address_id
         LEFT JOIN barangays b ON b.id = a.barangay_id
         LEFT JOIN municipalities m ON m.id = b.municipality_id
         WHERE p.role = ?
         ORDER BY u.username",
    )
    .bind(role)
    .fetch_all(&mut *conn)
    .await
}

/// The barangay of a profile's address, if any.
pub async fn profile_barangay(
    conn: &mut SqliteConnection,
    profile_id: i64,
) -> sqlx::Result<Option<i64>> {
    let barangay: Option<Option<i64>> = sqlx::query_scalar(
        "SELECT a.barangay_id FROM profiles p LEFT JOIN addresses a ON a.id = p.address_id
         WHERE p.id = ?",
    )
    .bind(profile_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(barangay.flatten())
}
