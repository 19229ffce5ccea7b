//! CSV downloads for the back office.

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::models::user::Role;
use crate::repository::{product_repo, user_repo};
use crate::services::AppState;

fn write_csv<I, R>(header: &[&str], rows: I) -> anyhow::Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish CSV: {}", e))
}

fn attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={}", filename)),
        ],
        body,
    )
        .into_response()
}

async fn people_csv(state: &AppState, role: Role, filename: &str) -> AppResult<Response> {
    let mut conn = state.db.acquire().await?;
    let rows = user_repo::address_labels(&mut conn, role).await?;

    let body = write_csv(
        &["username", "email", "phone", "address"],
        rows.into_iter().map(|(username, email, phone, address)| {
            [username, email, phone, address.unwrap_or_default()]
        }),
    )?;
    tracing::debug!(role = %role, bytes = body.len(), "CSV export");
    Ok(attachment(filename, body))
}

pub async fn export_customers(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    user.require_back_office()?;
    people_csv(&state, Role::Customer, "customers.csv").await
}

pub async fn export_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    user.require_back_office()?;
    people_csv(&state, Role::Staff, "staff.csv").await
}

pub async fn export_products(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    user.require_back_office()?;

    let mut conn = state.db.acquire().await?;
    let products = product_repo::list(&mut conn).await?;
    let body = write_csv(
        &["name", "price", "liters"],
        products
            .into_iter()
            .map(|p| [p.name, p.price.to_string(), p.liters.to_string()]),
    )?;
    Ok(attachment("products.csv", body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quotes_fields_with_commas() {
        let body = write_csv(
            &["username", "address"],
            vec![["cust1".to_string(), "12 Mabini St, Poblacion".to_string()]],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "username,address\ncust1,\"12 Mabini St, Poblacion\"\n"
        );
    }
}
