//! Outstanding container bookkeeping.
//!
//! Every customer profile carries a map of product id to the number of
//! reusable containers they still hold. Deliveries add to it, returns
//! subtract from it, and entries never go below zero.

use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::models::user::{ContainerMap, Role};
use crate::repository::{delivery_repo, user_repo};

/// Applies `delta` to one product's count, dropping entries that reach zero.
pub fn adjust(map: &mut ContainerMap, product_id: i64, delta: i64) {
    let next = map.get(&product_id).copied().unwrap_or(0) + delta;
    if next > 0 {
        map.insert(product_id, next);
    } else {
        map.remove(&product_id);
    }
}

/// Rebuilds per-customer maps from `(customer, product, delivered, returned)` tuples.
pub fn tally<I>(rows: I) -> std::collections::BTreeMap<i64, ContainerMap>
where
    I: IntoIterator<Item = (i64, i64, i64, i64)>,
{
    let mut raw: std::collections::BTreeMap<i64, ContainerMap> = Default::default();
    for (customer, product, delivered, returned) in rows {
        *raw.entry(customer).or_default().entry(product).or_insert(0) += delivered - returned;
    }
    for map in raw.values_mut() {
        map.retain(|_, count| *count > 0);
    }
    raw
}

/// Adds `delta` containers of `product_id` to the customer's outstanding map.
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    customer_id: i64,
    product_id: i64,
    delta: i64,
) -> AppResult<ContainerMap> {
    let profile = user_repo::find_profile(conn, customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found."))?;

    let mut map = profile.outstanding_containers.0;
    adjust(&mut map, product_id, delta);
    user_repo::set_outstanding(conn, customer_id, &map).await?;
    Ok(map)
}

/// Containers handed back outside of a delivery.
pub async fn take_back(
    conn: &mut SqliteConnection,
    customer_id: i64,
    product_id: i64,
    quantity: i64,
) -> AppResult<ContainerMap> {
    if quantity <= 0 {
        return Err(AppError::validation(
            "quantity",
            "Quantity must be a positive integer.",
        ));
    }

    let profile = user_repo::find_profile(conn, customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found."))?;
    if !profile.role.is_customer() {
        return Err(AppError::not_found("Customer not found."));
    }

    let held = profile
        .outstanding_containers
        .0
        .get(&product_id)
        .copied()
        .unwrap_or(0);
    if quantity > held {
        return Err(AppError::validation(
            "quantity",
            format!("Customer only has {} outstanding containers for this product.", held),
        ));
    }

    apply_delta(conn, customer_id, product_id, -quantity).await
}

/// Recomputes the map of every customer-scope profile, plus any profile that
/// received a delivery, from delivered deliveries; returns the number written.
pub async fn recompute_all(pool: &SqlitePool) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    let rows = delivery_repo::delivered_rows(&mut tx).await?;
    let totals = tally(rows.into_iter().filter_map(|row| {
        Some((
            row.customer_id?,
            row.product_id?,
            row.delivered_quantity,
            row.returned_containers,
        ))
    }));

    let mut profile_ids: BTreeSet<i64> = totals.keys().copied().collect();
    for role in [Role::Customer, Role::WalkInCustomer] {
        let profiles = user_repo::profiles_with_role(&mut tx, role).await?;
        profile_ids.extend(profiles.iter().map(|p| p.id));
    }

    for &customer_id in &profile_ids {
        let map = totals.get(&customer_id).cloned().unwrap_or_default();
        user_repo::set_outstanding(&mut tx, customer_id, &map).await?;
        tracing::debug!(customer_id, products = map.len(), "Recomputed containers");
    }

    tx.commit().await?;
    Ok(profile_ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_adds_and_removes() {
        let mut map = ContainerMap::new();
        adjust(&mut map, 1, 3);
        assert_eq!(map.get(&1), Some(&3));
        adjust(&mut map, 1, -3);
        assert!(map.is_empty());
    }

    #[test]
    fn adjust_never_goes_negative() {
        let mut map = ContainerMap::new();
        adjust(&mut map, 2, -5);
        assert!(map.get(&2).is_none());
    }

    #[test]
    fn tally_keeps_positive_totals_only() {
        let totals = tally(vec![(10, 1, 5, 2), (10, 1, 1, 1), (10, 2, 2, 2), (11, 1, 4, 0)]);
        assert_eq!(totals[&10].get(&1), Some(&3));
        assert!(totals[&10].get(&2).is_none());
        assert_eq!(totals[&11].get(&1), Some(&4));
    }

    #[test]
    fn outstanding_map_serializes_with_string_keys() {
        let mut map = ContainerMap::new();
        adjust(&mut map, 7, 2);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"7":2}"#);
        let back: ContainerMap = serde_json::from_str(r#"{"7":2}"#).unwrap();
        assert_eq!(back, map);
    }
}
