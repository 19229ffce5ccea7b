//! SQL access, one module per aggregate. Functions take a plain connection
//! so they compose inside a transaction or on a pooled connection.

pub mod audit_repo;
pub mod delivery_repo;
pub mod fleet_repo;
pub mod location_repo;
pub mod order_repo;
pub mod product_repo;
pub mod user_repo;
