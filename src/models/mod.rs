pub mod audit;
pub mod delivery;
pub mod fleet;
pub mod location;
pub mod money;
pub mod order;
pub mod product;
pub mod user;

pub use money::Amount;
