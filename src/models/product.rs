use serde::{Deserialize, Serialize};

use super::Amount;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Amount,
    pub liters: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub price: Amount,
    pub liters: Option<Amount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Amount>,
    pub liters: Option<Amount>,
}

impl Product {
    pub fn apply(&mut self, patch: ProductPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(price) = patch.price {
            self.price = Amount::new(price.0);
        }
        if let Some(liters) = patch.liters {
            self.liters = Amount::new(liters.0);
        }
    }

    /// Field-level checks; returns `(field, message)` on the first failure.
    pub fn check(&self) -> Result<(), (&'static str, String)> {
        if self.name.trim().is_empty() {
            return Err(("name", "This field may not be blank.".to_string()));
        }
        if !self.price.is_positive() {
            return Err(("price", "Price must be greater than zero.".to_string()));
        }
        if !self.liters.is_positive() {
            return Err(("liters", "Liters must be greater than zero.".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: 1,
            name: "Refill 20L".into(),
            price: Amount::from(60),
            liters: Amount::from(20),
        }
    }

    #[test]
    fn zero_price_is_rejected() {
        let mut p = product();
        p.apply(ProductPatch {
            price: Some(Amount::ZERO),
            ..Default::default()
        });
        let (field, message) = p.check().unwrap_err();
        assert_eq!(field, "price");
        assert_eq!(message, "Price must be greater than zero.");
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let mut p = product();
        p.apply(ProductPatch {
            name: Some("Refill 5L".into()),
            ..Default::default()
        });
        assert_eq!(p.name, "Refill 5L");
        assert_eq!(p.price, Amount::from(60));
        assert!(p.check().is_ok());
    }
}
