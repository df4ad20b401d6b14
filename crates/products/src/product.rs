use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{Amount, BusinessId, DomainError, DomainResult, Quantity};
use stockflow_parties::CounterpartyId;

stockflow_core::domain_id!(ProductId, "Product identifier (scoped by the owning business).");

/// Unit of measure used when none is given.
pub const DEFAULT_UNIT: &str = "m";

/// Catalog record for a stocked product.
///
/// Identity (`id`, `business_id`) never changes; `name`, `price` and
/// `reorder_level` are editable catalog fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub business_id: BusinessId,
    pub name: String,
    pub sku: Option<String>,
    pub unit: String,
    /// List price in smallest currency unit.
    pub price: Amount,
    /// Stock level at or below which a LOW_STOCK advisory fires.
    pub reorder_level: Quantity,
    pub counterparty_id: Option<CounterpartyId>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub price: Amount,
    #[serde(default)]
    pub reorder_level: Quantity,
    #[serde(default)]
    pub counterparty_id: Option<CounterpartyId>,
}

/// Partial catalog update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Amount>,
    pub reorder_level: Option<Quantity>,
}

impl Product {
    pub fn register(
        business_id: BusinessId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = validate_name(&input.name)?;
        validate_price(input.price)?;
        validate_reorder_level(input.reorder_level)?;

        let unit = input
            .unit
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());

        Ok(Self {
            id: ProductId::generate(),
            business_id,
            name,
            sku: input.sku.filter(|s| !s.trim().is_empty()),
            unit,
            price: input.price,
            reorder_level: input.reorder_level,
            counterparty_id: input.counterparty_id,
            created_at: now,
        })
    }

    /// Apply a catalog update. Validation happens before any field changes.
    pub fn update(&mut self, update: ProductUpdate) -> DomainResult<()> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        if let Some(level) = update.reorder_level {
            validate_reorder_level(level)?;
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(level) = update.reorder_level {
            self.reorder_level = level;
        }
        Ok(())
    }

    /// Case-insensitive substring match on the product name.
    pub fn name_matches(&self, filter: &str) -> bool {
        self.name.to_lowercase().contains(&filter.trim().to_lowercase())
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_price(price: Amount) -> DomainResult<()> {
    if price < 0 {
        return Err(DomainError::validation("price cannot be negative"));
    }
    Ok(())
}

fn validate_reorder_level(level: Quantity) -> DomainResult<()> {
    if level < 0 {
        return Err(DomainError::invalid_quantity("reorder_level cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            sku: None,
            unit: None,
            price: 1500,
            reorder_level: 10,
            counterparty_id: None,
        }
    }

    #[test]
    fn register_trims_name_and_defaults_unit() {
        let p = Product::register(BusinessId::new(), new_product("  Cotton Roll "), Utc::now())
            .unwrap();
        assert_eq!(p.name, "Cotton Roll");
        assert_eq!(p.unit, DEFAULT_UNIT);
        assert_eq!(p.reorder_level, 10);
    }

    #[test]
    fn register_rejects_empty_name() {
        let err = Product::register(BusinessId::new(), new_product("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn failed_update_leaves_product_unchanged() {
        let mut p =
            Product::register(BusinessId::new(), new_product("Denim"), Utc::now()).unwrap();
        let before = p.clone();

        let err = p
            .update(ProductUpdate {
                name: Some("Denim Blue".to_string()),
                price: Some(-1),
                reorder_level: None,
            })
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let p = Product::register(BusinessId::new(), new_product("Silk Thread"), Utc::now())
            .unwrap();
        assert!(p.name_matches("silk"));
        assert!(p.name_matches(" THREAD "));
        assert!(!p.name_matches("wool"));
    }
}
