use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A catalog category. Products relate many-to-many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// URL-safe unique identifier
    pub slug: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category paired with the names of its assigned products,
/// as rendered by listings and the LLM inventory snapshot.
#[derive(Debug, Clone)]
pub struct CategoryWithProducts {
    pub category: Category,
    pub product_names: Vec<String>,
}

/// A sellable product with its categories eagerly loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    /// Assigned categories, ordered by name
    pub categories: Vec<Category>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }
}

/// One line of a recorded purchase. `unit_price` is frozen at purchase
/// time and deliberately decoupled from the product's current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PurchaseLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A recorded purchase with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub total_price: Decimal,
    pub lines: Vec<PurchaseLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity as i64).sum()
    }
}

/// Input for creating a category. The slug must already be unique;
/// slug derivation happens upstream.
#[derive(Debug, Clone, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 140))]
    pub slug: String,
    pub description: String,
    pub is_active: bool,
}

/// Partial update for a category. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
    }
}

/// Input for creating a product, including its initial category set.
#[derive(Debug, Clone, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 220))]
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub category_ids: Vec<i64>,
}

/// Partial update for a product's scalar fields.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Category membership changes applied alongside a product update.
/// Application order is replace, then add, then remove.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    /// Wholesale replacement of the category set
    pub replace: Option<Vec<i64>>,
    pub add: Vec<i64>,
    pub remove: Vec<i64>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        self.replace.is_none() && self.add.is_empty() && self.remove.is_empty()
    }
}

/// One requested line of a new purchase.
#[derive(Debug, Clone)]
pub struct PurchaseLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Purchase listing filters; all present filters compose with AND.
#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortField {
    Name,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseSortField {
    Id,
    CreatedAt,
    TotalPrice,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_line_total_multiplies_frozen_unit_price() {
        let line = PurchaseLine {
            id: 1,
            product_id: 7,
            product_name: "Coffee".to_string(),
            quantity: 2,
            unit_price: Decimal::from_str("3.50").unwrap(),
        };
        assert_eq!(line.line_total(), Decimal::from_str("7.00").unwrap());
    }

    #[test]
    fn test_total_items_sums_quantities() {
        let purchase = Purchase {
            id: 1,
            total_price: Decimal::ZERO,
            lines: vec![
                PurchaseLine {
                    id: 1,
                    product_id: 1,
                    product_name: "A".to_string(),
                    quantity: 2,
                    unit_price: Decimal::ONE,
                },
                PurchaseLine {
                    id: 2,
                    product_id: 2,
                    product_name: "B".to_string(),
                    quantity: 3,
                    unit_price: Decimal::ONE,
                },
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(purchase.total_items(), 5);
    }
}
