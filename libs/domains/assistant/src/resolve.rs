//! Entity resolution from loosely-specified references: id, slug, or
//! case-insensitive name, in that priority order.

use domain_catalog::{CatalogRepository, Category, Product, Purchase};
use serde_json::Value;

use crate::command::DataMap;
use crate::error::{AssistantError, AssistantResult};
use crate::fields::parse_int;

fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Resolve a category from `category_id`, `category_slug`, or
/// `category_name` (case-insensitive exact match).
pub async fn resolve_category(
    repo: &dyn CatalogRepository,
    data: &DataMap,
) -> AssistantResult<Category> {
    if let Some(value) = data.get("category_id") {
        let id = value_as_id(value).ok_or_else(|| {
            AssistantError::Validation("The category id must be an integer.".to_string())
        })?;
        return repo
            .find_category_by_id(id)
            .await?
            .ok_or_else(|| {
                AssistantError::Resolution(format!("Category with id={} does not exist.", id))
            });
    }

    if let Some(value) = data.get("category_slug") {
        let slug = value_as_text(value);
        if slug.is_empty() {
            return Err(AssistantError::Validation(
                "The category slug cannot be empty.".to_string(),
            ));
        }
        return repo.find_category_by_slug(&slug).await?.ok_or_else(|| {
            AssistantError::Resolution(format!("Category with slug '{}' does not exist.", slug))
        });
    }

    if let Some(value) = data.get("category_name") {
        let name = value_as_text(value);
        if name.is_empty() {
            return Err(AssistantError::Validation(
                "The category name cannot be empty.".to_string(),
            ));
        }
        return category_by_name(repo, &name).await;
    }

    Err(AssistantError::Validation(
        "Not enough information was provided to identify the category.".to_string(),
    ))
}

async fn category_by_name(
    repo: &dyn CatalogRepository,
    name: &str,
) -> AssistantResult<Category> {
    let mut matches = repo.find_categories_by_name(name).await?;
    match matches.len() {
        0 => Err(AssistantError::Resolution(format!(
            "Category '{}' does not exist.",
            name
        ))),
        1 => Ok(matches.remove(0)),
        _ => Err(AssistantError::Resolution(format!(
            "Several categories share the name '{}'. Use the id or slug.",
            name
        ))),
    }
}

/// Resolve a bare category token: a purely numeric value is an id,
/// anything else is tried as slug, then as name.
pub async fn resolve_category_token(
    repo: &dyn CatalogRepository,
    token: &Value,
) -> AssistantResult<Category> {
    if let Some(id) = value_as_id(token) {
        return repo.find_category_by_id(id).await?.ok_or_else(|| {
            AssistantError::Resolution(format!("Category with id={} does not exist.", id))
        });
    }
    let text = value_as_text(token);
    if text.is_empty() {
        return Err(AssistantError::Validation(
            "Empty category identifier.".to_string(),
        ));
    }
    if let Some(category) = repo.find_category_by_slug(&text).await? {
        return Ok(category);
    }
    category_by_name(repo, &text).await
}

/// Resolve a product from `product_id`, `product_slug`, or
/// `product_name`, reporting ambiguity distinctly.
pub async fn resolve_product(
    repo: &dyn CatalogRepository,
    data: &DataMap,
) -> AssistantResult<Product> {
    if let Some(value) = data.get("product_id") {
        let id = value_as_id(value).ok_or_else(|| {
            AssistantError::Validation("The product id must be an integer.".to_string())
        })?;
        return repo.find_product_by_id(id).await?.ok_or_else(|| {
            AssistantError::Resolution(format!("Product with id={} does not exist.", id))
        });
    }

    if let Some(value) = data.get("product_slug") {
        let slug = value_as_text(value);
        if slug.is_empty() {
            return Err(AssistantError::Validation(
                "The product slug cannot be empty.".to_string(),
            ));
        }
        return repo.find_product_by_slug(&slug).await?.ok_or_else(|| {
            AssistantError::Resolution(format!("Product with slug '{}' does not exist.", slug))
        });
    }

    if let Some(value) = data.get("product_name") {
        let name = value_as_text(value);
        if name.is_empty() {
            return Err(AssistantError::Validation(
                "The product name cannot be empty.".to_string(),
            ));
        }
        let mut matches = repo.find_products_by_name(&name).await?;
        return match matches.len() {
            0 => Err(AssistantError::Resolution(format!(
                "Product '{}' does not exist.",
                name
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(AssistantError::Resolution(format!(
                "Several products share the name '{}'. Use the id or slug.",
                name
            ))),
        };
    }

    Err(AssistantError::Validation(
        "Not enough information was provided to identify the product.".to_string(),
    ))
}

/// Resolve a purchase from `purchase_id` (or `id`), which must be a
/// numeric identifier.
pub async fn resolve_purchase(
    repo: &dyn CatalogRepository,
    data: &DataMap,
) -> AssistantResult<Purchase> {
    let identifier = data.get("purchase_id").or_else(|| data.get("id"));
    let Some(identifier) = identifier else {
        return Err(AssistantError::Validation(
            "You must provide the numeric identifier of the purchase to manage.".to_string(),
        ));
    };
    let id = value_as_id(identifier).ok_or_else(|| {
        AssistantError::Validation("The purchase identifier must be an integer.".to_string())
    })?;
    repo.find_purchase(id).await?.ok_or_else(|| {
        AssistantError::Resolution(format!("No purchase with id={} exists.", id))
    })
}

/// Parse a category reference list: a comma-separated string, an array
/// of bare tokens, or an array of objects carrying id/slug/name keys.
pub async fn parse_category_list(
    repo: &dyn CatalogRepository,
    value: Option<&Value>,
) -> AssistantResult<Vec<Category>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(value) => value,
    };

    let tokens: Vec<Value> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Value::String(t.to_string()))
            .collect(),
        Value::Array(items) => items.clone(),
        _ => {
            return Err(AssistantError::Validation(
                "The 'categories' field must be a string or a list.".to_string(),
            ));
        }
    };

    let mut categories = Vec::with_capacity(tokens.len());
    for token in &tokens {
        let category = match token {
            Value::Object(entry) => {
                let mut candidate = DataMap::new();
                if let Some(id) = entry.get("category_id").or_else(|| entry.get("id")) {
                    candidate.insert("category_id".to_string(), id.clone());
                } else if let Some(slug) = entry.get("category_slug").or_else(|| entry.get("slug"))
                {
                    candidate.insert("category_slug".to_string(), slug.clone());
                } else if let Some(name) = entry.get("category_name").or_else(|| entry.get("name"))
                {
                    candidate.insert("category_name".to_string(), name.clone());
                } else {
                    return Err(AssistantError::Validation(
                        "Could not interpret one of the categories in the provided list."
                            .to_string(),
                    ));
                }
                resolve_category(repo, &candidate).await?
            }
            other => resolve_category_token(repo, other).await?,
        };
        categories.push(category);
    }
    Ok(categories)
}

/// One resolved line request of a new purchase.
pub struct ResolvedLine {
    pub product: Product,
    pub quantity: i64,
}

/// Parse the `items` list of a purchase: objects with a product
/// reference plus `quantity`, or `[id, quantity]` pairs.
pub async fn parse_purchase_lines(
    repo: &dyn CatalogRepository,
    value: &Value,
) -> AssistantResult<Vec<ResolvedLine>> {
    let Value::Array(entries) = value else {
        return Err(AssistantError::Validation(
            "The purchase items must be provided as a list of entries.".to_string(),
        ));
    };

    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        let (product, quantity) = match entry {
            Value::Object(item) => {
                let quantity = parse_int(item.get("quantity"), None, "quantity")?;
                let mut candidate = DataMap::new();
                if let Some(id) = item.get("product_id").or_else(|| item.get("id")) {
                    candidate.insert("product_id".to_string(), id.clone());
                } else if let Some(slug) = item.get("product_slug").or_else(|| item.get("slug")) {
                    candidate.insert("product_slug".to_string(), slug.clone());
                } else if let Some(name) = item.get("product_name").or_else(|| item.get("name")) {
                    candidate.insert("product_name".to_string(), name.clone());
                } else {
                    return Err(AssistantError::Validation(
                        "One of the items does not include a valid product identifier."
                            .to_string(),
                    ));
                }
                (resolve_product(repo, &candidate).await?, quantity)
            }
            Value::Array(pair) if pair.len() >= 2 => {
                let mut candidate = DataMap::new();
                candidate.insert("product_id".to_string(), pair[0].clone());
                let quantity = parse_int(Some(&pair[1]), None, "quantity")?;
                (resolve_product(repo, &candidate).await?, quantity)
            }
            _ => {
                return Err(AssistantError::Validation(
                    "Could not interpret one of the purchase items.".to_string(),
                ));
            }
        };
        lines.push(ResolvedLine { product, quantity });
    }
    Ok(lines)
}
