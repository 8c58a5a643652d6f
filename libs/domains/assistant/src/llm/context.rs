//! Inventory snapshot rendered into LLM prompts so the model grounds
//! its output in real catalog state.

use domain_catalog::{
    CatalogRepository, PurchaseFilter, PurchaseSortField, SortDirection,
};

use crate::error::AssistantResult;
use crate::fields::{format_currency, format_datetime};

/// Recent purchases included in the snapshot.
const PURCHASE_WINDOW: usize = 20;

/// Render the current catalog as plain text lines. Products and
/// categories are ordered by id so the model sees stable identifiers.
pub async fn inventory_snapshot(repo: &dyn CatalogRepository) -> AssistantResult<String> {
    let mut sections = Vec::new();

    let mut products = repo.list_products(&[]).await?;
    products.sort_by_key(|p| p.id);
    if products.is_empty() {
        sections.push("Current products: none".to_string());
    } else {
        let mut lines = vec!["Current products:".to_string()];
        for product in &products {
            let categories = if product.categories.is_empty() {
                "no categories".to_string()
            } else {
                product.category_names().join(", ")
            };
            lines.push(format!(
                "- id={}, name={}, slug={}, price={}, stock={}, categories={}",
                product.id,
                product.name,
                product.slug,
                format_currency(product.price),
                product.stock,
                categories
            ));
        }
        sections.push(lines.join("\n"));
    }

    let mut categories = repo.list_categories().await?;
    categories.sort_by_key(|entry| entry.category.id);
    if categories.is_empty() {
        sections.push("Current categories: none".to_string());
    } else {
        let mut lines = vec!["Current categories:".to_string()];
        for entry in &categories {
            lines.push(format!(
                "- id={}, name={}, slug={}",
                entry.category.id, entry.category.name, entry.category.slug
            ));
        }
        sections.push(lines.join("\n"));
    }

    let purchases = repo
        .list_purchases(
            &PurchaseFilter::default(),
            &[(PurchaseSortField::CreatedAt, SortDirection::Desc)],
        )
        .await?;
    if purchases.is_empty() {
        sections.push("Recent purchases: none".to_string());
    } else {
        let mut lines = vec!["Recent purchases:".to_string()];
        for purchase in purchases.iter().take(PURCHASE_WINDOW) {
            lines.push(format!(
                "- id={}, total={}, items={}, date={}",
                purchase.id,
                format_currency(purchase.total_price),
                purchase.total_items(),
                format_datetime(purchase.created_at)
            ));
        }
        sections.push(lines.join("\n"));
    }

    Ok(sections.join("\n\n"))
}
