use domain_catalog::{
    CatalogRepository, CategoryChanges, NewProduct, Product, ProductPatch, ProductSortField,
    SortDirection,
};
use rust_decimal::Decimal;
use validator::Validate;

use crate::command::{Action, CommandOutcome, CommandReply, DataMap};
use crate::confirm::{self, Confirmation};
use crate::error::{AssistantError, AssistantResult};
use crate::fields::{extract_text, format_currency, normalize_metrics, parse_bool, parse_decimal, parse_int};
use crate::ordering::extract_ordering;
use crate::resolve;
use crate::slug::{unique_slug, SlugScope};

const NAME_KEYS: &[&str] = &["name", "product_name", "title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "detail", "notes"];
const SLUG_KEYS: &[&str] = &["slug", "product_slug"];

const ORDER_FIELDS: &[(&str, &[ProductSortField])] = &[
    ("name", &[ProductSortField::Name, ProductSortField::Price]),
    ("nombre", &[ProductSortField::Name, ProductSortField::Price]),
    ("price", &[ProductSortField::Price, ProductSortField::Name]),
    ("precio", &[ProductSortField::Price, ProductSortField::Name]),
];

pub async fn list_products(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let order = extract_ordering(data, "name", SortDirection::Asc, ORDER_FIELDS)?;
    let products = repo.list_products(&order).await?;
    if products.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Products listed.",
            "No products are registered.",
        )));
    }

    let lines: Vec<String> = products.iter().map(describe_product).collect();

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Products listed.",
        lines.join("\n"),
    )))
}

fn describe_product(product: &Product) -> String {
    let categories = if product.categories.is_empty() {
        "no categories".to_string()
    } else {
        product.category_names().join(", ")
    };
    let status = if product.is_active { "active" } else { "inactive" };
    format!(
        "- id={}, name={}, slug={}, price={}, stock={}, status={}, categories={}",
        product.id, product.name, product.slug, product.price, product.stock, status, categories
    )
}

pub async fn create_product(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let name = extract_text(data, &["name", "product_name", "title", "label"], None, true, "name")?;
    let description = extract_text(data, DESCRIPTION_KEYS, Some(""), false, "description")?;

    if !data.contains_key("price") {
        return Err(AssistantError::Validation(
            "You must provide the product price to register it.".to_string(),
        ));
    }
    if !data.contains_key("stock") {
        return Err(AssistantError::Validation(
            "You must provide the available product stock to register it.".to_string(),
        ));
    }

    let price = parse_decimal(data.get("price"), None, "price")?;
    let stock = parse_int(data.get("stock"), None, "stock")?;
    if price < Decimal::ZERO {
        return Err(AssistantError::Validation(
            "The product price cannot be negative.".to_string(),
        ));
    }
    if stock < 0 {
        return Err(AssistantError::Validation(
            "The product stock cannot be negative.".to_string(),
        ));
    }
    let stock = i32::try_from(stock)
        .map_err(|_| AssistantError::Validation("Invalid integer value for 'stock'.".to_string()))?;

    let is_active = parse_bool(data.get("is_active"), Some(true))?;
    let raw_slug = extract_text(data, SLUG_KEYS, Some(&name), false, "slug")?;
    let slug = unique_slug(repo, SlugScope::Product, &raw_slug, None).await?;

    let categories = resolve::parse_category_list(repo, data.get("categories")).await?;
    let category_count = categories.len();

    let input = NewProduct {
        name,
        slug,
        description,
        price,
        stock,
        is_active,
        category_ids: categories.into_iter().map(|c| c.id).collect(),
    };
    input
        .validate()
        .map_err(|err| AssistantError::Validation(err.to_string()))?;
    let product = repo.insert_product(input).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Product created.",
        format!(
            "Product {} (id={}, slug={}) created with {} categories.",
            product.name, product.id, product.slug, category_count
        ),
    )))
}

pub async fn update_product(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let product = resolve::resolve_product(repo, data).await?;

    let mut patch = ProductPatch::default();
    let mut fields_updated: Vec<&str> = Vec::new();

    if NAME_KEYS.iter().any(|k| data.contains_key(*k)) {
        patch.name = Some(extract_text(data, NAME_KEYS, None, true, "name")?);
        fields_updated.push("name");
    }

    if DESCRIPTION_KEYS.iter().any(|k| data.contains_key(*k)) {
        patch.description = Some(extract_text(data, DESCRIPTION_KEYS, Some(""), false, "description")?);
        fields_updated.push("description");
    }

    if data.contains_key("price") {
        let price = parse_decimal(data.get("price"), None, "price")?;
        if price < Decimal::ZERO {
            return Err(AssistantError::Validation(
                "The product price cannot be negative.".to_string(),
            ));
        }
        patch.price = Some(price);
        fields_updated.push("price");
    }

    if data.contains_key("stock") {
        let stock = parse_int(data.get("stock"), None, "stock")?;
        if stock < 0 {
            return Err(AssistantError::Validation(
                "The product stock cannot be negative.".to_string(),
            ));
        }
        patch.stock = Some(i32::try_from(stock).map_err(|_| {
            AssistantError::Validation("Invalid integer value for 'stock'.".to_string())
        })?);
        fields_updated.push("stock");
    }

    if data.contains_key("is_active") {
        patch.is_active = Some(parse_bool(data.get("is_active"), None)?);
        fields_updated.push("status");
    }

    if SLUG_KEYS.iter().any(|k| data.contains_key(*k)) {
        let raw_slug = extract_text(data, SLUG_KEYS, Some(&product.name), false, "slug")?;
        patch.slug =
            Some(unique_slug(repo, SlugScope::Product, &raw_slug, Some(product.id)).await?);
        fields_updated.push("slug");
    }

    let replacement = if data.contains_key("categories") {
        Some(resolve::parse_category_list(repo, data.get("categories")).await?)
    } else {
        None
    };
    let added = if data.contains_key("assign_categories") {
        resolve::parse_category_list(repo, data.get("assign_categories")).await?
    } else {
        Vec::new()
    };
    let removed = if data.contains_key("remove_categories") {
        resolve::parse_category_list(repo, data.get("remove_categories")).await?
    } else {
        Vec::new()
    };

    let changes = CategoryChanges {
        replace: replacement
            .as_ref()
            .map(|cats| cats.iter().map(|c| c.id).collect()),
        add: added.iter().map(|c| c.id).collect(),
        remove: removed.iter().map(|c| c.id).collect(),
    };

    let updated = repo.update_product(product.id, patch, changes).await?;

    let parts = if fields_updated.is_empty() {
        "no simple field changes".to_string()
    } else {
        fields_updated.join(", ")
    };
    let mut answer_lines = vec![
        format!("Product {} (id={}) updated.", updated.name, updated.id),
        format!("Fields: {}.", parts),
    ];
    if replacement.is_some() {
        let names = updated.category_names();
        answer_lines.push(format!(
            "Categories now assigned: {}.",
            if names.is_empty() {
                "no categories".to_string()
            } else {
                names.join(", ")
            }
        ));
    }
    if !added.is_empty() {
        answer_lines.push(format!(
            "Categories added: {}.",
            added.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    if !removed.is_empty() {
        answer_lines.push(format!(
            "Categories removed: {}.",
            removed.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Product updated.",
        answer_lines.join("\n"),
    )))
}

pub async fn delete_product(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let product = resolve::resolve_product(repo, data).await?;

    // Both checks run before the confirmation prompt is even reached.
    if product.stock > 0 {
        return Err(AssistantError::Conflict(
            "The product cannot be deleted because its stock is greater than 0.".to_string(),
        ));
    }
    if repo.product_has_purchases(product.id).await? {
        return Err(AssistantError::Conflict(
            "The product cannot be deleted because it is associated with existing purchases."
                .to_string(),
        ));
    }

    let detail = format!("Please confirm the deletion of product '{}'.", product.name);
    let prompt = format!("Do you want to delete the product '{}'?", product.name);
    match confirm::check(Action::DeleteProduct, data, &detail, &prompt) {
        Confirmation::Confirmed => {}
        Confirmation::Pending(pending) => return Ok(CommandOutcome::Pending(pending)),
        Confirmation::Cancelled(message) => return Ok(CommandOutcome::Cancelled { message }),
    }

    repo.delete_product(product.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Product deleted.",
        format!("Product {} (id={}) deleted.", product.name, product.id),
    )))
}

pub async fn product_metrics(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let metrics = normalize_metrics(data.get("metrics"), &["max_price", "min_price"]);
    for metric in &metrics {
        if metric != "max_price" && metric != "min_price" {
            return Err(AssistantError::Validation(format!(
                "The requested metric '{}' is not valid for products.",
                metric
            )));
        }
    }

    let products = repo.list_products(&[]).await?;
    if products.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Product metrics computed.",
            "There are no products registered to compute metrics.",
        )));
    }

    let lines: Vec<String> = metrics
        .iter()
        .filter_map(|metric| {
            let (label, winner) = match metric.as_str() {
                "max_price" => (
                    "Product with the highest price",
                    select_by_price(&products, true),
                ),
                "min_price" => (
                    "Product with the lowest price",
                    select_by_price(&products, false),
                ),
                _ => return None,
            };
            winner.map(|product| {
                format!(
                    "{}: {} (price {}, stock {})",
                    label,
                    product.name,
                    format_currency(product.price),
                    product.stock
                )
            })
        })
        .collect();

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Product metrics computed.",
        lines.join("\n"),
    )))
}

// Tie-break by name ascending in both directions.
fn select_by_price(products: &[Product], highest: bool) -> Option<&Product> {
    products.iter().min_by(|a, b| {
        let price_order = if highest {
            b.price.cmp(&a.price)
        } else {
            a.price.cmp(&b.price)
        };
        price_order.then_with(|| a.name.cmp(&b.name))
    })
}
