use domain_catalog::{
    CatalogRepository, Purchase, PurchaseFilter, PurchaseLineRequest, PurchaseSortField,
    SortDirection,
};

use crate::command::{Action, CommandOutcome, CommandReply, DataMap};
use crate::confirm::{self, Confirmation};
use crate::error::{AssistantError, AssistantResult};
use crate::fields::{
    format_currency, format_datetime, normalize_metrics, parse_datetime_boundary, parse_decimal,
};
use crate::ordering::extract_ordering;
use crate::resolve;

const ORDER_FIELDS: &[(&str, &[PurchaseSortField])] = &[
    ("precio", &[PurchaseSortField::TotalPrice, PurchaseSortField::Id]),
    ("price", &[PurchaseSortField::TotalPrice, PurchaseSortField::Id]),
    ("total", &[PurchaseSortField::TotalPrice, PurchaseSortField::Id]),
    ("total_price", &[PurchaseSortField::TotalPrice, PurchaseSortField::Id]),
    ("nombre", &[PurchaseSortField::Id, PurchaseSortField::CreatedAt]),
    ("name", &[PurchaseSortField::Id, PurchaseSortField::CreatedAt]),
    ("id", &[PurchaseSortField::Id, PurchaseSortField::CreatedAt]),
    ("fecha", &[PurchaseSortField::CreatedAt, PurchaseSortField::Id]),
    ("created_at", &[PurchaseSortField::CreatedAt, PurchaseSortField::Id]),
];

const START_KEYS: &[&str] = &["start_date", "fecha_inicio", "from_date", "date_from"];
const END_KEYS: &[&str] = &["end_date", "fecha_fin", "to_date", "date_to"];
const MIN_PRICE_KEYS: &[&str] = &["min_price", "precio_minimo", "min_total"];
const MAX_PRICE_KEYS: &[&str] = &["max_price", "precio_maximo", "max_total"];
const PRODUCT_KEYS: &[&str] = &["product_id", "product_slug", "product_name"];

pub async fn list_purchases(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let order = extract_ordering(data, "created_at", SortDirection::Desc, ORDER_FIELDS)?;
    let filter = build_filter(repo, data).await?;

    let purchases = repo.list_purchases(&filter, &order).await?;
    if purchases.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Purchases listed.",
            "There are no purchases recorded at the moment.",
        )));
    }

    let lines: Vec<String> = purchases.iter().map(summarize_purchase).collect();

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Purchases listed.",
        lines.join("\n"),
    )))
}

async fn build_filter(
    repo: &dyn CatalogRepository,
    data: &DataMap,
) -> AssistantResult<PurchaseFilter> {
    let mut filter = PurchaseFilter::default();

    if let Some((key, value)) = first_present(data, START_KEYS) {
        filter.created_from = Some(parse_datetime_boundary(value, key, false)?);
    }
    if let Some((key, value)) = first_present(data, END_KEYS) {
        filter.created_to = Some(parse_datetime_boundary(value, key, true)?);
    }
    if let (Some(from), Some(to)) = (filter.created_from, filter.created_to) {
        if from > to {
            return Err(AssistantError::Validation(
                "The date range is invalid: the start date is after the end date.".to_string(),
            ));
        }
    }

    if PRODUCT_KEYS.iter().any(|k| has_non_empty(data, k)) {
        let product = resolve::resolve_product(repo, data).await?;
        filter.product_id = Some(product.id);
    }

    if let Some((key, value)) = first_present(data, MIN_PRICE_KEYS) {
        filter.min_total = Some(parse_decimal(Some(value), None, key)?);
    }
    if let Some((key, value)) = first_present(data, MAX_PRICE_KEYS) {
        filter.max_total = Some(parse_decimal(Some(value), None, key)?);
    }
    if let (Some(min), Some(max)) = (filter.min_total, filter.max_total) {
        if min > max {
            return Err(AssistantError::Validation(
                "The price range is invalid: the minimum exceeds the maximum.".to_string(),
            ));
        }
    }

    Ok(filter)
}

fn first_present<'a>(
    data: &'a DataMap,
    keys: &[&'static str],
) -> Option<(&'static str, &'a serde_json::Value)> {
    keys.iter().find_map(|key| {
        let value = data.get(*key)?;
        if value.is_null() {
            return None;
        }
        if let Some(text) = value.as_str() {
            if text.trim().is_empty() {
                return None;
            }
        }
        Some((*key, value))
    })
}

fn has_non_empty(data: &DataMap, key: &str) -> bool {
    match data.get(key) {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

pub async fn create_purchase(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let items = match data.get("items") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Array(items)) if items.is_empty() => None,
        Some(value) => Some(value.clone()),
    };
    let Some(items) = items else {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Additional information required.",
            "To register the purchase I need the products and the corresponding quantities.",
        )));
    };

    let lines = resolve::parse_purchase_lines(repo, &items).await?;
    if lines.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Additional information required.",
            "To register the purchase you must specify at least one product with its quantity.",
        )));
    }

    // Validate every line up front so no stock moves on failure.
    let mut requests = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.quantity <= 0 {
            return Err(AssistantError::Validation(format!(
                "The quantity for product {} must be greater than zero.",
                line.product.name
            )));
        }
        if i64::from(line.product.stock) < line.quantity {
            return Err(AssistantError::Conflict(format!(
                "Product {} does not have enough stock for {} unit(s).",
                line.product.name, line.quantity
            )));
        }
        let quantity = i32::try_from(line.quantity).map_err(|_| {
            AssistantError::Validation("Invalid integer value for 'quantity'.".to_string())
        })?;
        requests.push(PurchaseLineRequest {
            product_id: line.product.id,
            quantity,
        });
    }

    let purchase = repo.create_purchase(requests).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Purchase recorded.",
        format!(
            "The purchase was registered successfully. {}",
            summarize_purchase(&purchase)
        ),
    )))
}

pub async fn delete_purchase(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let purchase = resolve::resolve_purchase(repo, data).await?;

    let detail = format!("Please confirm the deletion of purchase #{}.", purchase.id);
    let prompt = format!("Do you want to delete purchase #{}?", purchase.id);
    match confirm::check(Action::DeletePurchase, data, &detail, &prompt) {
        Confirmation::Confirmed => {}
        Confirmation::Pending(pending) => return Ok(CommandOutcome::Pending(pending)),
        Confirmation::Cancelled(message) => return Ok(CommandOutcome::Cancelled { message }),
    }

    repo.delete_purchase(purchase.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Purchase deleted.",
        format!(
            "Purchase with identifier {} was deleted and the stock was restored.",
            purchase.id
        ),
    )))
}

pub async fn delete_purchases_by_product(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let product = resolve::resolve_product(repo, data).await?;

    let purchases = repo.purchases_for_product(product.id).await?;
    if purchases.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "No purchases associated.",
            format!("There are no purchases containing the product {}.", product.name),
        )));
    }

    let detail = format!(
        "Please confirm the deletion of {} purchase(s) associated with product '{}'.",
        purchases.len(),
        product.name
    );
    let prompt = format!(
        "Do you want to delete {} purchase(s) related to '{}'?",
        purchases.len(),
        product.name
    );
    match confirm::check(Action::DeletePurchasesByProduct, data, &detail, &prompt) {
        Confirmation::Confirmed => {}
        Confirmation::Pending(pending) => return Ok(CommandOutcome::Pending(pending)),
        Confirmation::Cancelled(message) => return Ok(CommandOutcome::Cancelled { message }),
    }

    let count = repo.delete_purchases_by_product(product.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Purchases deleted.",
        format!(
            "{} purchase(s) associated with product {} were deleted and the stock was restored.",
            count, product.name
        ),
    )))
}

pub async fn purchase_metrics(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let metrics = normalize_metrics(data.get("metrics"), &["max_price", "min_price"]);
    const ALLOWED: &[(&str, &str)] = &[
        ("max_price", "Purchase with the highest total"),
        ("min_price", "Purchase with the lowest total"),
        ("max_items", "Purchase with the most items"),
        ("min_items", "Purchase with the fewest items"),
    ];
    for metric in &metrics {
        if !ALLOWED.iter().any(|(name, _)| name == metric) {
            return Err(AssistantError::Validation(format!(
                "The requested metric '{}' is not valid for purchases.",
                metric
            )));
        }
    }

    let purchases = repo
        .list_purchases(&PurchaseFilter::default(), &[])
        .await?;
    if purchases.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Purchase metrics computed.",
            "There are no purchases recorded to compute metrics.",
        )));
    }

    let lines: Vec<String> = metrics
        .iter()
        .filter_map(|metric| {
            let label = ALLOWED
                .iter()
                .find(|(name, _)| name == metric)
                .map(|(_, label)| *label)?;
            let winner = select_by_metric(&purchases, metric)?;
            Some(format!(
                "{}: Purchase #{} with total {} and {} item(s).",
                label,
                winner.id,
                format_currency(winner.total_price),
                winner.total_items()
            ))
        })
        .collect();

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Purchase metrics computed.",
        lines.join("\n"),
    )))
}

fn select_by_metric<'a>(purchases: &'a [Purchase], metric: &str) -> Option<&'a Purchase> {
    match metric {
        // Highest total, most recent wins ties.
        "max_price" => purchases.iter().min_by(|a, b| {
            b.total_price
                .cmp(&a.total_price)
                .then_with(|| b.created_at.cmp(&a.created_at))
        }),
        "min_price" => purchases.iter().min_by(|a, b| {
            a.total_price
                .cmp(&b.total_price)
                .then_with(|| a.created_at.cmp(&b.created_at))
        }),
        // Most items, highest total wins ties.
        "max_items" => purchases.iter().min_by(|a, b| {
            b.total_items()
                .cmp(&a.total_items())
                .then_with(|| b.total_price.cmp(&a.total_price))
        }),
        "min_items" => purchases.iter().min_by(|a, b| {
            a.total_items()
                .cmp(&b.total_items())
                .then_with(|| a.total_price.cmp(&b.total_price))
        }),
        _ => None,
    }
}

/// Render the standard one-line purchase summary used by listings,
/// creation replies, and metrics.
pub fn summarize_purchase(purchase: &Purchase) -> String {
    let items_text = if purchase.lines.is_empty() {
        "no products recorded".to_string()
    } else {
        purchase
            .lines
            .iter()
            .map(|line| {
                format!(
                    "{} x{} ({})",
                    line.product_name,
                    line.quantity,
                    format_currency(line.line_total())
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Purchase #{} of {} with a total of {} and {} item(s). Details: {}.",
        purchase.id,
        format_datetime(purchase.created_at),
        format_currency(purchase.total_price),
        purchase.total_items(),
        items_text
    )
}
