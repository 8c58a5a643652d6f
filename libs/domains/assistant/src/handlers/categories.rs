use domain_catalog::{CatalogRepository, CategoryPatch, NewCategory};
use validator::Validate;

use crate::command::{
    Action, Command, CommandOutcome, CommandReply, DataMap, PendingActionSignal, Requirement,
};
use crate::confirm::{self, Confirmation};
use crate::error::{AssistantError, AssistantResult};
use crate::fields::{extract_text, parse_bool};
use crate::resolve;
use crate::slug::{unique_slug, SlugScope};

const NAME_KEYS: &[&str] = &["name", "category_name", "title", "label"];
const DESCRIPTION_KEYS: &[&str] = &["description", "detail", "notes"];
const SLUG_KEYS: &[&str] = &["slug", "category_slug"];

pub async fn list_categories(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let include_products = parse_bool(data.get("include_products"), Some(true))?;

    let categories = repo.list_categories().await?;
    if categories.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Categories listed.",
            "No categories are registered.",
        )));
    }

    let lines: Vec<String> = categories
        .iter()
        .map(|entry| {
            let status = if entry.category.is_active {
                "active"
            } else {
                "inactive"
            };
            let mut line = format!(
                "- id={}, name={}, slug={}, status={}",
                entry.category.id, entry.category.name, entry.category.slug, status
            );
            if include_products {
                let products = if entry.product_names.is_empty() {
                    "none".to_string()
                } else {
                    entry.product_names.join(", ")
                };
                line.push_str(&format!(", products={}", products));
            }
            line
        })
        .collect();

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Categories listed.",
        lines.join("\n"),
    )))
}

pub async fn create_category(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let name_keys = ["name", "category_name", "title", "label", "category"];
    let name = match extract_text(data, &name_keys, None, true, "name") {
        Ok(name) => name,
        Err(_) => {
            // Suspend instead of failing so the caller can supply the
            // name in the next turn.
            let mut pending_data = data.clone();
            pending_data.remove("confirm");
            pending_data.remove("confirmation");
            return Ok(CommandOutcome::Pending(PendingActionSignal {
                detail: "The category name is missing.".to_string(),
                command: Command {
                    action: Action::CreateCategory,
                    data: pending_data,
                },
                requirements: vec![Requirement {
                    field: "name".to_string(),
                    label: "Category name".to_string(),
                    prompt: "Provide the name of the category to create.".to_string(),
                }],
                confirmation_message: None,
            }));
        }
    };

    let description = extract_text(data, DESCRIPTION_KEYS, Some(""), false, "description")?;
    let is_active = parse_bool(data.get("is_active"), Some(true))?;
    let raw_slug = extract_text(data, SLUG_KEYS, Some(&name), false, "slug")?;
    let slug = unique_slug(repo, SlugScope::Category, &raw_slug, None).await?;

    let detail = format!("Please confirm the creation of category '{}'.", name);
    let prompt = format!("Do you want to create the category '{}'?", name);
    match confirm::check(Action::CreateCategory, data, &detail, &prompt) {
        Confirmation::Confirmed => {}
        Confirmation::Pending(pending) => return Ok(CommandOutcome::Pending(pending)),
        Confirmation::Cancelled(message) => return Ok(CommandOutcome::Cancelled { message }),
    }

    let input = NewCategory {
        name,
        slug,
        description,
        is_active,
    };
    input
        .validate()
        .map_err(|err| AssistantError::Validation(err.to_string()))?;
    let category = repo.insert_category(input).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category created.",
        format!(
            "Category {} (id={}, slug={}) created successfully.",
            category.name, category.id, category.slug
        ),
    )))
}

pub async fn update_category(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let category = resolve::resolve_category(repo, data).await?;

    let mut patch = CategoryPatch::default();
    let mut updated_fields: Vec<&str> = Vec::new();

    if NAME_KEYS.iter().any(|k| data.contains_key(*k)) {
        let new_name = extract_text(data, NAME_KEYS, None, true, "name")?;
        if new_name != category.name {
            patch.name = Some(new_name);
            updated_fields.push("name");
        }
    }

    if DESCRIPTION_KEYS.iter().any(|k| data.contains_key(*k)) {
        let new_description = extract_text(data, DESCRIPTION_KEYS, Some(""), false, "description")?;
        if new_description != category.description {
            patch.description = Some(new_description);
            updated_fields.push("description");
        }
    }

    if data.contains_key("is_active") {
        let new_status = parse_bool(data.get("is_active"), None)?;
        if new_status != category.is_active {
            patch.is_active = Some(new_status);
            updated_fields.push("status");
        }
    }

    if SLUG_KEYS.iter().any(|k| data.contains_key(*k)) {
        let raw_slug = extract_text(data, SLUG_KEYS, None, true, "slug")?;
        let new_slug =
            unique_slug(repo, SlugScope::Category, &raw_slug, Some(category.id)).await?;
        if new_slug != category.slug {
            patch.slug = Some(new_slug);
            updated_fields.push("slug");
        }
    } else if parse_bool(data.get("refresh_slug"), Some(false))? {
        // Re-derive the slug from the (possibly updated) name.
        let source = patch.name.as_deref().unwrap_or(&category.name);
        let auto_slug = unique_slug(repo, SlugScope::Category, source, Some(category.id)).await?;
        if auto_slug != category.slug {
            patch.slug = Some(auto_slug);
            updated_fields.push("slug");
        }
    }

    if updated_fields.is_empty() {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Category unchanged.",
            "No changes were detected for the category.",
        )));
    }

    let updated = repo.update_category(category.id, patch).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category updated.",
        format!(
            "Category {} (id={}) updated. Modified fields: {}.",
            updated.name,
            updated.id,
            updated_fields.join(", ")
        ),
    )))
}

pub async fn delete_category(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let category = resolve::resolve_category(repo, data).await?;

    let detail = format!(
        "Please confirm the deletion of category '{}'.",
        category.name
    );
    let prompt = format!("Do you want to delete the category '{}'?", category.name);
    match confirm::check(Action::DeleteCategory, data, &detail, &prompt) {
        Confirmation::Confirmed => {}
        Confirmation::Pending(pending) => return Ok(CommandOutcome::Pending(pending)),
        Confirmation::Cancelled(message) => return Ok(CommandOutcome::Cancelled { message }),
    }

    repo.delete_category(category.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category deleted.",
        format!(
            "Category {} (id={}) deleted successfully.",
            category.name, category.id
        ),
    )))
}

pub async fn assign_category(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let product = resolve::resolve_product(repo, data).await?;
    let category = resolve::resolve_category(repo, data).await?;
    repo.assign_category(product.id, category.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category assigned.",
        format!(
            "Category {} assigned to product {}.",
            category.name, product.name
        ),
    )))
}

pub async fn assign_category_to_all_products(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let category = resolve::resolve_category(repo, data).await?;
    let count = repo.assign_category_to_all(category.id).await?;
    if count == 0 {
        return Ok(CommandOutcome::Completed(CommandReply::new(
            "Category assigned to all products.",
            "There are no products to assign the category to.",
        )));
    }

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category assigned to all products.",
        format!("Category {} assigned to {} product(s).", category.name, count),
    )))
}

pub async fn unassign_category(
    repo: &dyn CatalogRepository,
    data: &mut DataMap,
) -> AssistantResult<CommandOutcome> {
    let product = resolve::resolve_product(repo, data).await?;
    let category = resolve::resolve_category(repo, data).await?;
    repo.unassign_category(product.id, category.id).await?;

    Ok(CommandOutcome::Completed(CommandReply::new(
        "Category unassigned.",
        format!(
            "Category {} removed from product {}.",
            category.name, product.name
        ),
    )))
}
