//! URL-safe slug derivation with deterministic collision suffixes.

use domain_catalog::CatalogRepository;

use crate::error::AssistantResult;

/// Entity type whose slug namespace is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    Category,
    Product,
}

/// Normalize a raw string into a URL-safe slug: accents folded,
/// lowercased, runs of non-alphanumerics collapsed into single hyphens.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_hyphen = false;
    for ch in raw.chars().flat_map(fold_accent) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

fn fold_accent(ch: char) -> std::option::IntoIter<char> {
    let folded = match ch {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    };
    Some(folded).into_iter()
}

/// Derive a slug that no other record of the target type owns,
/// appending `-2`, `-3`, ... until the collision clears. Falls back to
/// a fixed placeholder when normalization yields nothing.
pub async fn unique_slug(
    repo: &dyn CatalogRepository,
    scope: SlugScope,
    raw: &str,
    exclude_id: Option<i64>,
) -> AssistantResult<String> {
    let base = {
        let normalized = slugify(raw);
        if normalized.is_empty() {
            "item".to_string()
        } else {
            normalized
        }
    };
    let mut slug = base.clone();
    let mut suffix = 1u32;
    loop {
        let taken = match scope {
            SlugScope::Category => repo.category_slug_exists(&slug, exclude_id).await?,
            SlugScope::Product => repo.product_slug_exists(&slug, exclude_id).await?,
        };
        if !taken {
            return Ok(slug);
        }
        suffix += 1;
        slug = format!("{}-{}", base, suffix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_catalog::{InMemoryCatalogRepository, NewCategory};

    #[test]
    fn test_slugify_normalizes() {
        assert_eq!(slugify("Café con Leche"), "cafe-con-leche");
        assert_eq!(slugify("  Snacks & Drinks!  "), "snacks-drinks");
        assert_eq!(slugify("¡¡¡"), "");
    }

    #[tokio::test]
    async fn test_unique_slug_appends_numeric_suffixes() {
        let repo = InMemoryCatalogRepository::new();
        for slug in ["drinks", "drinks-2"] {
            repo.insert_category(NewCategory {
                name: "Drinks".to_string(),
                slug: slug.to_string(),
                description: String::new(),
                is_active: true,
            })
            .await
            .unwrap();
        }

        let slug = unique_slug(&repo, SlugScope::Category, "Drinks", None)
            .await
            .unwrap();
        assert_eq!(slug, "drinks-3");

        let fallback = unique_slug(&repo, SlugScope::Product, "???", None)
            .await
            .unwrap();
        assert_eq!(fallback, "item");
    }
}
