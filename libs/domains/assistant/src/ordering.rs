//! Logical sort-key resolution against per-operation whitelists.

use domain_catalog::SortDirection;

use crate::command::DataMap;
use crate::error::{AssistantError, AssistantResult};
use crate::fields::extract_text;

/// Resolve the caller's sort key and direction against a whitelist of
/// logical names (including natural-language synonyms), producing the
/// typed (field, direction) pairs the repository understands.
pub fn extract_ordering<F: Copy>(
    data: &DataMap,
    default_key: &str,
    default_direction: SortDirection,
    allowed: &[(&str, &[F])],
) -> AssistantResult<Vec<(F, SortDirection)>> {
    let order_key = extract_text(data, &["order_by", "order"], Some(default_key), false, "order")?
        .to_lowercase();
    let order_key = if order_key.is_empty() {
        default_key.to_string()
    } else {
        order_key
    };

    let default_token = match default_direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    };
    let direction_token = extract_text(
        data,
        &["direction", "order_direction", "sort"],
        Some(default_token),
        false,
        "direction",
    )?
    .to_lowercase();
    let direction = match direction_token.as_str() {
        "asc" | "ascendente" | "ascending" => SortDirection::Asc,
        "desc" | "descendente" | "descending" => SortDirection::Desc,
        _ => {
            return Err(AssistantError::Validation(
                "The sort direction is not valid. Use 'asc' or 'desc'.".to_string(),
            ));
        }
    };

    let fields = allowed
        .iter()
        .find(|(key, _)| *key == order_key)
        .map(|(_, fields)| *fields)
        .ok_or_else(|| {
            let mut keys: Vec<&str> = allowed.iter().map(|(key, _)| *key).collect();
            keys.sort_unstable();
            AssistantError::Validation(format!(
                "The sort field '{}' is not valid. Allowed options: {}.",
                order_key,
                keys.join(", ")
            ))
        })?;

    Ok(fields.iter().map(|field| (*field, direction)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_catalog::ProductSortField;
    use serde_json::json;

    fn data(value: serde_json::Value) -> DataMap {
        serde_json::from_value(value).unwrap()
    }

    const PRODUCT_FIELDS: &[(&str, &[ProductSortField])] = &[
        ("name", &[ProductSortField::Name, ProductSortField::Price]),
        ("nombre", &[ProductSortField::Name, ProductSortField::Price]),
        ("price", &[ProductSortField::Price, ProductSortField::Name]),
        ("precio", &[ProductSortField::Price, ProductSortField::Name]),
    ];

    #[test]
    fn test_resolves_synonyms_and_direction() {
        let spec = extract_ordering(
            &data(json!({"order_by": "Precio", "direction": "descendente"})),
            "name",
            SortDirection::Asc,
            PRODUCT_FIELDS,
        )
        .unwrap();
        assert_eq!(
            spec,
            vec![
                (ProductSortField::Price, SortDirection::Desc),
                (ProductSortField::Name, SortDirection::Desc),
            ]
        );
    }

    #[test]
    fn test_defaults_apply_when_absent() {
        let spec = extract_ordering(
            &data(json!({})),
            "name",
            SortDirection::Asc,
            PRODUCT_FIELDS,
        )
        .unwrap();
        assert_eq!(spec[0], (ProductSortField::Name, SortDirection::Asc));
    }

    #[test]
    fn test_unknown_key_lists_options() {
        let err = extract_ordering(
            &data(json!({"order_by": "stock"})),
            "name",
            SortDirection::Asc,
            PRODUCT_FIELDS,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'stock'"));
        assert!(message.contains("name, nombre, precio, price"));
    }

    #[test]
    fn test_unknown_direction_fails() {
        let err = extract_ordering(
            &data(json!({"direction": "sideways"})),
            "name",
            SortDirection::Asc,
            PRODUCT_FIELDS,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'asc' or 'desc'"));
    }
}
