//! Field parsers shared by every handler: booleans, decimals,
//! integers, trimmed text, metric lists, date boundaries, and the
//! fixed currency/timestamp rendering.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::command::DataMap;
use crate::error::{AssistantError, AssistantResult};

const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "si", "on"];
const FALSE_TOKENS: &[&str] = &["false", "0", "no", "off"];

/// Parse a boolean from JSON input. Accepts native booleans, numeric
/// truthiness, and a fixed token vocabulary.
pub fn parse_bool(value: Option<&Value>, default: Option<bool>) -> AssistantResult<bool> {
    let value = match value {
        None | Some(Value::Null) => {
            return default.ok_or_else(|| {
                AssistantError::Validation("A boolean value was expected.".to_string())
            });
        }
        Some(value) => value,
    };
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            let text = s.trim().to_lowercase();
            if TRUE_TOKENS.contains(&text.as_str()) {
                Ok(true)
            } else if FALSE_TOKENS.contains(&text.as_str()) {
                Ok(false)
            } else {
                Err(AssistantError::Validation(format!(
                    "Could not interpret the boolean value: '{}'.",
                    s
                )))
            }
        }
        other => Err(AssistantError::Validation(format!(
            "Could not interpret the boolean value: {}.",
            other
        ))),
    }
}

/// Parse a decimal, converting losslessly from a string representation.
pub fn parse_decimal(
    value: Option<&Value>,
    default: Option<Decimal>,
    field: &str,
) -> AssistantResult<Decimal> {
    let value = match value {
        None | Some(Value::Null) => {
            return default.ok_or_else(|| {
                AssistantError::Validation(format!("The field '{}' is required.", field))
            });
        }
        Some(value) => value,
    };
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    Decimal::from_str(&text)
        .map_err(|_| AssistantError::Validation(format!("Invalid value for '{}'.", field)))
}

pub fn parse_int(value: Option<&Value>, default: Option<i64>, field: &str) -> AssistantResult<i64> {
    let value = match value {
        None | Some(Value::Null) => {
            return default.ok_or_else(|| {
                AssistantError::Validation(format!("The field '{}' is required.", field))
            });
        }
        Some(value) => value,
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        AssistantError::Validation(format!("Invalid integer value for '{}'.", field))
    })
}

/// Extract a trimmed text value from the first matching key. Empty or
/// null values are skipped; empty-after-trim counts as absent.
pub fn extract_text(
    data: &DataMap,
    keys: &[&str],
    default: Option<&str>,
    required: bool,
    label: &str,
) -> AssistantResult<String> {
    for key in keys {
        let Some(value) = data.get(*key) else {
            continue;
        };
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        if !text.is_empty() {
            return Ok(text);
        }
    }
    if let Some(default) = default {
        return Ok(default.to_string());
    }
    if required {
        return Err(AssistantError::Validation(format!(
            "The field '{}' is required for this command.",
            label
        )));
    }
    Ok(String::new())
}

/// Normalize a metric value or list into lowercase identifiers,
/// falling back to the supplied default set.
pub fn normalize_metrics(value: Option<&Value>, default: &[&str]) -> Vec<String> {
    let fallback = || default.iter().map(|m| m.to_lowercase()).collect::<Vec<_>>();
    let Some(value) = value else {
        return fallback();
    };
    let metrics: Vec<String> = match value {
        Value::Null => return fallback(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .map(|t| t.to_lowercase())
            .collect(),
        other => value_to_text(other)
            .map(|t| vec![t.to_lowercase()])
            .unwrap_or_default(),
    };
    if metrics.is_empty() {
        fallback()
    } else {
        metrics
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parse an ISO date or datetime. A bare date expands to start-of-day
/// or end-of-day depending on the boundary role; naive values are
/// interpreted as UTC.
pub fn parse_datetime_boundary(
    value: &Value,
    field: &str,
    is_end: bool,
) -> AssistantResult<DateTime<Utc>> {
    let text = value_to_text(value).unwrap_or_default();
    if text.is_empty() {
        return Err(AssistantError::Validation(format!(
            "The field '{}' must include a valid date.",
            field
        )));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        let boundary = if is_end {
            NaiveTime::from_hms_opt(23, 59, 59)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        };
        let boundary = boundary.ok_or_else(|| {
            AssistantError::Internal("Invalid day boundary time".to_string())
        })?;
        return Ok(Utc.from_utc_datetime(&date.and_time(boundary)));
    }

    Err(AssistantError::Validation(format!(
        "Could not interpret the date in '{}'. Use the YYYY-MM-DD format.",
        field
    )))
}

/// Two-decimal quantization with the currency suffix.
pub fn format_currency(value: Decimal) -> String {
    format!("{:.2} EUR", value)
}

pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bool_vocabulary() {
        for token in ["true", "1", "YES", "y", "Si", "on"] {
            assert!(parse_bool(Some(&json!(token)), None).unwrap(), "{token}");
        }
        for token in ["false", "0", "No", "off"] {
            assert!(!parse_bool(Some(&json!(token)), None).unwrap(), "{token}");
        }
        assert!(parse_bool(Some(&json!(true)), None).unwrap());
        assert!(parse_bool(Some(&json!(2)), None).unwrap());
        assert!(!parse_bool(Some(&json!(0)), None).unwrap());
        assert!(parse_bool(None, Some(true)).unwrap());
        assert!(parse_bool(None, None).is_err());
        assert!(parse_bool(Some(&json!("maybe")), None).is_err());
    }

    #[test]
    fn test_parse_decimal_from_string_is_lossless() {
        let parsed = parse_decimal(Some(&json!("9.99")), None, "price").unwrap();
        assert_eq!(parsed, Decimal::from_str("9.99").unwrap());
        assert!(parse_decimal(Some(&json!("cheap")), None, "price").is_err());
        assert!(parse_decimal(None, None, "price").is_err());
    }

    #[test]
    fn test_extract_text_trims_and_falls_through_keys() {
        let data: DataMap = serde_json::from_value(json!({
            "title": "  ",
            "label": " Snacks "
        }))
        .unwrap();
        let value = extract_text(&data, &["name", "title", "label"], None, true, "name").unwrap();
        assert_eq!(value, "Snacks");

        let empty: DataMap = DataMap::new();
        assert!(extract_text(&empty, &["name"], None, true, "name").is_err());
        assert_eq!(
            extract_text(&empty, &["name"], Some("fallback"), false, "name").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_normalize_metrics() {
        assert_eq!(
            normalize_metrics(None, &["max_price", "min_price"]),
            vec!["max_price", "min_price"]
        );
        assert_eq!(
            normalize_metrics(Some(&json!(["Max_Items", " min_items "])), &["max_price"]),
            vec!["max_items", "min_items"]
        );
        assert_eq!(
            normalize_metrics(Some(&json!("max_price")), &["min_price"]),
            vec!["max_price"]
        );
    }

    #[test]
    fn test_datetime_boundary_expands_bare_dates() {
        let start = parse_datetime_boundary(&json!("2024-01-01"), "start_date", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        let end = parse_datetime_boundary(&json!("2024-01-31"), "end_date", true).unwrap();
        assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59+00:00");
        let explicit =
            parse_datetime_boundary(&json!("2024-01-15T10:30:00"), "start_date", false).unwrap();
        assert_eq!(explicit.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert!(parse_datetime_boundary(&json!("soon"), "start_date", false).is_err());
    }

    #[test]
    fn test_format_currency_quantizes_to_two_decimals() {
        assert_eq!(format_currency(Decimal::from_str("7").unwrap()), "7.00 EUR");
        assert_eq!(format_currency(Decimal::from_str("9.9").unwrap()), "9.90 EUR");
    }
}
