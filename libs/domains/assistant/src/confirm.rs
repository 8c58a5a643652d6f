//! Confirmation gate for destructive (and creation) commands.
//!
//! State machine: Unconfirmed -> AwaitingConfirmation ->
//! {Confirmed -> Executed | Cancelled}. A missing or unparsable
//! `confirm` value re-asks cleanly instead of defaulting.

use serde_json::Value;

use crate::command::{Action, Command, DataMap, PendingActionSignal};
use crate::fields::parse_bool;

/// Result of checking the confirmation fields on a command.
pub enum Confirmation {
    /// `confirm=true` is pinned onto the data bag; proceed.
    Confirmed,
    /// No usable confirmation yet; suspend with a prompt.
    Pending(PendingActionSignal),
    /// Explicit decline; surface as a neutral cancellation.
    Cancelled(String),
}

/// Inspect `confirm`/`confirmation` in the data bag. On a pending
/// outcome the confirmation fields are stripped from the resume
/// payload so the re-ask starts clean.
pub fn check(action: Action, data: &mut DataMap, detail: &str, prompt: &str) -> Confirmation {
    let value: Option<Value> = data
        .get("confirm")
        .filter(|v| !v.is_null())
        .or_else(|| data.get("confirmation").filter(|v| !v.is_null()))
        .cloned();

    let Some(value) = value else {
        return Confirmation::Pending(suspend(action, data, detail, prompt));
    };

    match parse_bool(Some(&value), None) {
        Err(_) => Confirmation::Pending(suspend(action, data, detail, prompt)),
        Ok(false) => {
            Confirmation::Cancelled("The operation was cancelled by the user.".to_string())
        }
        Ok(true) => {
            data.insert("confirm".to_string(), Value::Bool(true));
            data.remove("confirmation");
            Confirmation::Confirmed
        }
    }
}

fn suspend(action: Action, data: &DataMap, detail: &str, prompt: &str) -> PendingActionSignal {
    let mut pending_data = data.clone();
    pending_data.remove("confirm");
    pending_data.remove("confirmation");
    PendingActionSignal {
        detail: detail.to_string(),
        command: Command {
            action,
            data: pending_data,
        },
        requirements: Vec::new(),
        confirmation_message: Some(prompt.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: serde_json::Value) -> DataMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_confirm_suspends_with_stripped_fields() {
        let mut bag = data(json!({"purchase_id": 5, "confirmation": null}));
        match check(Action::DeletePurchase, &mut bag, "detail", "Delete it?") {
            Confirmation::Pending(pending) => {
                assert_eq!(pending.confirmation_message.as_deref(), Some("Delete it?"));
                assert!(!pending.command.data.contains_key("confirmation"));
                assert_eq!(pending.command.data.get("purchase_id"), Some(&json!(5)));
            }
            _ => panic!("expected pending"),
        }
    }

    #[test]
    fn test_unparsable_confirm_reasks() {
        let mut bag = data(json!({"confirm": "perhaps"}));
        assert!(matches!(
            check(Action::DeleteProduct, &mut bag, "d", "p"),
            Confirmation::Pending(_)
        ));
    }

    #[test]
    fn test_false_cancels_and_true_pins() {
        let mut bag = data(json!({"confirm": "no"}));
        assert!(matches!(
            check(Action::DeleteProduct, &mut bag, "d", "p"),
            Confirmation::Cancelled(_)
        ));

        let mut bag = data(json!({"confirmation": "si"}));
        assert!(matches!(
            check(Action::DeleteProduct, &mut bag, "d", "p"),
            Confirmation::Confirmed
        ));
        assert_eq!(bag.get("confirm"), Some(&json!(true)));
        assert!(!bag.contains_key("confirmation"));
    }
}
