use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Untyped data bag attached to a command.
pub type DataMap = Map<String, Value>;

/// Closed set of supported catalog operations. Adding an action is a
/// single-point edit; dispatch matches exhaustively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListCategories,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    AssignCategory,
    AssignCategoryToAllProducts,
    UnassignCategory,
    ListProducts,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    ProductMetrics,
    ListPurchases,
    CreatePurchase,
    DeletePurchase,
    DeletePurchasesByProduct,
    PurchaseMetrics,
}

impl Action {
    /// Resolve a caller-supplied action name, case-insensitively.
    pub fn parse(name: &str) -> Option<Action> {
        name.trim().to_lowercase().parse().ok()
    }

    /// Whether the action mutates state. Only write actions may be
    /// auto-executed from an LLM interpretation; read-only
    /// interpretations of ambiguous free text are suppressed.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Action::ListCategories
                | Action::ListProducts
                | Action::ProductMetrics
                | Action::ListPurchases
                | Action::PurchaseMetrics
        )
    }
}

/// A command whose action has not been validated yet. This is what the
/// LLM interpreter and the JSON envelope parser produce; the action is
/// resolved to an [`Action`] at execution time so that unknown actions
/// in read-only interpretations can still fall through to Q&A.
#[derive(Debug, Clone)]
pub struct RawCommand {
    pub action: String,
    pub data: DataMap,
}

/// A validated command ready for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    pub data: DataMap,
}

/// Successful handler result: a short machine-log line and a longer
/// human-readable narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub detail: String,
    pub answer: String,
}

impl CommandReply {
    pub fn new(detail: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            answer: answer.into(),
        }
    }
}

/// One outstanding input the caller must still provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub field: String,
    pub label: String,
    pub prompt: String,
}

/// A suspended command awaiting confirmation or missing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingActionSignal {
    pub detail: String,
    /// The command to re-dispatch once the caller answers, with every
    /// already-known field merged in.
    pub command: Command,
    pub requirements: Vec<Requirement>,
    pub confirmation_message: Option<String>,
}

/// Outcome of dispatching one command or a command sequence. Pending
/// and cancelled are control flow, not failures.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Completed(CommandReply),
    Pending(PendingActionSignal),
    Cancelled { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_is_case_insensitive() {
        assert_eq!(Action::parse("Create_Product"), Some(Action::CreateProduct));
        assert_eq!(
            Action::parse("  assign_category_to_all_products "),
            Some(Action::AssignCategoryToAllProducts)
        );
        assert_eq!(Action::parse("drop_tables"), None);
    }

    #[test]
    fn test_write_action_set() {
        assert!(Action::DeletePurchase.is_write());
        assert!(Action::CreateCategory.is_write());
        assert!(!Action::ListProducts.is_write());
        assert!(!Action::PurchaseMetrics.is_write());
    }

    #[test]
    fn test_action_display_matches_wire_name() {
        assert_eq!(Action::DeletePurchasesByProduct.to_string(), "delete_purchases_by_product");
    }
}
