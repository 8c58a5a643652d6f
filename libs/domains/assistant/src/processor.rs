//! Command dispatcher: resolves the shape of raw caller input and
//! routes commands to their handlers.

use std::sync::Arc;

use domain_catalog::CatalogRepository;
use serde_json::Value;

use crate::command::{Action, CommandOutcome, CommandReply, DataMap, RawCommand};
use crate::error::{AssistantError, AssistantResult};
use crate::handlers::{categories, products, purchases};
use crate::llm::CommandInterpreter;

pub struct CommandProcessor {
    repo: Arc<dyn CatalogRepository>,
    interpreter: Option<CommandInterpreter>,
}

impl CommandProcessor {
    pub fn new(repo: Arc<dyn CatalogRepository>, interpreter: Option<CommandInterpreter>) -> Self {
        Self { repo, interpreter }
    }

    /// Execute the message if it is a command. Returns `Ok(None)` when
    /// the input is not a command at all, signaling the caller to fall
    /// back to free-form Q&A.
    pub async fn process_if_command(
        &self,
        raw_message: &str,
    ) -> AssistantResult<Option<CommandOutcome>> {
        let text = raw_message.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let lowered = text.to_lowercase();
        if lowered == "help" || lowered == "ayuda" {
            return Ok(Some(CommandOutcome::Completed(CommandReply::new(
                "Available commands.",
                help_message(),
            ))));
        }

        if text.starts_with('{') {
            return self.process_json(text).await.map(Some);
        }

        let Some(interpreter) = &self.interpreter else {
            return Ok(None);
        };

        let commands = interpreter.translate(text).await?;
        if commands.is_empty() {
            return Ok(None);
        }

        let has_writes = commands
            .iter()
            .any(|entry| Action::parse(&entry.action).is_some_and(|a| a.is_write()));
        if !has_writes {
            // Read-only interpretations of ambiguous free text are
            // suppressed; the caller falls back to Q&A.
            return Ok(None);
        }

        self.execute_sequence(commands).await.map(Some)
    }

    async fn process_json(&self, text: &str) -> AssistantResult<CommandOutcome> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|_| AssistantError::Validation("The JSON command is invalid.".to_string()))?;
        let Value::Object(payload) = payload else {
            return Err(AssistantError::Validation(
                "The JSON command must be an object.".to_string(),
            ));
        };

        if let Some(commands_value) = payload.get("commands") {
            let Value::Array(entries) = commands_value else {
                return Err(AssistantError::Validation(
                    "The 'commands' field must be a list of objects.".to_string(),
                ));
            };

            let mut normalized = Vec::with_capacity(entries.len());
            for entry in entries {
                let Value::Object(entry) = entry else {
                    return Err(AssistantError::Validation(
                        "Each command must be a JSON object.".to_string(),
                    ));
                };
                let action = entry
                    .get("action")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_lowercase())
                    .unwrap_or_default();
                if action.is_empty() {
                    return Err(AssistantError::Validation(
                        "Each command must specify the 'action' field.".to_string(),
                    ));
                }
                let data = extract_data(entry.get("data"))?;
                normalized.push(RawCommand { action, data });
            }

            if normalized.is_empty() {
                return Ok(CommandOutcome::Completed(CommandReply::new(
                    "No commands to execute.",
                    "No commands were provided in the list.",
                )));
            }

            return self.execute_sequence(normalized).await;
        }

        let action_name = payload
            .get("action")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        if action_name.is_empty() {
            return Err(AssistantError::Validation(
                "The command must include the 'action' field.".to_string(),
            ));
        }
        let Some(action) = Action::parse(&action_name) else {
            return Err(AssistantError::Validation(format!(
                "Unknown action: {}. Type 'help' to see the options.",
                action_name
            )));
        };

        let mut data = extract_data(payload.get("data"))?;
        self.dispatch(action, &mut data).await
    }

    /// Execute commands in order, aggregating details and answers. A
    /// pending or cancelled outcome aborts the rest of the sequence.
    async fn execute_sequence(&self, commands: Vec<RawCommand>) -> AssistantResult<CommandOutcome> {
        let mut details: Vec<String> = Vec::new();
        let mut answers: Vec<String> = Vec::new();

        for command in commands {
            let Some(action) = Action::parse(&command.action) else {
                return Err(AssistantError::Validation(format!(
                    "Unknown action in the sequence: {}.",
                    command.action
                )));
            };
            let mut data = command.data;
            match self.dispatch(action, &mut data).await? {
                CommandOutcome::Completed(reply) => {
                    details.push(if reply.detail.is_empty() {
                        "Command executed".to_string()
                    } else {
                        reply.detail
                    });
                    if !reply.answer.is_empty() {
                        answers.push(reply.answer);
                    }
                }
                other => return Ok(other),
            }
        }

        let detail = if details.is_empty() {
            "Commands executed.".to_string()
        } else {
            details.join("; ")
        };
        Ok(CommandOutcome::Completed(CommandReply::new(
            detail,
            answers.join("\n\n"),
        )))
    }

    /// Dispatch an already-validated command. Used when resuming a
    /// suspended command with its merged data.
    pub async fn execute(&self, command: crate::command::Command) -> AssistantResult<CommandOutcome> {
        let mut data = command.data;
        self.dispatch(command.action, &mut data).await
    }

    async fn dispatch(&self, action: Action, data: &mut DataMap) -> AssistantResult<CommandOutcome> {
        tracing::debug!(action = %action, "Dispatching command");
        let repo = self.repo.as_ref();
        match action {
            Action::ListCategories => categories::list_categories(repo, data).await,
            Action::CreateCategory => categories::create_category(repo, data).await,
            Action::UpdateCategory => categories::update_category(repo, data).await,
            Action::DeleteCategory => categories::delete_category(repo, data).await,
            Action::AssignCategory => categories::assign_category(repo, data).await,
            Action::AssignCategoryToAllProducts => {
                categories::assign_category_to_all_products(repo, data).await
            }
            Action::UnassignCategory => categories::unassign_category(repo, data).await,
            Action::ListProducts => products::list_products(repo, data).await,
            Action::CreateProduct => products::create_product(repo, data).await,
            Action::UpdateProduct => products::update_product(repo, data).await,
            Action::DeleteProduct => products::delete_product(repo, data).await,
            Action::ProductMetrics => products::product_metrics(repo, data).await,
            Action::ListPurchases => purchases::list_purchases(repo, data).await,
            Action::CreatePurchase => purchases::create_purchase(repo, data).await,
            Action::DeletePurchase => purchases::delete_purchase(repo, data).await,
            Action::DeletePurchasesByProduct => {
                purchases::delete_purchases_by_product(repo, data).await
            }
            Action::PurchaseMetrics => purchases::purchase_metrics(repo, data).await,
        }
    }
}

fn extract_data(value: Option<&Value>) -> AssistantResult<DataMap> {
    match value {
        None | Some(Value::Null) => Ok(DataMap::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(AssistantError::Validation(
            "The 'data' field must be a JSON object.".to_string(),
        )),
    }
}

fn help_message() -> String {
    [
        "Available JSON commands:",
        r#"- List categories: {"action": "list_categories"}"#,
        r#"- Create category: {"action": "create_category", "data": {"name": "Snacks"}}"#,
        r#"- Update category: {"action": "update_category", "data": {"category_slug": "snacks", "name": "Drinks"}}"#,
        r#"- Delete category by id: {"action": "delete_category", "data": {"category_id": 3}}"#,
        r#"- Assign category: {"action": "assign_category", "data": {"product_id": 1, "category_id": 3}}"#,
        r#"- Assign category to all: {"action": "assign_category_to_all_products", "data": {"category_id": 3}}"#,
        r#"- Unassign category: {"action": "unassign_category", "data": {"product_id": 1, "category_id": 3}}"#,
        r#"- List products: {"action": "list_products"}"#,
        r#"- Create product: {"action": "create_product", "data": {"name": "Coffee", "price": "9.99", "stock": 10}}"#,
        r#"- Update product: {"action": "update_product", "data": {"product_id": 1, "price": "12.50"}}"#,
        r#"- Delete product: {"action": "delete_product", "data": {"product_id": 1}}"#,
        r#"- Product metrics: {"action": "product_metrics", "data": {"metrics": ["max_price", "min_price"]}}"#,
        r#"- List purchases: {"action": "list_purchases", "data": {"order_by": "total", "direction": "desc", "start_date": "2024-01-01", "end_date": "2024-01-31", "min_price": "10.00", "product_slug": "coffee"}}"#,
        r#"- Create purchase: {"action": "create_purchase", "data": {"items": [{"product_id": 1, "quantity": 2}]}}"#,
        r#"- Delete purchase: {"action": "delete_purchase", "data": {"purchase_id": 5, "confirm": true}}"#,
        r#"- Delete purchases by product: {"action": "delete_purchases_by_product", "data": {"product_slug": "coffee", "confirm": true}}"#,
        r#"- Purchase metrics: {"action": "purchase_metrics", "data": {"metrics": ["max_price", "max_items"]}}"#,
        "Type 'help' to see this list again.",
    ]
    .join("\n")
}
