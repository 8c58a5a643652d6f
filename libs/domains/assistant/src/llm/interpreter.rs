use std::sync::Arc;

use domain_catalog::CatalogRepository;
use serde_json::Value;

use crate::command::{DataMap, RawCommand};
use crate::error::{AssistantError, AssistantResult};
use crate::llm::client::{ChatCompletion, ChatMessage, ChatRequest};
use crate::llm::context::inventory_snapshot;

const INTERPRETER_TEMPERATURE: f32 = 0.0;
const INTERPRETER_MAX_TOKENS: u32 = 1024;

/// Translates free-form user text into catalog commands by prompting
/// the chat model for a strict JSON command list.
pub struct CommandInterpreter {
    chat: Arc<dyn ChatCompletion>,
    repo: Arc<dyn CatalogRepository>,
}

impl CommandInterpreter {
    pub fn new(chat: Arc<dyn ChatCompletion>, repo: Arc<dyn CatalogRepository>) -> Self {
        Self { chat, repo }
    }

    /// Interpret the message. An empty list means the model judged the
    /// message not to be a catalog command.
    pub async fn translate(&self, message: &str) -> AssistantResult<Vec<RawCommand>> {
        let snapshot = inventory_snapshot(self.repo.as_ref()).await?;
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(system_prompt(&snapshot)),
                ChatMessage::user(message.to_string()),
            ],
            temperature: INTERPRETER_TEMPERATURE,
            max_tokens: INTERPRETER_MAX_TOKENS,
        };

        let content = self.chat.complete(request).await?;
        let stripped = strip_code_fences(&content);
        tracing::debug!(raw = %stripped, "Interpreter response");

        let parsed: Value = serde_json::from_str(stripped).map_err(|_| {
            AssistantError::Upstream("The interpreter response is not valid JSON.".to_string())
        })?;

        let commands = parsed
            .get("commands")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AssistantError::Upstream(
                    "The interpreter returned an invalid command format.".to_string(),
                )
            })?;

        let mut normalized = Vec::with_capacity(commands.len());
        for entry in commands {
            let Value::Object(entry) = entry else {
                return Err(AssistantError::Upstream(
                    "The interpreter returned an invalid command format.".to_string(),
                ));
            };
            let action = entry
                .get("action")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_default();
            if action.is_empty() {
                return Err(AssistantError::Upstream(
                    "The interpreter returned an invalid command format.".to_string(),
                ));
            }
            let data = match entry.get("data") {
                None | Some(Value::Null) => DataMap::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => {
                    return Err(AssistantError::Upstream(
                        "The interpreter returned an invalid command format.".to_string(),
                    ));
                }
            };
            normalized.push(RawCommand { action, data });
        }
        Ok(normalized)
    }
}

/// Strip a wrapping Markdown code fence, with or without a language tag.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

fn system_prompt(snapshot: &str) -> String {
    format!(
        "You translate user messages about a product catalog into JSON commands.\n\
         Respond with a single JSON object: {{\"commands\": [...]}} and nothing else.\n\
         Each command is {{\"action\": \"...\", \"data\": {{...}}}}.\n\
         If the message is not a catalog command, respond with {{\"commands\": []}}.\n\
         \n\
         Supported actions and their data fields:\n\
         - list_categories: no data\n\
         - create_category: name, description?, is_active?\n\
         - update_category: category_id|category_slug|category_name plus the fields to change\n\
         - delete_category: category_id|category_slug|category_name, confirm?\n\
         - assign_category: product reference and category reference\n\
         - assign_category_to_all_products: category reference\n\
         - unassign_category: product reference and category reference\n\
         - list_products: order_by? (name|price), direction? (asc|desc)\n\
         - create_product: name, price, stock, description?, categories?\n\
         - update_product: product reference plus the fields to change\n\
         - delete_product: product reference, confirm?\n\
         - product_metrics: metrics? ([max_price, min_price])\n\
         - list_purchases: order_by?, direction?, start_date?, end_date?, min_price?, max_price?, product reference?\n\
         - create_purchase: items (list of {{\"product_id\": N, \"quantity\": N}})\n\
         - delete_purchase: purchase_id, confirm?\n\
         - delete_purchases_by_product: product reference, confirm?\n\
         - purchase_metrics: metrics? ([max_price, min_price, max_items, min_items])\n\
         \n\
         Product references use product_id, product_slug, or product_name.\n\
         Category references use category_id, category_slug, or category_name.\n\
         Never invent identifiers that are not in the inventory below.\n\
         Do not include a confirm field unless the user already confirmed.\n\
         \n\
         {}",
        snapshot
    )
}

#[cfg(test)]
mod tests {
    use super::strip_code_fences;

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(
            strip_code_fences("```json\n{\"commands\": []}\n```"),
            "{\"commands\": []}"
        );
        assert_eq!(
            strip_code_fences("```\n{\"commands\": []}\n```"),
            "{\"commands\": []}"
        );
        assert_eq!(strip_code_fences("{\"commands\": []}"), "{\"commands\": []}");
    }
}
