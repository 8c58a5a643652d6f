use std::sync::Arc;

use domain_catalog::{CatalogRepository, PurchaseFilter};

use crate::error::{AssistantError, AssistantResult};
use crate::llm::client::{ChatCompletion, ChatMessage, ChatRequest};
use crate::llm::context::inventory_snapshot;

const ANSWER_TEMPERATURE: f32 = 0.3;
const ANSWER_MAX_TOKENS: u32 = 512;

/// Tokens that mark a question as being about purchase history.
const PURCHASE_TOKENS: &[&str] = &[
    "compra",
    "compras",
    "pedido",
    "pedidos",
    "venta",
    "ventas",
    "purchase",
    "purchases",
    "order",
    "orders",
    "sale",
    "sales",
];

/// Answers free-form questions about the catalog using the chat model
/// grounded in the current inventory.
pub struct AnswerService {
    chat: Arc<dyn ChatCompletion>,
    repo: Arc<dyn CatalogRepository>,
}

impl AnswerService {
    pub fn new(chat: Arc<dyn ChatCompletion>, repo: Arc<dyn CatalogRepository>) -> Self {
        Self { chat, repo }
    }

    pub async fn answer_question(&self, question: &str) -> AssistantResult<String> {
        // Purchase questions are answered locally when there is no
        // purchase history, instead of letting the model speculate.
        if is_purchase_question(question) {
            let purchases = self
                .repo
                .list_purchases(&PurchaseFilter::default(), &[])
                .await?;
            if purchases.is_empty() {
                return Ok("There are no purchases recorded at the moment.".to_string());
            }
        }

        let snapshot = inventory_snapshot(self.repo.as_ref()).await?;
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(format!(
                    "You are an assistant for a product catalog. Answer the user's \
                     question using only the inventory below. If the inventory does \
                     not contain the answer, say so briefly.\n\n{}",
                    snapshot
                )),
                ChatMessage::user(question.to_string()),
            ],
            temperature: ANSWER_TEMPERATURE,
            max_tokens: ANSWER_MAX_TOKENS,
        };

        let content = self.chat.complete(request).await?;
        if content.is_empty() {
            return Err(AssistantError::Upstream(
                "The LLM service returned no useful information.".to_string(),
            ));
        }
        Ok(content)
    }
}

fn is_purchase_question(question: &str) -> bool {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| PURCHASE_TOKENS.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::is_purchase_question;

    #[test]
    fn test_purchase_question_detection() {
        assert!(is_purchase_question("How many purchases were made today?"));
        assert!(is_purchase_question("cuantas compras hay?"));
        assert!(!is_purchase_question("What products are in stock?"));
    }
}
