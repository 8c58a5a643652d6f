//! Multi-turn prompt protocol: pending tokens, confirmation replies,
//! requirement fills, auto-resume, and the Q&A fallback.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use domain_assistant::{
    AssistantError, AssistantResult, ChatCompletion, ChatRequest, CommandInterpreter,
    CommandProcessor, AnswerService, InMemoryPendingStore, PromptGateway, PromptRequest,
    PromptResponse,
};
use domain_catalog::{CatalogRepository, InMemoryCatalogRepository, NewCategory};
use serde_json::json;
use tokio::sync::Mutex;

const SESSION: &str = "session-1";

/// Chat backend that replays a fixed script of responses.
struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedChat {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, _request: ChatRequest) -> AssistantResult<String> {
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AssistantError::Upstream("script exhausted".to_string()))
    }
}

fn gateway(repo: Arc<InMemoryCatalogRepository>) -> PromptGateway {
    let processor = CommandProcessor::new(repo, None);
    PromptGateway::new(processor, Arc::new(InMemoryPendingStore::new()), None)
}

fn gateway_with_chat(
    repo: Arc<InMemoryCatalogRepository>,
    chat: Arc<ScriptedChat>,
) -> PromptGateway {
    let interpreter = CommandInterpreter::new(chat.clone(), repo.clone());
    let processor = CommandProcessor::new(repo.clone(), Some(interpreter));
    let qa = AnswerService::new(chat, repo);
    PromptGateway::new(processor, Arc::new(InMemoryPendingStore::new()), Some(qa))
}

fn message(text: &str) -> PromptRequest {
    PromptRequest {
        message: Some(text.to_string()),
        ..Default::default()
    }
}

async fn seed_category(repo: &InMemoryCatalogRepository, name: &str, slug: &str) {
    repo.insert_category(NewCategory {
        name: name.to_string(),
        slug: slug.to_string(),
        description: String::new(),
        is_active: true,
    })
    .await
    .unwrap();
}

fn pending_token(response: &PromptResponse) -> String {
    match response {
        PromptResponse::Pending { pending_token, .. } => pending_token.clone(),
        other => panic!("expected a pending response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_confirmation_token_round_trip_and_single_use() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    seed_category(&repo, "Snacks", "snacks").await;
    let gateway = gateway(repo.clone());

    let response = gateway
        .handle(SESSION, message(r#"{"action": "delete_category", "data": {"category_slug": "snacks"}}"#))
        .await
        .unwrap();
    let token = pending_token(&response);
    match &response {
        PromptResponse::Pending {
            confirmation_message,
            answer,
            actions,
            ..
        } => {
            assert_eq!(
                confirmation_message.as_deref(),
                Some("Do you want to delete the category 'Snacks'?")
            );
            assert!(answer.contains(&token));
            assert_eq!(actions.len(), 2);
            assert_eq!(actions[0].label, "Confirm");
        }
        _ => unreachable!(),
    }

    let response = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token.clone()),
                confirm: Some(json!(true)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    match response {
        PromptResponse::Ok { answer, .. } => {
            assert_eq!(answer, "Category Snacks (id=1) deleted successfully.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_none());

    // The token was consumed by the successful resume.
    let err = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token),
                confirm: Some(json!(true)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::PendingExpired));
}

#[tokio::test]
async fn test_cancellation_consumes_the_token() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    seed_category(&repo, "Snacks", "snacks").await;
    let gateway = gateway(repo.clone());

    let response = gateway
        .handle(SESSION, message(r#"{"action": "delete_category", "data": {"category_slug": "snacks"}}"#))
        .await
        .unwrap();
    let token = pending_token(&response);

    let response = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token.clone()),
                message: Some("cancelar".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    match response {
        PromptResponse::Cancelled { detail, .. } => {
            assert_eq!(detail, "The operation was cancelled by the user.");
        }
        other => panic!("expected cancelled, got {:?}", other),
    }
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_some());

    let err = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token),
                confirm: Some(json!(true)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::PendingExpired));
}

#[tokio::test]
async fn test_bare_yes_resumes_the_latest_pending_action() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    seed_category(&repo, "Snacks", "snacks").await;
    let gateway = gateway(repo.clone());

    gateway
        .handle(SESSION, message(r#"{"action": "delete_category", "data": {"category_slug": "snacks"}}"#))
        .await
        .unwrap();

    let response = gateway.handle(SESSION, message("sí")).await.unwrap();
    assert!(matches!(response, PromptResponse::Ok { .. }));
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unrecognized_reply_keeps_the_confirmation_pending() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    seed_category(&repo, "Snacks", "snacks").await;
    let gateway = gateway(repo.clone());

    gateway
        .handle(SESSION, message(r#"{"action": "delete_category", "data": {"category_slug": "snacks"}}"#))
        .await
        .unwrap();

    // Not a yes/no, so it is treated as a fresh message.
    let response = gateway.handle(SESSION, message("help")).await.unwrap();
    match response {
        PromptResponse::Ok { detail, .. } => assert_eq!(detail, "Available commands."),
        other => panic!("expected ok, got {:?}", other),
    }

    // The suspension survived and still answers to a yes.
    let response = gateway.handle(SESSION, message("yes")).await.unwrap();
    assert!(matches!(response, PromptResponse::Ok { .. }));
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_none());
}

#[tokio::test]
async fn test_requirement_fill_with_free_text_then_confirm() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let gateway = gateway(repo.clone());

    let response = gateway
        .handle(SESSION, message(r#"{"action": "create_category"}"#))
        .await
        .unwrap();
    let token = pending_token(&response);
    match &response {
        PromptResponse::Pending {
            requirements,
            answer,
            ..
        } => {
            assert_eq!(requirements.len(), 1);
            assert_eq!(requirements[0].field, "name");
            assert!(answer.contains("Outstanding data:"));
        }
        _ => unreachable!(),
    }

    // The bare name fills the requirement; the command then asks for
    // confirmation under the same token.
    let response = gateway.handle(SESSION, message("Drinks")).await.unwrap();
    match &response {
        PromptResponse::Pending {
            pending_token,
            confirmation_message,
            ..
        } => {
            assert_eq!(pending_token, &token);
            assert_eq!(
                confirmation_message.as_deref(),
                Some("Do you want to create the category 'Drinks'?")
            );
        }
        other => panic!("expected pending, got {:?}", other),
    }

    let response = gateway.handle(SESSION, message("yes")).await.unwrap();
    match response {
        PromptResponse::Ok { answer, .. } => {
            assert_eq!(answer, "Category Drinks (id=1, slug=drinks) created successfully.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
}

#[tokio::test]
async fn test_requirement_fill_with_data_object() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let gateway = gateway(repo.clone());

    let response = gateway
        .handle(SESSION, message(r#"{"action": "create_category"}"#))
        .await
        .unwrap();
    let token = pending_token(&response);

    let data = json!({"name": "Drinks", "confirm": true});
    let response = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token),
                data: Some(data.as_object().unwrap().clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    match response {
        PromptResponse::Ok { answer, .. } => {
            assert_eq!(answer, "Category Drinks (id=1, slug=drinks) created successfully.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_resume_consumes_the_token() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let gateway = gateway(repo.clone());

    let response = gateway
        .handle(SESSION, message(r#"{"action": "create_category"}"#))
        .await
        .unwrap();
    let token = pending_token(&response);

    // An unparsable boolean makes the resumed command fail.
    let response = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token.clone()),
                data: Some(
                    json!({"name": "Drinks", "is_active": "maybe"})
                        .as_object()
                        .unwrap()
                        .clone(),
                ),
                ..Default::default()
            },
        )
        .await;
    assert!(response.is_err());

    let err = gateway
        .handle(
            SESSION,
            PromptRequest {
                pending_token: Some(token),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::PendingExpired));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let gateway = gateway(repo);
    let err = gateway.handle(SESSION, message("   ")).await.unwrap_err();
    assert!(matches!(err, AssistantError::Validation(_)));
}

#[tokio::test]
async fn test_free_text_without_llm_reports_missing_configuration() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let gateway = gateway(repo);
    let err = gateway
        .handle(SESSION, message("what do you sell?"))
        .await
        .unwrap_err();
    match err {
        AssistantError::Upstream(message) => {
            assert_eq!(message, "The LLM service is not configured. Set GROQ_API_KEY.");
        }
        other => panic!("expected upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_interpreted_write_command_executes() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let chat = ScriptedChat::new(&[
        r#"```json
{"commands": [{"action": "create_category", "data": {"name": "Drinks", "confirm": true}}]}
```"#,
    ]);
    let gateway = gateway_with_chat(repo.clone(), chat);

    let response = gateway
        .handle(SESSION, message("please add a Drinks category, confirmed"))
        .await
        .unwrap();
    match response {
        PromptResponse::Ok { answer, .. } => {
            assert_eq!(answer, "Category Drinks (id=1, slug=drinks) created successfully.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
    assert!(repo.find_category_by_slug("drinks").await.unwrap().is_some());
}

#[tokio::test]
async fn test_read_only_interpretation_falls_back_to_qa() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let chat = ScriptedChat::new(&[
        r#"{"commands": [{"action": "list_products"}]}"#,
        "We currently sell nothing.",
    ]);
    let gateway = gateway_with_chat(repo, chat);

    let response = gateway
        .handle(SESSION, message("what do you sell?"))
        .await
        .unwrap();
    match response {
        PromptResponse::Ok { detail, answer, .. } => {
            assert_eq!(detail, "Message received successfully.");
            assert_eq!(answer, "We currently sell nothing.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
}

#[tokio::test]
async fn test_purchase_question_short_circuits_without_history() {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    // The script only covers the interpreter call; the Q&A answer must
    // come from the local short-circuit.
    let chat = ScriptedChat::new(&[r#"{"commands": []}"#]);
    let gateway = gateway_with_chat(repo, chat);

    let response = gateway
        .handle(SESSION, message("how many purchases were made today?"))
        .await
        .unwrap();
    match response {
        PromptResponse::Ok { answer, .. } => {
            assert_eq!(answer, "There are no purchases recorded at the moment.");
        }
        other => panic!("expected ok, got {:?}", other),
    }
}
