//! Multi-turn prompt protocol. Wraps the command processor with the
//! pending-action lifecycle: suspended commands get a continuation
//! token, callers resume them with data, free text, or a confirmation,
//! and tokens are single-use.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::command::{Command, CommandOutcome, DataMap, PendingActionSignal, Requirement};
use crate::error::{AssistantError, AssistantResult};
use crate::llm::AnswerService;
use crate::pending::{PendingRecord, PendingStore};
use crate::processor::CommandProcessor;

/// Confirmation vocabulary, wider than the command-data boolean parser
/// because here the caller types a bare reply.
const CONFIRM_TOKENS: &[&str] = &[
    "true", "1", "yes", "y", "si", "s", "ok", "vale", "claro", "confirmo",
];
const REJECT_TOKENS: &[&str] = &[
    "false", "0", "no", "n", "cancel", "cancelar", "rechazo", "salir",
];

#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pending_token: Option<String>,
    #[serde(default)]
    pub data: Option<DataMap>,
    #[serde(default)]
    pub confirm: Option<Value>,
}

/// A suggested follow-up the UI can render as a button or input box.
#[derive(Debug, Clone, Serialize)]
pub struct UiAction {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl UiAction {
    fn submit(label: &str, payload: Value) -> Self {
        Self {
            label: label.to_string(),
            kind: "submit".to_string(),
            payload,
        }
    }

    fn input(label: String, payload: Value) -> Self {
        Self {
            label,
            kind: "input".to_string(),
            payload,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PromptResponse {
    Ok {
        detail: String,
        answer: String,
        actions: Vec<UiAction>,
    },
    Pending {
        detail: String,
        pending_token: String,
        requirements: Vec<Requirement>,
        #[serde(skip_serializing_if = "Option::is_none")]
        confirmation_message: Option<String>,
        answer: String,
        actions: Vec<UiAction>,
    },
    Cancelled {
        detail: String,
        actions: Vec<UiAction>,
    },
}

pub struct PromptGateway {
    processor: CommandProcessor,
    pending: Arc<dyn PendingStore>,
    qa: Option<AnswerService>,
}

impl PromptGateway {
    pub fn new(
        processor: CommandProcessor,
        pending: Arc<dyn PendingStore>,
        qa: Option<AnswerService>,
    ) -> Self {
        Self {
            processor,
            pending,
            qa,
        }
    }

    pub async fn handle(
        &self,
        session: &str,
        request: PromptRequest,
    ) -> AssistantResult<PromptResponse> {
        if let Some(token) = &request.pending_token {
            return self
                .resume(
                    session,
                    token,
                    request.data.unwrap_or_default(),
                    request.message.as_deref(),
                    request.confirm.as_ref(),
                )
                .await;
        }

        let message = request.message.as_deref().unwrap_or("").trim().to_string();
        if message.is_empty() {
            return Err(AssistantError::Validation(
                "The message cannot be empty.".to_string(),
            ));
        }

        // A bare free-text message may be the answer to the most recent
        // suspension in the session, without the caller echoing the token.
        if !message.starts_with('{') {
            if let Some(response) = self.try_auto_resume(session, &message).await? {
                return Ok(response);
            }
        }

        if let Some(outcome) = self.processor.process_if_command(&message).await? {
            return self.settle(session, None, outcome).await;
        }

        let Some(qa) = &self.qa else {
            return Err(AssistantError::Upstream(
                "The LLM service is not configured. Set GROQ_API_KEY.".to_string(),
            ));
        };
        let answer = qa.answer_question(&message).await?;
        Ok(PromptResponse::Ok {
            detail: "Message received successfully.".to_string(),
            answer,
            actions: Vec::new(),
        })
    }

    async fn try_auto_resume(
        &self,
        session: &str,
        message: &str,
    ) -> AssistantResult<Option<PromptResponse>> {
        let Some((token, record)) = self.pending.latest(session).await else {
            return Ok(None);
        };

        if record.requires_confirmation {
            // Only a recognizable yes/no resumes; anything else is a
            // fresh message.
            if parse_confirmation_text(message).is_none() {
                return Ok(None);
            }
            return self
                .resume(session, &token, DataMap::new(), Some(message), None)
                .await
                .map(Some);
        }

        if record.requirements.is_empty() {
            return Ok(None);
        }
        self.resume(session, &token, DataMap::new(), Some(message), None)
            .await
            .map(Some)
    }

    async fn resume(
        &self,
        session: &str,
        token: &str,
        extra_data: DataMap,
        free_text: Option<&str>,
        confirm: Option<&Value>,
    ) -> AssistantResult<PromptResponse> {
        let record = self
            .pending
            .get(session, token)
            .await
            .ok_or(AssistantError::PendingExpired)?;

        let mut data = record.command.data.clone();
        let mut confirm_value = confirm.cloned();
        for (key, value) in extra_data {
            if key == "confirm" || key == "confirmation" {
                if confirm_value.is_none() {
                    confirm_value = Some(value);
                }
                continue;
            }
            data.insert(key, value);
        }

        let free_text = free_text.map(str::trim).filter(|t| !t.is_empty());
        if record.requires_confirmation {
            let answer = confirm_value
                .as_ref()
                .and_then(parse_confirmation_value)
                .or_else(|| free_text.and_then(parse_confirmation_text));
            match answer {
                None => {
                    // Unrecognized reply; keep the suspension and ask again.
                    return Ok(self.pending_response(
                        token.to_string(),
                        record.command.action.to_string(),
                        &PendingActionSignal {
                            detail: "A confirmation is still required.".to_string(),
                            command: record.command.clone(),
                            requirements: record.requirements.clone(),
                            confirmation_message: Some(record.confirmation_message.clone()),
                        },
                    ));
                }
                Some(false) => {
                    self.pending.remove(session, token).await;
                    return Ok(PromptResponse::Cancelled {
                        detail: "The operation was cancelled by the user.".to_string(),
                        actions: Vec::new(),
                    });
                }
                Some(true) => {
                    data.insert("confirm".to_string(), Value::Bool(true));
                }
            }
        } else if let Some(text) = free_text {
            // Plain text fills the first outstanding field.
            if let Some(first) = record.requirements.first() {
                data.entry(first.field.clone())
                    .or_insert_with(|| Value::String(text.to_string()));
            }
        }

        let command = Command {
            action: record.command.action,
            data,
        };
        let outcome = match self.processor.execute(command).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // A failed resume consumes the token; the caller starts over.
                self.pending.remove(session, token).await;
                return Err(err);
            }
        };

        match outcome {
            CommandOutcome::Pending(signal) => {
                // Still incomplete; re-suspend under the same token so
                // the caller's handle stays valid.
                let updated = PendingRecord {
                    command: signal.command.clone(),
                    requirements: signal.requirements.clone(),
                    requires_confirmation: signal.confirmation_message.is_some(),
                    confirmation_message: signal
                        .confirmation_message
                        .clone()
                        .unwrap_or_default(),
                    created_at: record.created_at,
                };
                self.pending.put(session, token, updated).await;
                Ok(self.pending_response(
                    token.to_string(),
                    signal.command.action.to_string(),
                    &signal,
                ))
            }
            other => {
                self.pending.remove(session, token).await;
                self.settle(session, Some(token), other).await
            }
        }
    }

    /// Convert an outcome into a response, persisting a new pending
    /// record when the command suspended.
    async fn settle(
        &self,
        session: &str,
        reuse_token: Option<&str>,
        outcome: CommandOutcome,
    ) -> AssistantResult<PromptResponse> {
        match outcome {
            CommandOutcome::Completed(reply) => Ok(PromptResponse::Ok {
                detail: reply.detail,
                answer: reply.answer,
                actions: Vec::new(),
            }),
            CommandOutcome::Cancelled { message } => Ok(PromptResponse::Cancelled {
                detail: message,
                actions: Vec::new(),
            }),
            CommandOutcome::Pending(signal) => {
                let token = reuse_token
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
                let record = PendingRecord {
                    command: signal.command.clone(),
                    requirements: signal.requirements.clone(),
                    requires_confirmation: signal.confirmation_message.is_some(),
                    confirmation_message: signal
                        .confirmation_message
                        .clone()
                        .unwrap_or_default(),
                    created_at: Utc::now(),
                };
                self.pending.put(session, &token, record).await;
                Ok(self.pending_response(
                    token,
                    signal.command.action.to_string(),
                    &signal,
                ))
            }
        }
    }

    fn pending_response(
        &self,
        token: String,
        action: String,
        signal: &PendingActionSignal,
    ) -> PromptResponse {
        tracing::debug!(action = %action, token = %token, "Command suspended");

        let answer = if let Some(message) = &signal.confirmation_message {
            format!(
                "{} You can confirm by replying 'yes' or by sending \
                 {{\"pending_token\": \"{}\", \"confirm\": true}}.",
                message, token
            )
        } else if !signal.requirements.is_empty() {
            let mut lines = vec!["Outstanding data:".to_string()];
            for requirement in &signal.requirements {
                lines.push(format!("{}: {}", requirement.label, requirement.prompt));
            }
            lines.push(format!(
                "Send the value as plain text or with \
                 {{\"pending_token\": \"{}\", \"data\": {{...}}}}.",
                token
            ));
            lines.join("\n")
        } else {
            format!(
                "Reply with the pending token {{\"pending_token\": \"{}\"}} \
                 to complete the operation.",
                token
            )
        };

        let mut actions = Vec::new();
        if signal.confirmation_message.is_some() {
            actions.push(UiAction::submit(
                "Confirm",
                json!({"pending_token": token, "confirm": true}),
            ));
            actions.push(UiAction::submit(
                "Cancel",
                json!({"pending_token": token, "confirm": false}),
            ));
        }
        for requirement in &signal.requirements {
            actions.push(UiAction::input(
                format!("Provide {}", requirement.label),
                json!({"pending_token": token, "field": requirement.field}),
            ));
        }

        PromptResponse::Pending {
            detail: signal.detail.clone(),
            pending_token: token,
            requirements: signal.requirements.clone(),
            confirmation_message: signal.confirmation_message.clone(),
            answer,
            actions,
        }
    }
}

/// Fold Spanish accents so "sí" confirms like "si".
fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

fn parse_confirmation_text(text: &str) -> Option<bool> {
    let normalized = fold_accents(&text.trim().to_lowercase());
    if CONFIRM_TOKENS.contains(&normalized.as_str()) {
        Some(true)
    } else if REJECT_TOKENS.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn parse_confirmation_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => parse_confirmation_text(s),
        _ => None,
    }
}
