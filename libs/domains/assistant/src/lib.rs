//! Conversational command processing for the catalog assistant.
//!
//! The entry points are [`CommandProcessor`], which turns raw caller
//! input (help keyword, JSON command envelopes, or free text routed
//! through the LLM interpreter) into executed catalog operations, and
//! [`PromptGateway`], which adds the multi-turn pending-action protocol
//! on top of it.

pub mod command;
pub mod confirm;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod handlers;
pub mod llm;
pub mod ordering;
pub mod pending;
pub mod processor;
pub mod resolve;
pub mod slug;

pub use command::{
    Action, Command, CommandOutcome, CommandReply, DataMap, PendingActionSignal, RawCommand,
    Requirement,
};
pub use error::{AssistantError, AssistantResult};
pub use gateway::{PromptGateway, PromptRequest, PromptResponse, UiAction};
pub use llm::{
    AnswerService, ChatCompletion, ChatMessage, ChatRequest, CommandInterpreter, GroqChatClient,
};
pub use pending::{InMemoryPendingStore, PendingRecord, PendingStore};
pub use processor::CommandProcessor;
