//! LLM integration: the chat completion client, the natural-language
//! command interpreter, and the free-form catalog Q&A service.

pub mod answer;
pub mod client;
pub mod context;
pub mod interpreter;

pub use answer::AnswerService;
pub use client::{ChatCompletion, ChatMessage, ChatRequest, GroqChatClient};
pub use interpreter::CommandInterpreter;
