//! Zeolith - ReAct orchestration core for materials-science tooling

pub mod agent;
pub mod config;
pub mod error;
pub mod jobs;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{LlmGateway, Orchestrator};
pub use config::Config;
pub use error::{Result, ZeolithError};
pub use providers::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, OpenAIProvider, ToolDefinition,
};
pub use session::{Conversation, Message, Role, SessionStore, ToolCall};
pub use tools::{Tool, ToolRegistry};
