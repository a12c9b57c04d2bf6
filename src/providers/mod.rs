//! LLM provider implementations for Zeolith
//!
//! Providers translate between the internal conversation format and a
//! backend's chat API. The orchestrator only ever sees the `LLMProvider`
//! trait, so test doubles and alternative backends plug in without touching
//! the loop.

mod openai;
mod types;

pub use openai::OpenAIProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition};
