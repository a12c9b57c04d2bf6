//! Agent module - the ReAct orchestration core
//!
//! This module wires the reasoning loop together:
//! - `Orchestrator`: the per-step state machine over the conversation log
//! - `LlmGateway`: fault-absorbing adapter over an `LLMProvider`
//! - `parse`: final-answer extraction and text-form action parsing
//! - `prompt`: the session system prompt

mod gateway;
mod orchestrator;
mod parse;
mod prompt;

pub use gateway::LlmGateway;
pub use orchestrator::{
    new_session_id, Orchestrator, DEFAULT_MAX_TURNS, STALL_MESSAGE, TIMEOUT_MESSAGE,
};
pub use parse::{extract_final_answer, parse_action, FINAL_ANSWER_MARKER};
pub use prompt::build_system_prompt;
