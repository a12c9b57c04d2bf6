//! Error types for Zeolith
//!
//! This module defines all error types used throughout the orchestration core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Most failures in this core are recovered locally and surfaced as
//! observation text inside the conversation, so only a few variants ever
//! cross a public API boundary. `Config` is the one class that should abort
//! process initialization.

use thiserror::Error;

/// The primary error type for Zeolith operations.
#[derive(Error, Debug)]
pub enum ZeolithError {
    /// Configuration errors (missing required endpoint, invalid config file).
    /// The only class that should be fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider errors (API failures, non-2xx responses, malformed replies)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors (upstream service unreachable, bad arguments,
    /// missing workspace file)
    #[error("Tool error: {0}")]
    Tool(String),

    /// A tool with this name is already registered. Fatal at registry
    /// construction time.
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// The requested tool is not in the registry. Surfaces as observation
    /// text or a failed job status, never propagates out of dispatch.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for Zeolith operations.
pub type Result<T> = std::result::Result<T, ZeolithError>;
