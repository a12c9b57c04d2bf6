//! Tool types for Zeolith
//!
//! This module defines the `Tool` trait that all tools implement. Tools are
//! the only components that touch external computation services; the
//! orchestrator sees them purely as name + schema + observation text.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::session::Conversation;

/// Trait that all tools must implement.
///
/// Tools receive the conversation they run inside so they can read and write
/// workspace files (structure blobs passed between invocations). The returned
/// string is the observation fed back to the model verbatim.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use zeolith::error::Result;
/// use zeolith::session::Conversation;
/// use zeolith::tools::Tool;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Replies with pong" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": {},
///             "required": []
///         })
///     }
///     async fn execute(&self, _args: Value, _conversation: &mut Conversation) -> Result<String> {
///         Ok("pong".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    ///
    /// Used to identify the tool when the LLM requests it. Must be unique
    /// within a registry.
    fn name(&self) -> &str;

    /// Get the tool description sent to the LLM.
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Whether this tool is long-running and must be dispatched through the
    /// job queue instead of being awaited inline.
    ///
    /// Background tools still implement `execute`; the job queue calls it
    /// from a detached task and records the result for later polling.
    fn runs_in_background(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    ///
    /// # Arguments
    /// * `args` - The JSON arguments passed by the LLM
    /// * `conversation` - The session this invocation runs inside; tools may
    ///   read and write its workspace but never its message log
    ///
    /// # Returns
    /// The observation text to feed back to the model.
    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String>;
}

/// Pull a required string argument out of a JSON args object.
///
/// Most tools take a small set of named string arguments; this keeps the
/// missing-argument message uniform across them.
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            crate::error::ZeolithError::Tool(format!("Missing required argument: {}", key))
        })
}

/// Pull an optional string argument out of a JSON args object.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_str_present() {
        let args = json!({"source_filename": "mof5.cif"});
        assert_eq!(required_str(&args, "source_filename").unwrap(), "mof5.cif");
    }

    #[test]
    fn test_required_str_missing() {
        let args = json!({});
        let err = required_str(&args, "source_filename").unwrap_err();
        assert!(err
            .to_string()
            .contains("Missing required argument: source_filename"));
    }

    #[test]
    fn test_required_str_rejects_empty() {
        let args = json!({"query": ""});
        assert!(required_str(&args, "query").is_err());
    }

    #[test]
    fn test_required_str_rejects_non_string() {
        let args = json!({"query": 42});
        assert!(required_str(&args, "query").is_err());
    }

    #[test]
    fn test_optional_str() {
        let args = json!({"probe_radius": "1.2"});
        assert_eq!(optional_str(&args, "probe_radius"), Some("1.2"));
        assert_eq!(optional_str(&args, "missing"), None);
    }
}
