//! Tool registry for Zeolith
//!
//! This module provides the `ToolRegistry` struct for managing and executing
//! tools. Registration is closed at startup; at runtime the registry only
//! looks tools up and dispatches to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{Result, ZeolithError};
use crate::providers::ToolDefinition;
use crate::session::Conversation;

use super::Tool;

/// A registry that holds and dispatches tools.
///
/// Tools are held behind `Arc` so the job queue can execute them from
/// detached tasks. Dispatch is infallible by construction: unknown tools and
/// tool failures both come back as observation text, never as errors the
/// orchestrator would have to handle.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    ///
    /// # Example
    /// ```
    /// use zeolith::tools::ToolRegistry;
    ///
    /// let registry = ToolRegistry::new();
    /// assert!(registry.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool in the registry.
    ///
    /// Tool names must be unique; a second registration under the same name
    /// is a startup bug, not a runtime condition, so it fails instead of
    /// silently replacing the first.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ZeolithError::DuplicateTool(name));
        }
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if the named tool runs in the background via the job queue.
    ///
    /// Unknown names are treated as foreground; dispatch will report them as
    /// an unknown-tool observation.
    pub fn runs_in_background(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|t| t.runs_in_background())
            .unwrap_or(false)
    }

    /// Execute a tool by name, folding every failure into observation text.
    ///
    /// # Returns
    /// The observation string to feed back to the model. Unknown tools and
    /// execution faults produce a descriptive `Error: ...` observation so the
    /// model can self-correct on the next turn.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        conversation: &mut Conversation,
    ) -> String {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "Unknown tool requested");
                return format!(
                    "Error: unknown tool '{}'. Available tools: {}",
                    name,
                    self.sorted_names().join(", ")
                );
            }
        };

        let start = Instant::now();

        match tool.execute(args, conversation).await {
            Ok(observation) => {
                info!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                observation
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                format!("Error: {}", e)
            }
        }
    }

    /// Get all tool definitions for use with LLM providers.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        // Stable ordering keeps the system prompt reproducible across runs
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// One `- name: description` line per tool, for the system prompt.
    pub fn definition_lines(&self) -> String {
        self.definitions()
            .iter()
            .map(|d| format!("- {}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get the names of all registered tools, sorted.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercases the provided text"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, args: Value, _conversation: &mut Conversation) -> Result<String> {
            let text = super::super::required_str(&args, "text")?;
            Ok(text.to_uppercase())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "A background tool"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn runs_in_background(&self) -> bool {
            true
        }
        async fn execute(&self, _args: Value, _conversation: &mut Conversation) -> Result<String> {
            Ok("done".to_string())
        }
    }

    #[test]
    fn test_registry_register() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        assert!(registry.has("upper"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_registry_duplicate_name_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        let err = registry.register(Arc::new(UpperTool)).unwrap_err();
        assert!(matches!(err, ZeolithError::DuplicateTool(name) if name == "upper"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        let mut conversation = Conversation::new();
        let observation = registry
            .execute("upper", json!({"text": "mof-5"}), &mut conversation)
            .await;
        assert_eq!(observation, "MOF-5");
    }

    #[tokio::test]
    async fn test_registry_unknown_tool_is_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        let mut conversation = Conversation::new();
        let observation = registry
            .execute("nonexistent", json!({}), &mut conversation)
            .await;

        assert!(observation.contains("Error: unknown tool 'nonexistent'"));
        assert!(observation.contains("upper"));
    }

    #[tokio::test]
    async fn test_registry_tool_fault_is_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        // Missing required argument surfaces as text, not Err
        let mut conversation = Conversation::new();
        let observation = registry.execute("upper", json!({}), &mut conversation).await;
        assert!(observation.starts_with("Error:"));
        assert!(observation.contains("text"));
    }

    #[test]
    fn test_registry_background_flag() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();

        assert!(!registry.runs_in_background("upper"));
        assert!(registry.runs_in_background("slow"));
        assert!(!registry.runs_in_background("nonexistent"));
    }

    #[test]
    fn test_registry_definitions_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).unwrap();
        registry.register(Arc::new(UpperTool)).unwrap();

        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "slow");
        assert_eq!(defs[1].name, "upper");
    }

    #[test]
    fn test_registry_definition_lines() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();

        let lines = registry.definition_lines();
        assert_eq!(lines, "- upper: Uppercases the provided text");
    }
}
