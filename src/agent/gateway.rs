//! LLM gateway adapter.
//!
//! Sits between the orchestrator and the `LLMProvider` trait and absorbs
//! transport faults: an upstream failure comes back as an ordinary assistant
//! message carrying the error description. From the orchestrator's view a
//! dead backend is indistinguishable from a model turn that went nowhere.
//!
//! No retry, no backoff, no wall-clock timeout here; the turn budget is the
//! only bound.

use std::sync::Arc;

use tracing::{debug, error};

use crate::providers::{ChatOptions, LLMProvider, ToolDefinition};
use crate::session::{Message, ToolCall};

/// Translates the accumulated message log into exactly one assistant message.
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    options: ChatOptions,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: None,
            options: ChatOptions::default(),
        }
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Set sampling options for every completion.
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Request one completion. Never fails: transport faults become the
    /// content of the returned assistant message.
    pub async fn complete(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Message {
        debug!(
            provider = self.provider.name(),
            message_count = messages.len(),
            tool_count = tools.len(),
            "Requesting completion"
        );

        match self
            .provider
            .chat(messages, tools, self.model.as_deref(), self.options.clone())
            .await
        {
            Ok(response) => {
                if response.has_tool_calls() {
                    let calls = response
                        .tool_calls
                        .into_iter()
                        .map(|tc| ToolCall::new(&tc.id, &tc.name, &tc.arguments))
                        .collect();
                    Message::assistant_with_tools(&response.content, calls)
                } else {
                    Message::assistant(&response.content)
                }
            }
            Err(e) => {
                error!(provider = self.provider.name(), error = %e, "Completion failed");
                Message::assistant(&format!(
                    "The language model request failed and no response was produced. Error: {}",
                    e
                ))
            }
        }
    }
}
