//! The reasoning loop.
//!
//! `Orchestrator::step` executes one externally visible step of a session's
//! dialogue: load the conversation, append the user turn, then iterate
//! model-call / classify / act until the model produces a final answer, goes
//! nowhere, or the turn budget runs out. It returns exactly one assistant
//! message and never fails; every failure along the way is folded into
//! conversation text.
//!
//! Concurrent steps against the same session id are serialized through a
//! per-session lock table, so interleaved callers cannot race on the
//! load-modify-save cycle and drop each other's turns. Distinct sessions
//! proceed fully in parallel. The background job worker remains a second
//! writer against the workspace (see `jobs`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jobs::JobQueue;
use crate::session::{Conversation, Message, SessionStore, ToolCall};
use crate::tools::ToolRegistry;

use super::gateway::LlmGateway;
use super::parse::{extract_final_answer, parse_action};
use super::prompt::build_system_prompt;

/// Default maximum reasoning turns per step.
pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Returned when the model produces neither a final answer nor an action.
pub const STALL_MESSAGE: &str =
    "I seem to be stuck. Could you please clarify or rephrase your request?";

/// Returned when the turn budget runs out.
pub const TIMEOUT_MESSAGE: &str = "I have reached the maximum number of steps without finding a \
                                   final answer. Please try reformulating your request.";

/// Generate a new opaque session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Drives the turn loop for all sessions.
pub struct Orchestrator {
    gateway: LlmGateway,
    registry: Arc<ToolRegistry>,
    store: SessionStore,
    jobs: JobQueue,
    max_turns: u32,
    /// Parse `Action: name(args)` from assistant text instead of passing
    /// structured tool schemas to the backend.
    text_actions: bool,
    session_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl Orchestrator {
    pub fn new(
        gateway: LlmGateway,
        registry: Arc<ToolRegistry>,
        store: SessionStore,
        jobs: JobQueue,
    ) -> Self {
        Self {
            gateway,
            registry,
            store,
            jobs,
            max_turns: DEFAULT_MAX_TURNS,
            text_actions: false,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Set the turn budget. Values below 1 are clamped to 1.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Switch to text-form action parsing for backends without native tool
    /// support.
    pub fn with_text_actions(mut self, enabled: bool) -> Self {
        self.text_actions = enabled;
        self
    }

    /// Run one dialogue step for a session. Never fails.
    pub async fn step(&self, session_id: &str, user_input: &str) -> Message {
        // Serialize concurrent steps for the same session key. Different
        // sessions can still proceed concurrently.
        let session_lock = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let session_guard = session_lock.lock().await;
        let reply = self.step_locked(session_id, user_input).await;
        drop(session_guard);

        // Prune the lock entry unless another step is already waiting on it
        // (the table reference plus our clone account for two).
        let mut locks = self.session_locks.lock().await;
        if let Some(entry) = locks.get(session_id) {
            if Arc::strong_count(entry) == 2 {
                locks.remove(session_id);
            }
        }
        drop(locks);

        reply
    }

    async fn step_locked(&self, session_id: &str, user_input: &str) -> Message {
        let mut conversation = self.store.load(session_id).await;

        if conversation.session_id.is_none() {
            info!(session_id, "New conversation, seeding system prompt");
            conversation.session_id = Some(session_id.to_string());
            conversation.push(Message::system(&build_system_prompt(
                &self.registry.definition_lines(),
            )));
        }

        conversation.push(Message::user(user_input));
        self.store.save(session_id, &conversation).await;

        for turn in 0..self.max_turns {
            debug!(session_id, turn = turn + 1, "Reasoning turn");

            let tool_schemas = if self.text_actions {
                // No native schemas: the system prompt carries the tool list
                // and the model acts through Action text.
                Vec::new()
            } else {
                self.registry.definitions()
            };
            let assistant = self
                .gateway
                .complete(conversation.messages.clone(), tool_schemas)
                .await;

            if let Some(final_text) = extract_final_answer(&assistant.content) {
                info!(session_id, "Final answer reached");
                let final_message = Message::assistant(&final_text);
                conversation.push(final_message.clone());
                self.store.save(session_id, &conversation).await;
                return final_message;
            }

            // Structured invocations are primary; only the first call in a
            // turn is honored.
            if let Some(call) = assistant
                .tool_calls
                .as_ref()
                .and_then(|calls| calls.first())
                .cloned()
            {
                if assistant.tool_calls.as_ref().map(Vec::len).unwrap_or(0) > 1 {
                    warn!(
                        session_id,
                        tool = %call.name,
                        "Model requested multiple tool calls; honoring the first"
                    );
                }
                conversation.push(Message::assistant_with_tools(
                    &assistant.content,
                    vec![call.clone()],
                ));
                self.store.save(session_id, &conversation).await;

                let args = parse_call_arguments(&call);

                if self.registry.runs_in_background(&call.name) {
                    return self
                        .dispatch_background(
                            session_id,
                            &mut conversation,
                            &call.name,
                            args,
                            Some(&call.id),
                        )
                        .await;
                }

                let observation = self
                    .registry
                    .execute(&call.name, args, &mut conversation)
                    .await;
                conversation.push(Message::tool_result(&call.id, &observation));
                self.store.save(session_id, &conversation).await;
                continue;
            }

            // Text-form fallback.
            if self.text_actions {
                if let Some((tool_name, args)) = parse_action(&assistant.content) {
                    conversation.push(assistant.clone());
                    self.store.save(session_id, &conversation).await;

                    if self.registry.runs_in_background(&tool_name) {
                        return self
                            .dispatch_background(session_id, &mut conversation, &tool_name, args, None)
                            .await;
                    }

                    let observation = self
                        .registry
                        .execute(&tool_name, args, &mut conversation)
                        .await;
                    conversation.push(Message::observation(&observation));
                    self.store.save(session_id, &conversation).await;
                    continue;
                }
            }

            // STALLED: neither a final marker nor a recognizable invocation.
            // Policy: terminate the step and ask the user to clarify.
            warn!(session_id, "Model produced no action or final answer");
            conversation.push(assistant);
            let stall_message = Message::assistant(STALL_MESSAGE);
            conversation.push(stall_message.clone());
            self.store.save(session_id, &conversation).await;
            return stall_message;
        }

        warn!(session_id, max_turns = self.max_turns, "Turn budget exhausted");
        let timeout_message = Message::assistant(TIMEOUT_MESSAGE);
        conversation.push(timeout_message.clone());
        self.store.save(session_id, &conversation).await;
        timeout_message
    }

    /// Submit a long-running tool and terminate the step. Async dispatch is
    /// never followed in-loop by the tool's result; the model polls with
    /// `check_task_status` on a later step.
    ///
    /// In structured mode the submission receipt is also recorded as the
    /// tool-role reply for `tool_call_id`: every assistant `tool_calls` entry
    /// in the persisted history must be answered, or OpenAI-compatible
    /// backends reject the whole conversation on the next step.
    async fn dispatch_background(
        &self,
        session_id: &str,
        conversation: &mut Conversation,
        tool_name: &str,
        args: Value,
        tool_call_id: Option<&str>,
    ) -> Message {
        let job_id = self.jobs.submit(session_id, tool_name, args).await;
        info!(session_id, tool = tool_name, job_id = %job_id, "Dispatched background tool");

        let receipt = format!(
            "The long-running task '{}' has been submitted successfully. The task ID is {}. \
             Use the 'check_task_status' tool to check for its completion.",
            tool_name, job_id
        );
        if let Some(call_id) = tool_call_id {
            conversation.push(Message::tool_result(call_id, &receipt));
        }
        let announcement = Message::assistant(&receipt);
        conversation.push(announcement.clone());
        self.store.save(session_id, conversation).await;
        announcement
    }
}

fn parse_call_arguments(call: &ToolCall) -> Value {
    match call.parse_arguments::<Value>() {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            warn!(tool = %call.name, "Tool call arguments are not a JSON object");
            Value::Object(serde_json::Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
    use async_trait::async_trait;

    struct DoneProvider;

    #[async_trait]
    impl LLMProvider for DoneProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::text("Final Answer: ok"))
        }

        fn default_model(&self) -> &str {
            "done"
        }

        fn name(&self) -> &str {
            "done"
        }
    }

    fn orchestrator_with_done_provider() -> Orchestrator {
        let registry = Arc::new(ToolRegistry::new());
        let store = SessionStore::new_memory();
        let jobs = crate::jobs::JobQueue::new(registry.clone(), store.clone());
        Orchestrator::new(
            LlmGateway::new(Arc::new(DoneProvider)),
            registry,
            store,
            jobs,
        )
    }

    #[test]
    fn test_new_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }

    #[tokio::test]
    async fn test_lock_table_is_pruned_after_step() {
        let orchestrator = orchestrator_with_done_provider();

        orchestrator.step("sess-a", "hello").await;
        orchestrator.step("sess-b", "hello").await;

        let locks = orchestrator.session_locks.lock().await;
        assert!(
            locks.is_empty(),
            "idle sessions must not accumulate lock entries"
        );
    }

    #[tokio::test]
    async fn test_lock_pruning_keeps_contended_sessions_serialized() {
        let orchestrator = Arc::new(orchestrator_with_done_provider());

        let mut handles = Vec::new();
        for i in 0..4 {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.step("sess-hot", &format!("turn {}", i)).await
            }));
        }
        for handle in handles {
            handle.await.expect("step task panicked");
        }

        let log = orchestrator.store.load("sess-hot").await;
        let user_turns = log
            .messages
            .iter()
            .filter(|m| m.role == crate::session::Role::User)
            .count();
        assert_eq!(user_turns, 4);
        assert!(orchestrator.session_locks.lock().await.is_empty());
    }

    #[test]
    fn test_parse_call_arguments_object() {
        let call = ToolCall::new("c1", "t", r#"{"query": "mof"}"#);
        assert_eq!(parse_call_arguments(&call)["query"], "mof");
    }

    #[test]
    fn test_parse_call_arguments_malformed_degrades_to_empty() {
        let call = ToolCall::new("c1", "t", "not json");
        assert_eq!(parse_call_arguments(&call), serde_json::json!({}));

        let call = ToolCall::new("c1", "t", "[1, 2]");
        assert_eq!(parse_call_arguments(&call), serde_json::json!({}));
    }
}
