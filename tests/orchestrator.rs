//! End-to-end tests for the reasoning loop, driven by a scripted provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use zeolith::agent::{LlmGateway, Orchestrator, STALL_MESSAGE, TIMEOUT_MESSAGE};
use zeolith::error::Result;
use zeolith::jobs::{JobQueue, JobStatus};
use zeolith::providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition};
use zeolith::session::{Conversation, Message, Role, SessionStore};
use zeolith::tools::{required_str, Tool, ToolRegistry};

/// Replays a fixed sequence of responses, then a default for every further
/// call. Counts calls so tests can assert how many turns the loop took.
struct ScriptedProvider {
    script: Mutex<VecDeque<LLMResponse>>,
    fallback: LLMResponse,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Vec<LLMResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: LLMResponse::text("Final Answer: fallback"),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_fallback(mut self, fallback: LLMResponse) -> Self {
        self.fallback = fallback;
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        _messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        Ok(script.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Foreground tool returning a fixed measurement observation.
struct MeasureTool;

#[async_trait]
impl Tool for MeasureTool {
    fn name(&self) -> &str {
        "measure"
    }
    fn description(&self) -> &str {
        "Measures a sample"
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "sample": { "type": "string" } },
            "required": ["sample"]
        })
    }
    async fn execute(&self, args: Value, _conversation: &mut Conversation) -> Result<String> {
        let sample = required_str(&args, "sample")?;
        Ok(format!("Measured {}: 11.2", sample))
    }
}

/// Background tool standing in for the optimization suite.
struct OptimizeTool;

#[async_trait]
impl Tool for OptimizeTool {
    fn name(&self) -> &str {
        "optimize"
    }
    fn description(&self) -> &str {
        "Long-running optimization"
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    fn runs_in_background(&self) -> bool {
        true
    }
    async fn execute(&self, _args: Value, conversation: &mut Conversation) -> Result<String> {
        conversation.put_workspace_file("optimized.xyz", "b3B0");
        Ok("optimization converged".to_string())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: SessionStore,
    jobs: JobQueue,
    provider: Arc<ScriptedProvider>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(provider: ScriptedProvider) -> Harness {
    init_tracing();
    let provider = Arc::new(provider);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(MeasureTool)).unwrap();
    registry.register(Arc::new(OptimizeTool)).unwrap();
    let registry = Arc::new(registry);

    let store = SessionStore::new_memory();
    let jobs = JobQueue::new(registry.clone(), store.clone());
    let orchestrator = Orchestrator::new(
        LlmGateway::new(provider.clone()),
        registry,
        store.clone(),
        jobs.clone(),
    );

    Harness {
        orchestrator,
        store,
        jobs,
        provider,
    }
}

fn tool_call_response(name: &str, arguments: &str) -> LLMResponse {
    LLMResponse::with_tools("", vec![LLMToolCall::new("call_1", name, arguments)])
}

fn roles(conversation: &Conversation) -> Vec<Role> {
    conversation.messages.iter().map(|m| m.role).collect()
}

#[tokio::test]
async fn test_tool_then_final_answer_log_shape() {
    let h = harness(ScriptedProvider::new(vec![
        tool_call_response("measure", r#"{"sample": "mof5"}"#),
        LLMResponse::text("Thought: done.\nFinal Answer: X"),
    ]));

    let reply = h.orchestrator.step("sess-1", "measure mof5").await;

    // Only the extracted answer comes back, not the surrounding thought
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "X");

    let log = h.store.load("sess-1").await;
    assert_eq!(
        roles(&log),
        vec![
            Role::System,
            Role::User,
            Role::Assistant, // tool request
            Role::Tool,      // observation
            Role::Assistant, // final
        ]
    );
    assert!(log.messages[2].has_tool_calls());
    assert_eq!(log.messages[3].content, "Measured mof5: 11.2");
    assert_eq!(log.messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(log.messages[4].content, "X");
    assert_eq!(h.provider.call_count(), 2);
}

#[tokio::test]
async fn test_unsaved_session_loads_empty() {
    let h = harness(ScriptedProvider::new(vec![]));
    let conversation = h.store.load("never-stepped").await;
    assert!(conversation.is_empty());
}

#[tokio::test]
async fn test_system_prompt_seeded_once() {
    let h = harness(ScriptedProvider::new(vec![
        LLMResponse::text("Final Answer: first"),
        LLMResponse::text("Final Answer: second"),
    ]));

    h.orchestrator.step("sess-seed", "hello").await;
    h.orchestrator.step("sess-seed", "again").await;

    let log = h.store.load("sess-seed").await;
    let system_count = log
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .count();
    assert_eq!(system_count, 1);
    assert_eq!(log.messages[0].role, Role::System);
    assert_eq!(log.session_id.as_deref(), Some("sess-seed"));
}

#[tokio::test]
async fn test_log_grows_monotonically_across_steps() {
    let h = harness(ScriptedProvider::new(vec![]));

    h.orchestrator.step("sess-grow", "one").await;
    let after_first = h.store.load("sess-grow").await.message_count();

    h.orchestrator.step("sess-grow", "two").await;
    let after_second = h.store.load("sess-grow").await.message_count();

    assert!(after_first >= 3); // system + user + at least one assistant
    assert!(after_second > after_first);
}

#[tokio::test]
async fn test_turn_budget_exhaustion() {
    // The model never stops asking for measurements
    let provider = ScriptedProvider::new(vec![])
        .with_fallback(tool_call_response("measure", r#"{"sample": "mof5"}"#));
    let h = harness(provider);
    let orchestrator = Orchestrator::new(
        LlmGateway::new(h.provider.clone()),
        Arc::new({
            let mut r = ToolRegistry::new();
            r.register(Arc::new(MeasureTool)).unwrap();
            r
        }),
        h.store.clone(),
        h.jobs.clone(),
    )
    .with_max_turns(3);

    let reply = orchestrator.step("sess-budget", "loop forever").await;

    assert_eq!(reply.content, TIMEOUT_MESSAGE);
    assert_eq!(h.provider.call_count(), 3);

    let log = h.store.load("sess-budget").await;
    assert_eq!(log.last_message().unwrap().content, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_stall_terminates_with_clarification() {
    let h = harness(ScriptedProvider::new(vec![LLMResponse::text(
        "Thought: I am unsure what to do here.",
    )]));

    let reply = h.orchestrator.step("sess-stall", "hmm").await;

    assert_eq!(reply.content, STALL_MESSAGE);
    // Only one model call: stalling ends the step immediately
    assert_eq!(h.provider.call_count(), 1);

    let log = h.store.load("sess-stall").await;
    assert_eq!(
        roles(&log),
        vec![Role::System, Role::User, Role::Assistant, Role::Assistant]
    );
    // The raw stalled output is preserved ahead of the clarification
    assert_eq!(
        log.messages[2].content,
        "Thought: I am unsure what to do here."
    );
    assert_eq!(log.messages[3].content, STALL_MESSAGE);
}

#[tokio::test]
async fn test_background_tool_ends_turn_with_announcement() {
    let h = harness(ScriptedProvider::new(vec![tool_call_response(
        "optimize", "{}",
    )]));

    let reply = h.orchestrator.step("sess-bg", "optimize my structure").await;

    // Exactly one model call: submission is turn-terminal
    assert_eq!(h.provider.call_count(), 1);
    assert!(reply
        .content
        .starts_with("The long-running task 'optimize' has been submitted successfully."));
    assert!(reply.content.contains("check_task_status"));

    // The announced id is a real job on the board
    let job_id = reply
        .content
        .split("The task ID is ")
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .expect("announcement carries a job id");
    let mut terminal = None;
    for _ in 0..100 {
        if let Some(status) = h.jobs.status(job_id).await {
            if status.is_terminal() {
                terminal = Some(status);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        terminal,
        Some(JobStatus::Success("optimization converged".into()))
    );

    let log = h.store.load("sess-bg").await;
    assert_eq!(
        roles(&log),
        vec![
            Role::System,
            Role::User,
            Role::Assistant, // tool request
            Role::Tool,      // submission receipt answering the call
            Role::Assistant, // announcement
        ]
    );
    assert_eq!(log.messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(log.messages[3].content, reply.content);
    // The job result itself never enters the log; it is pull-only
    assert!(log
        .messages
        .iter()
        .all(|m| !m.content.contains("optimization converged")));
}

#[tokio::test]
async fn test_persisted_history_answers_every_tool_call() {
    let h = harness(ScriptedProvider::new(vec![tool_call_response(
        "optimize", "{}",
    )]));

    h.orchestrator.step("sess-pair", "optimize this").await;

    // Chat Completions rejects histories where an assistant tool_calls entry
    // has no tool-role reply, so every call id must be answered downstream
    let log = h.store.load("sess-pair").await;
    for (i, msg) in log.messages.iter().enumerate() {
        for call in msg.tool_calls.iter().flatten() {
            assert!(
                log.messages[i + 1..].iter().any(|m| {
                    m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call.id.as_str())
                }),
                "tool call {} has no tool-role reply in the persisted log",
                call.id
            );
        }
    }

    // A later step over the persisted history still completes normally
    let reply = h.orchestrator.step("sess-pair", "is it done yet?").await;
    assert_eq!(reply.content, "fallback");
    assert_eq!(h.provider.call_count(), 2);
}

#[tokio::test]
async fn test_background_worker_persists_workspace() {
    let h = harness(ScriptedProvider::new(vec![tool_call_response(
        "optimize", "{}",
    )]));

    h.orchestrator.step("sess-ws", "optimize").await;

    // Poll until the worker has saved the workspace
    for _ in 0..100 {
        let log = h.store.load("sess-ws").await;
        if log.workspace_file("optimized.xyz").is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker never persisted the workspace file");
}

#[tokio::test]
async fn test_unknown_tool_observation_lets_loop_recover() {
    let h = harness(ScriptedProvider::new(vec![
        tool_call_response("frobnicate", "{}"),
        LLMResponse::text("Final Answer: recovered"),
    ]));

    let reply = h.orchestrator.step("sess-unknown", "do something").await;
    assert_eq!(reply.content, "recovered");

    let log = h.store.load("sess-unknown").await;
    let observation = log
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("unknown-tool observation is logged");
    assert!(observation
        .content
        .contains("Error: unknown tool 'frobnicate'"));
    assert!(observation.content.contains("measure"));
}

#[tokio::test]
async fn test_text_action_mode_round_trip() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        LLMResponse::text(
            "Thought: I should measure the sample.\nAction: measure(sample=\"mof5\")",
        ),
        LLMResponse::text("Final Answer: 11.2"),
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(MeasureTool)).unwrap();
    let registry = Arc::new(registry);
    let store = SessionStore::new_memory();
    let jobs = JobQueue::new(registry.clone(), store.clone());
    let orchestrator = Orchestrator::new(
        LlmGateway::new(provider.clone()),
        registry,
        store.clone(),
        jobs,
    )
    .with_text_actions(true);

    let reply = orchestrator.step("sess-text", "measure mof5").await;
    assert_eq!(reply.content, "11.2");

    let log = store.load("sess-text").await;
    // Text mode frames the observation as a user turn, not a tool result
    assert_eq!(
        roles(&log),
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
    assert_eq!(log.messages[3].content, "Observation: Measured mof5: 11.2");
}

#[tokio::test]
async fn test_malformed_text_action_stalls_deterministically() {
    let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::text(
        "Action: foo(",
    )]));
    let registry = Arc::new(ToolRegistry::new());
    let store = SessionStore::new_memory();
    let jobs = JobQueue::new(registry.clone(), store.clone());
    let orchestrator = Orchestrator::new(
        LlmGateway::new(provider.clone()),
        registry,
        store.clone(),
        jobs,
    )
    .with_text_actions(true);

    let reply = orchestrator.step("sess-malformed", "go").await;
    assert_eq!(reply.content, STALL_MESSAGE);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_provider_fault_surfaces_as_stall() {
    struct FailingProvider;

    #[async_trait]
    impl LLMProvider for FailingProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            Err(zeolith::error::ZeolithError::Provider(
                "connection refused".to_string(),
            ))
        }
        fn default_model(&self) -> &str {
            "failing"
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    let registry = Arc::new(ToolRegistry::new());
    let store = SessionStore::new_memory();
    let jobs = JobQueue::new(registry.clone(), store.clone());
    let orchestrator = Orchestrator::new(
        LlmGateway::new(Arc::new(FailingProvider)),
        registry,
        store.clone(),
        jobs,
    );

    let reply = orchestrator.step("sess-fault", "hello").await;

    // A dead backend reads like a stalled model turn
    assert_eq!(reply.content, STALL_MESSAGE);
    let log = store.load("sess-fault").await;
    assert!(log.messages[2].content.contains("connection refused"));
}

#[tokio::test]
async fn test_concurrent_steps_lose_no_user_turns() {
    let provider =
        ScriptedProvider::new(vec![]).with_fallback(LLMResponse::text("Final Answer: ok"));
    let h = harness(provider);
    let orchestrator = Arc::new(h.orchestrator);

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .step("sess-concurrent", &format!("message {}", i))
                .await
        }));
    }
    for handle in handles {
        let reply = handle.await.unwrap();
        assert_eq!(reply.content, "ok");
    }

    let log = h.store.load("sess-concurrent").await;
    let user_turns = log
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    assert_eq!(user_turns, 8, "per-session lock must not drop user turns");
}
