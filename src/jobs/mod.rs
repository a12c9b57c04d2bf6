//! Background job queue for long-running tools.
//!
//! Optimization jobs take minutes; running them inline would pin a chat turn
//! for their whole duration. `JobQueue::submit` spawns a detached task and
//! returns a job id immediately. Results are pull-only: the worker records
//! the outcome on the status board and never appends to the conversation log.
//! The model retrieves results through the `check_task_status` tool.
//!
//! The worker executes against its own copy of the conversation. If the tool
//! wrote workspace files, the worker persists that copy; a user turn that
//! races with job completion can therefore observe the workspace from either
//! writer. The message log is safe because the worker never touches it.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ZeolithError;
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

/// Terminal and non-terminal states of a background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Submitted, worker not finished yet
    Pending,
    /// Tool completed; carries its observation text
    Success(String),
    /// Tool failed or was unknown; carries the error text
    Failure(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// Shared job status map, readable by the `check_task_status` tool.
pub type JobBoard = Arc<RwLock<HashMap<String, JobStatus>>>;

/// Dispatches background tools and tracks their outcomes.
#[derive(Clone)]
pub struct JobQueue {
    registry: Arc<ToolRegistry>,
    store: SessionStore,
    board: JobBoard,
}

impl JobQueue {
    /// Create a queue over the given registry and session store.
    ///
    /// The board is created here; hand a clone to `CheckTaskStatusTool` via
    /// [`JobQueue::board`] if the registry was built with a pre-made board,
    /// or build the board first and use [`JobQueue::with_board`].
    pub fn new(registry: Arc<ToolRegistry>, store: SessionStore) -> Self {
        Self::with_board(registry, store, Arc::new(RwLock::new(HashMap::new())))
    }

    /// Create a queue that records statuses on an existing board.
    pub fn with_board(registry: Arc<ToolRegistry>, store: SessionStore, board: JobBoard) -> Self {
        Self {
            registry,
            store,
            board,
        }
    }

    /// The shared status board.
    pub fn board(&self) -> JobBoard {
        self.board.clone()
    }

    /// Submit a tool for background execution. Returns the job id without
    /// waiting for the worker.
    pub async fn submit(&self, session_id: &str, tool_name: &str, args: Value) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.board
            .write()
            .await
            .insert(job_id.clone(), JobStatus::Pending);

        info!(
            job_id = %job_id,
            tool = tool_name,
            session_id,
            "Submitting background job"
        );

        let registry = self.registry.clone();
        let store = self.store.clone();
        let board = self.board.clone();
        let session_id = session_id.to_string();
        let tool_name = tool_name.to_string();
        let worker_job_id = job_id.clone();

        tokio::spawn(async move {
            let status = run_job(&registry, &store, &session_id, &tool_name, args).await;
            match &status {
                JobStatus::Success(_) => {
                    info!(job_id = %worker_job_id, tool = %tool_name, "Background job completed")
                }
                JobStatus::Failure(err) => {
                    error!(job_id = %worker_job_id, tool = %tool_name, error = %err, "Background job failed")
                }
                JobStatus::Pending => unreachable!("worker always reaches a terminal status"),
            }
            board.write().await.insert(worker_job_id, status);
        });

        job_id
    }

    /// Look up the current status of a job.
    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.board.read().await.get(job_id).cloned()
    }
}

async fn run_job(
    registry: &ToolRegistry,
    store: &SessionStore,
    session_id: &str,
    tool_name: &str,
    args: Value,
) -> JobStatus {
    let tool = match registry.get(tool_name) {
        Some(t) => t,
        None => {
            warn!(tool = tool_name, "Background job references unknown tool");
            return JobStatus::Failure(ZeolithError::UnknownTool(tool_name.to_string()).to_string());
        }
    };

    // The worker's own copy of the conversation; only the workspace may change.
    let mut conversation = store.load(session_id).await;
    let workspace_before = conversation.workspace.clone();

    match tool.execute(args, &mut conversation).await {
        Ok(observation) => {
            if conversation.workspace != workspace_before {
                store.save(session_id, &conversation).await;
            }
            JobStatus::Success(observation)
        }
        Err(e) => JobStatus::Failure(e.to_string()),
    }
}
