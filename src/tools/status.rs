//! Background task status tool.
//!
//! The only sanctioned path for job results to re-enter the conversation:
//! the model polls with the job id it was handed at submission time.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::jobs::{JobBoard, JobStatus};
use crate::session::Conversation;

use super::{required_str, Tool};

/// Checks the status of a previously submitted background task and retrieves
/// its result once finished.
pub struct CheckTaskStatusTool {
    board: JobBoard,
}

impl CheckTaskStatusTool {
    pub fn new(board: JobBoard) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Tool for CheckTaskStatusTool {
    fn name(&self) -> &str {
        "check_task_status"
    }

    fn description(&self) -> &str {
        "Checks the status and retrieves the result of a background task using its task ID."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "The ID of the background task to check."
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: Value, _conversation: &mut Conversation) -> Result<String> {
        let task_id = required_str(&args, "task_id")?;
        info!(task_id, "Checking background task status");

        let status = self.board.read().await.get(task_id).cloned();

        Ok(match status {
            Some(JobStatus::Success(result)) => {
                format!("Task {} has status SUCCESS. The result is: {}", task_id, result)
            }
            Some(JobStatus::Failure(error)) => {
                format!("Task {} has status FAILURE. The error was: {}", task_id, error)
            }
            Some(JobStatus::Pending) => format!(
                "Task {} is not yet complete. Its current status is PENDING.",
                task_id
            ),
            None => format!(
                "No task with ID {} was found. Check the ID and try again.",
                task_id
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn board_with(entries: Vec<(&str, JobStatus)>) -> JobBoard {
        let map: HashMap<String, JobStatus> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Arc::new(RwLock::new(map))
    }

    #[tokio::test]
    async fn test_status_success_includes_result() {
        let board = board_with(vec![(
            "job-1",
            JobStatus::Success("Final energy: -42.0 eV".to_string()),
        )]);
        let tool = CheckTaskStatusTool::new(board);
        let mut conversation = Conversation::new();

        let text = tool
            .execute(json!({"task_id": "job-1"}), &mut conversation)
            .await
            .unwrap();
        assert_eq!(
            text,
            "Task job-1 has status SUCCESS. The result is: Final energy: -42.0 eV"
        );
    }

    #[tokio::test]
    async fn test_status_failure_includes_error() {
        let board = board_with(vec![(
            "job-2",
            JobStatus::Failure("service unreachable".to_string()),
        )]);
        let tool = CheckTaskStatusTool::new(board);
        let mut conversation = Conversation::new();

        let text = tool
            .execute(json!({"task_id": "job-2"}), &mut conversation)
            .await
            .unwrap();
        assert!(text.contains("FAILURE"));
        assert!(text.contains("service unreachable"));
    }

    #[tokio::test]
    async fn test_status_pending() {
        let board = board_with(vec![("job-3", JobStatus::Pending)]);
        let tool = CheckTaskStatusTool::new(board);
        let mut conversation = Conversation::new();

        let text = tool
            .execute(json!({"task_id": "job-3"}), &mut conversation)
            .await
            .unwrap();
        assert!(text.contains("not yet complete"));
        assert!(text.contains("PENDING"));
    }

    #[tokio::test]
    async fn test_status_unknown_id() {
        let tool = CheckTaskStatusTool::new(board_with(vec![]));
        let mut conversation = Conversation::new();

        let text = tool
            .execute(json!({"task_id": "ghost"}), &mut conversation)
            .await
            .unwrap();
        assert!(text.contains("No task with ID ghost"));
    }
}
