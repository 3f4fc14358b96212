use serde::{Deserialize, Serialize};

use crate::{ApprovalId, Environment, TaskId};

/// A task submitted to the Orchestrator (spec §3, "Task").
///
/// Immutable once created; the mutable part of a task's lifecycle lives in
/// [`TaskStatus`], tracked alongside it by the component driving the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub environment: Environment,
    pub parent_task_id: Option<TaskId>,
}

impl Task {
    pub fn new(text: impl Into<String>, environment: Environment) -> Self {
        Self {
            id: TaskId::new(),
            text: text.into(),
            submitted_at: chrono::Utc::now(),
            environment,
            parent_task_id: None,
        }
    }

    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent_task_id = Some(parent);
        self
    }
}

/// Lifecycle state of a [`Task`] (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    AwaitingApproval { approval_id: ApprovalId },
    AwaitingHumanInput { prompt: String },
    Succeeded { summary: String },
    Failed { reason: String },
    Stopped { reason: String },
    BudgetExhausted { reason: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded { .. }
                | TaskStatus::Failed { .. }
                | TaskStatus::Stopped { .. }
                | TaskStatus::BudgetExhausted { .. }
        )
    }

    /// Exit-code class for the CLI (spec §6/§7): 0 on success, distinct
    /// non-zero codes for each other terminal/paused status.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskStatus::Succeeded { .. } => 0,
            TaskStatus::Failed { .. } => 1,
            TaskStatus::BudgetExhausted { .. } => 2,
            TaskStatus::Stopped { .. } => 3,
            TaskStatus::AwaitingApproval { .. } => 4,
            TaskStatus::AwaitingHumanInput { .. } => 5,
            TaskStatus::Queued | TaskStatus::Running => 6,
        }
    }
}
