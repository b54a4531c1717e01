// # Task Model
//
// The manager runs VPG creation, settings commits and failover tests
// asynchronously. Submitting one returns an `OperationHandle`; its progress
// is read back as a `TaskStatus` until a terminal state is reached, at which
// point the caller receives a `TaskResult`.
//
// ## Lifecycle
//
// ```text
// submit ──► OperationHandle ──► Pending ──► Running ──┬──► Completed
//                                                      └──► Failed
// ```
//
// `Completed` and `Failed` are terminal: once observed, the handle is done
// and is never submitted again.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier returned by the manager for an asynchronous command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    /// Wrap a handle issued by the manager
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier, for building status queries
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted but not started
    Pending,
    /// In progress
    Running,
    /// Finished successfully (terminal)
    Completed,
    /// Finished with an error (terminal)
    Failed,
    /// The manager considers the handle invalid
    Invalid,
}

impl TaskState {
    /// Whether this state ends tracking
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Parse a status value reported by the manager
    ///
    /// Matching ignores case, spaces and underscores. Returns `None` for
    /// values outside the known set.
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "pending" | "queued" => Some(TaskState::Pending),
            "running" | "inprogress" => Some(TaskState::Running),
            "completed" => Some(TaskState::Completed),
            "failed" => Some(TaskState::Failed),
            "invalid" => Some(TaskState::Invalid),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "Pending",
            TaskState::Running => "Running",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
            TaskState::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// Error payload attached to a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Manager-specific error code
    #[serde(default, alias = "Code")]
    pub code: String,
    /// Human-readable message
    #[serde(default, alias = "Message")]
    pub message: String,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

/// One observation of a task's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// Reported state
    pub state: TaskState,
    /// Progress percentage, when the manager reports one
    pub progress: Option<u8>,
    /// Error details, normally present only when `Failed`
    pub error: Option<TaskError>,
}

impl TaskStatus {
    /// Create a status without progress or error details
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            progress: None,
            error: None,
        }
    }

    /// Whether this observation ends tracking
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Terminal snapshot of a tracked task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// Handle that was tracked
    pub handle: OperationHandle,
    /// `Completed` or `Failed`
    pub final_status: TaskState,
    /// Error details for a failed task
    pub error: Option<TaskError>,
    /// Time from the first poll to the terminal observation
    pub elapsed: Duration,
}

impl TaskResult {
    /// Whether the remote operation completed successfully
    pub fn is_success(&self) -> bool {
        self.final_status == TaskState::Completed
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} after {:?}", self.handle, self.final_status, self.elapsed)?;
        if let Some(error) = &self.error {
            write!(f, " ({})", error)?;
        }
        Ok(())
    }
}
