//! Lifecycle enums shared by the ledger, the coordinator, and the API.
//!
//! Each enum maps to the text value stored in Postgres via `as_str` and
//! parses back with `FromStr`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Interrupted => "interrupted",
        }
    }

    /// A run in this status may be re-entered with `resume_run`.
    ///
    /// `failed` runs are resumable so their failed items can be retried.
    /// A `running` run must first be marked `interrupted`; `completed` runs
    /// are closed for good.
    #[must_use]
    pub fn is_resumable(self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Interrupted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "interrupted" => Ok(RunStatus::Interrupted),
            other => Err(CoreError::UnknownRunStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl WorkItemStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemStatus::Pending => "pending",
            WorkItemStatus::InProgress => "in_progress",
            WorkItemStatus::Done => "done",
            WorkItemStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkItemStatus::Done | WorkItemStatus::Failed)
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkItemStatus::Pending),
            "in_progress" => Ok(WorkItemStatus::InProgress),
            "done" => Ok(WorkItemStatus::Done),
            "failed" => Ok(WorkItemStatus::Failed),
            other => Err(CoreError::UnknownWorkItemStatus(other.to_string())),
        }
    }
}

/// Where a run was started from. Runs are otherwise identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    Ui,
}

impl TriggerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::Manual => "manual",
            TriggerType::Scheduled => "scheduled",
            TriggerType::Ui => "ui",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(TriggerType::Manual),
            "scheduled" => Ok(TriggerType::Scheduled),
            "ui" => Ok(TriggerType::Ui),
            other => Err(CoreError::UnknownTriggerType(other.to_string())),
        }
    }
}

/// Error class recorded on a failed work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Auth,
    RateLimit,
    Connection,
    ServerError,
    Malformed,
    Persistence,
}

impl FailureClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Auth => "auth",
            FailureClass::RateLimit => "rate_limit",
            FailureClass::Connection => "connection",
            FailureClass::ServerError => "server_error",
            FailureClass::Malformed => "malformed",
            FailureClass::Persistence => "persistence",
        }
    }

    /// Transient classes are retried by the retry policy.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureClass::RateLimit | FailureClass::Connection | FailureClass::ServerError
        )
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips() {
        for status in [
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Interrupted,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
    }

    #[test]
    fn completed_runs_are_not_resumable() {
        assert!(!RunStatus::Completed.is_resumable());
        assert!(RunStatus::Interrupted.is_resumable());
        assert!(RunStatus::Failed.is_resumable());
        assert!(!RunStatus::Running.is_resumable());
    }

    #[test]
    fn work_item_terminal_states() {
        assert!(WorkItemStatus::Done.is_terminal());
        assert!(WorkItemStatus::Failed.is_terminal());
        assert!(!WorkItemStatus::Pending.is_terminal());
        assert!(!WorkItemStatus::InProgress.is_terminal());
    }

    #[test]
    fn work_item_status_uses_snake_case() {
        assert_eq!(WorkItemStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            "in_progress".parse::<WorkItemStatus>().unwrap(),
            WorkItemStatus::InProgress
        );
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        assert!(matches!(
            "cron".parse::<TriggerType>(),
            Err(CoreError::UnknownTriggerType(ref s)) if s == "cron"
        ));
    }

    #[test]
    fn auth_and_malformed_are_not_transient() {
        assert!(!FailureClass::Auth.is_transient());
        assert!(!FailureClass::Malformed.is_transient());
        assert!(!FailureClass::Persistence.is_transient());
        assert!(FailureClass::RateLimit.is_transient());
        assert!(FailureClass::Connection.is_transient());
        assert!(FailureClass::ServerError.is_transient());
    }
}
