//! Task lifecycle - 远程任务状态

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// 本地观察到的任务状态
///
/// `Idle -> Running -> {Complete, Failed}`；终态吸收，不再轮询
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Complete,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Idle => "idle",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 服务器上报的任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteTaskStatus {
    #[serde(alias = "In Progress", alias = "running")]
    Running,
    #[serde(alias = "complete", alias = "Completed")]
    Complete,
    #[serde(alias = "failed")]
    Failed,
    /// 无法识别的状态，按未决处理
    #[serde(other)]
    Unknown,
}

impl RemoteTaskStatus {
    /// 映射为本地状态；未知状态返回 None
    pub fn task_state(&self) -> Option<TaskState> {
        match self {
            RemoteTaskStatus::Running => Some(TaskState::Running),
            RemoteTaskStatus::Complete => Some(TaskState::Complete),
            RemoteTaskStatus::Failed => Some(TaskState::Failed),
            RemoteTaskStatus::Unknown => None,
        }
    }
}

/// 可触发的维护操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    HealthCheck,
    Cleanup,
    InstallUpdates,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::HealthCheck,
        OperationKind::Cleanup,
        OperationKind::InstallUpdates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::HealthCheck => "health-check",
            OperationKind::Cleanup => "cleanup",
            OperationKind::InstallUpdates => "install-updates",
        }
    }
}

/// 无法识别的操作名
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown operation '{0}', expected one of: health-check, cleanup, install-updates")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
