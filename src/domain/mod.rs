//! Domain Layer - 领域层
//!
//! 包含:
//! - Report Context: 指标、服务状态、日志条目
//! - Task: 远程任务状态与操作类型
//! - History: 指标采样历史

pub mod report;

mod history;
mod task;

pub use history::{Sample, SampleHistory, DEFAULT_HISTORY_CAPACITY};
pub use report::{LogEntry, LogLevel, Metrics, PendingUpdates, ServerReport, ServiceStatus};
pub use task::{OperationKind, RemoteTaskStatus, TaskState, UnknownOperation};
