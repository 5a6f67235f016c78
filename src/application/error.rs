//! 应用层错误定义
//!
//! 监控引擎的统一错误类型

use thiserror::Error;

use super::ports::ApiError;

/// 监控引擎错误
///
/// 只有并发冲突与参数错误同步返回给调用方，其余错误均转为 `OperationFailed` 事件
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// 传输层失败（网络不可达、非 2xx）
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// 服务器返回 `status: "error"`，消息原样保留
    #[error("{0}")]
    Domain(String),

    /// 远程任务以 Failed 结束
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// 连续未决轮询超过上限
    #[error("Task {task_id} status unavailable after {attempts} attempts")]
    PollingTimeout { task_id: String, attempts: u32 },

    /// 轮询器已在运行
    #[error("Already polling task {0}")]
    AlreadyPolling(String),

    /// 会话已有操作在进行
    #[error("An operation is already running")]
    AlreadyRunning,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 会话已销毁
    #[error("Session closed")]
    SessionClosed,
}

impl MonitorError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// 软失败：已展示的日志与历史保留，调用方可直接重试
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::PollingTimeout { .. })
    }

    /// 是否属于同步拒绝的并发冲突
    pub fn is_concurrency_violation(&self) -> bool {
        matches!(self, Self::AlreadyPolling(_) | Self::AlreadyRunning)
    }
}
