//! Server API Port - 远程主机 HTTP 接口抽象
//!
//! 定义监控引擎消费的远程操作，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{OperationKind, RemoteTaskStatus, ServerReport};

/// 传输层错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 业务层结果标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    #[serde(other)]
    Unknown,
}

/// 操作/刷新接口的响应信封
///
/// `status` 与传输层成功相互独立，调用方需同时检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReply {
    pub status: ReplyStatus,

    /// 异步后端返回任务 ID 而不是内联结果
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    #[serde(flatten)]
    pub report: ServerReport,
}

impl ServerReply {
    pub fn success(report: ServerReport) -> Self {
        Self {
            status: ReplyStatus::Success,
            task_id: None,
            report,
        }
    }

    pub fn accepted(task_id: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            task_id: Some(task_id.into()),
            report: ServerReport::default(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            task_id: None,
            report: ServerReport {
                message: Some(message.into()),
                ..Default::default()
            },
        }
    }

    /// 业务错误描述；成功时返回 None
    pub fn domain_error(&self) -> Option<String> {
        match self.status {
            ReplyStatus::Success => None,
            ReplyStatus::Error => Some(
                self.report
                    .message
                    .clone()
                    .unwrap_or_else(|| "Unknown server error".to_string()),
            ),
            ReplyStatus::Unknown => Some(
                self.report
                    .message
                    .clone()
                    .unwrap_or_else(|| "Unexpected reply status".to_string()),
            ),
        }
    }
}

/// 任务状态查询响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReply {
    pub status: RemoteTaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ServerReport>,
}

impl TaskStatusReply {
    pub fn running() -> Self {
        Self {
            status: RemoteTaskStatus::Running,
            data: None,
        }
    }

    pub fn finished(status: RemoteTaskStatus, data: ServerReport) -> Self {
        Self {
            status,
            data: Some(data),
        }
    }
}

/// 操作附带的参数
///
/// POST 类接口将 `params` 作为 JSON 请求体发送；GET 类接口忽略
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRequest {
    pub params: Option<serde_json::Value>,
}

impl OperationRequest {
    pub fn with_params(params: serde_json::Value) -> Self {
        Self {
            params: Some(params),
        }
    }
}

/// Server API Port
///
/// 远程主机暴露的逻辑操作
#[async_trait]
pub trait ServerApiPort: Send + Sync {
    /// 轻量刷新：当前指标与服务状态
    async fn fetch_light_metrics(&self) -> Result<ServerReply, ApiError>;

    /// 完整健康检查
    async fn run_health_check(&self, request: &OperationRequest) -> Result<ServerReply, ApiError>;

    /// 清理临时文件
    async fn run_cleanup(&self, request: &OperationRequest) -> Result<ServerReply, ApiError>;

    /// 安装系统更新
    async fn run_install_updates(&self, request: &OperationRequest) -> Result<ServerReply, ApiError>;

    /// 查询异步任务状态
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReply, ApiError>;

    /// 按操作类型分派
    async fn run_operation(
        &self,
        kind: OperationKind,
        request: &OperationRequest,
    ) -> Result<ServerReply, ApiError> {
        match kind {
            OperationKind::HealthCheck => self.run_health_check(request).await,
            OperationKind::Cleanup => self.run_cleanup(request).await,
            OperationKind::InstallUpdates => self.run_install_updates(request).await,
        }
    }
}
