//! Healthwatch - 远程主机健康监控引擎
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Report: 指标、服务状态、日志条目
//! - Task: 远程任务状态与操作类型
//! - History: 固定容量的指标采样历史
//!
//! 应用层 (application/):
//! - Ports: ServerApiPort 远程主机接口
//! - Error: 监控错误分类
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP 客户端、脚本化测试客户端
//! - Events: 监控事件发布
//! - Monitor: 任务轮询、日志回放、监控会话

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{MonitorError, OperationRequest, ServerApiPort};
pub use config::{load_config, AppConfig};
pub use domain::{OperationKind, Sample, ServerReport, TaskState};
pub use infrastructure::{MonitorEvent, MonitoringSession, SessionConfig};
