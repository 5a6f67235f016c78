//! Report Context - 服务器报告上下文
//!
//! 职责:
//! - 主机指标与关键服务状态
//! - 远程任务日志条目
//! - 完整报告负载

mod entities;
mod value_objects;

pub use entities::{LogEntry, LogLevel, ServerReport};
pub use value_objects::{Metrics, PendingUpdates, ServiceStatus};
