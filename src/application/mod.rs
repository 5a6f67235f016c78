//! 应用层
//!
//! 包含：
//! - ports: 六边形架构端口定义（ServerApiPort）
//! - error: 应用层错误定义

pub mod error;
pub mod ports;

pub use error::MonitorError;

pub use ports::{
    ApiError, OperationRequest, ReplyStatus, ServerApiPort, ServerReply, TaskStatusReply,
};
