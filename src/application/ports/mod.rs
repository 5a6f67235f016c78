//! Application Ports - 出站端口定义
//!
//! 定义监控引擎与基础设施层之间的抽象接口

mod server_api;

pub use server_api::{
    ApiError, OperationRequest, ReplyStatus, ServerApiPort, ServerReply, TaskStatusReply,
};
