//! Report Context - Entities

use serde::{Deserialize, Serialize};

use super::{Metrics, ServiceStatus};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
    Success,
    /// 未知类型按 info 展示
    #[serde(other)]
    Unknown,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info | LogLevel::Unknown => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        }
    }
}

/// 远程任务产生的一条日志
///
/// 接收后不可变；引擎按到达顺序原样转交，不排序、不去重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub level: LogLevel,
    #[serde(default)]
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
        }
    }
}

/// 一次操作或刷新返回的完整数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

impl ServerReport {
    /// 停止运行的关键服务
    pub fn stopped_services(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.services.iter().filter(|s| !s.is_running())
    }
}
