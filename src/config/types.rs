//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::infrastructure::adapters::HttpServerApiConfig;
use crate::infrastructure::monitor::{PollLimits, SessionConfig};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 远程主机接口配置
    #[serde(default)]
    pub api: ApiConfig,

    /// 监控引擎配置
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 远程主机接口配置
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 远程主机基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Bearer 令牌，由外部认证组件签发
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_api_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
            auth_token: None,
        }
    }
}

impl ApiConfig {
    pub fn http_config(&self) -> HttpServerApiConfig {
        HttpServerApiConfig {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            auth_token: self.auth_token.clone(),
        }
    }
}

/// 监控引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// 任务状态轮询间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// 日志回放间隔（毫秒）
    #[serde(default = "default_log_delay")]
    pub log_delay_ms: u64,

    /// 采样历史容量
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// 连续未决轮询上限，0 表示不限
    #[serde(default = "default_max_inconclusive")]
    pub max_inconclusive_polls: u32,

    /// 连续未决轮询告警阈值，0 表示不告警
    #[serde(default = "default_warn_after")]
    pub warn_after_inconclusive: u32,

    /// 事件通道容量
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_log_delay() -> u64 {
    600
}

fn default_history_capacity() -> usize {
    15
}

fn default_max_inconclusive() -> u32 {
    24 // 默认间隔下约 2 分钟
}

fn default_warn_after() -> u32 {
    3
}

fn default_event_buffer() -> usize {
    256
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            log_delay_ms: default_log_delay(),
            history_capacity: default_history_capacity(),
            max_inconclusive_polls: default_max_inconclusive(),
            warn_after_inconclusive: default_warn_after(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl MonitorConfig {
    /// 转换为会话配置
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            log_delay: Duration::from_millis(self.log_delay_ms),
            history_capacity: self.history_capacity,
            poll_limits: PollLimits {
                max_inconclusive: non_zero(self.max_inconclusive_polls),
                warn_after: non_zero(self.warn_after_inconclusive),
            },
            event_buffer: self.event_buffer,
        }
    }
}

fn non_zero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.api.timeout_secs, 120);
        assert_eq!(config.monitor.poll_interval_ms, 5000);
        assert_eq!(config.monitor.log_delay_ms, 600);
        assert_eq!(config.monitor.history_capacity, 15);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_session_config_mapping() {
        let session = MonitorConfig::default().session_config();
        assert_eq!(session.poll_interval, Duration::from_secs(5));
        assert_eq!(session.log_delay, Duration::from_millis(600));
        assert_eq!(session.poll_limits, PollLimits::default());
        assert_eq!(session.event_buffer, 256);
    }

    #[test]
    fn test_zero_limits_mean_unlimited() {
        let config = MonitorConfig {
            max_inconclusive_polls: 0,
            warn_after_inconclusive: 0,
            ..Default::default()
        };
        let limits = config.session_config().poll_limits;
        assert_eq!(limits.max_inconclusive, None);
        assert_eq!(limits.warn_after, None);
    }

    #[test]
    fn test_http_config() {
        let api = ApiConfig {
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let http = api.http_config();
        assert_eq!(http.base_url, "http://127.0.0.1:5000");
        assert_eq!(http.auth_token.as_deref(), Some("secret"));
    }
}
