//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（healthwatch.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::DEFAULT_HISTORY_CAPACITY;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["healthwatch", "healthwatch.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "HEALTHWATCH";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `HEALTHWATCH_`，层级分隔符 `__`）
/// 2. 配置文件（healthwatch.toml 或 healthwatch.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `HEALTHWATCH_API__BASE_URL=http://10.0.0.5:5000`
/// - `HEALTHWATCH_API__AUTH_TOKEN=...`
/// - `HEALTHWATCH_MONITOR__POLL_INTERVAL_MS=2000`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    builder = builder
        .set_default("api.base_url", "http://127.0.0.1:5000")?
        .set_default("api.timeout_secs", 120)?
        .set_default("monitor.poll_interval_ms", 5000)?
        .set_default("monitor.log_delay_ms", 600)?
        .set_default("monitor.history_capacity", 15)?
        .set_default("monitor.max_inconclusive_polls", 24)?
        .set_default("monitor.warn_after_inconclusive", 3)?
        .set_default("monitor.event_buffer", 256)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 例如: HEALTHWATCH_MONITOR__LOG_DELAY_MS=300
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.api.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "API base URL cannot be empty".to_string(),
        ));
    }

    if config.monitor.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Poll interval cannot be 0".to_string(),
        ));
    }

    if config.monitor.history_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "History capacity cannot be 0".to_string(),
        ));
    }

    if config.monitor.history_capacity > DEFAULT_HISTORY_CAPACITY {
        return Err(ConfigError::ValidationError(format!(
            "History capacity cannot exceed {}",
            DEFAULT_HISTORY_CAPACITY
        )));
    }

    if config.monitor.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "Event buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Healthwatch Configuration ===");
    tracing::info!("API Base URL: {}", config.api.base_url);
    tracing::info!("API Timeout: {}s", config.api.timeout_secs);
    tracing::info!("API Auth Token: {}", if config.api.auth_token.is_some() { "set" } else { "none" });
    tracing::info!("Poll Interval: {}ms", config.monitor.poll_interval_ms);
    tracing::info!("Log Delay: {}ms", config.monitor.log_delay_ms);
    tracing::info!("History Capacity: {}", config.monitor.history_capacity);
    tracing::info!(
        "Max Inconclusive Polls: {}",
        match config.monitor.max_inconclusive_polls {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        }
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
