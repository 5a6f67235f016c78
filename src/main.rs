//! Healthwatch - 远程主机健康监控
//!
//! 用法: healthwatch [health-check|cleanup|install-updates]
//!
//! 启动后先做一次轻量刷新；若给出操作名则运行该操作并等待其结束。

use std::sync::Arc;

use healthwatch::application::ports::OperationRequest;
use healthwatch::config::{load_config, print_config};
use healthwatch::domain::OperationKind;
use healthwatch::infrastructure::adapters::HttpServerApi;
use healthwatch::infrastructure::events::MonitorEvent;
use healthwatch::infrastructure::monitor::MonitoringSession;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},healthwatch={}", config.log.level, config.log.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("Healthwatch - 远程主机健康监控");
    print_config(&config);

    let operation = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<OperationKind>())
        .transpose()?;

    let api = Arc::new(HttpServerApi::new(config.api.http_config())?);
    let session = MonitoringSession::new(api, config.monitor.session_config());
    let logger = tokio::spawn(log_events(session.subscribe()?));

    let work = async {
        session.run_light_refresh().await?;
        if let Some(kind) = operation {
            // 句柄在终态事件发出后完成
            session
                .run_operation(kind, OperationRequest::default())?
                .await?;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        result = work => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    session.teardown();
    let _ = logger.await;

    tracing::info!(
        samples = session.history().len(),
        "Healthwatch shutdown complete"
    );

    Ok(())
}

/// 记录会话发出的每个事件，直到会话销毁
async fn log_events(mut events: broadcast::Receiver<MonitorEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                tracing::info!(event = event.name(), payload = %payload, "Monitor event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
