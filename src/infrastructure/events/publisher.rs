//! Event Publisher Implementation
//!
//! 监控会话向视图层推送事件

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::{LogEntry, OperationKind, Sample, ServerReport, TaskState};

/// 视图层事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// 轻量刷新完成
    Refreshed { report: ServerReport },

    /// 日志回放展示一条日志，`index` 为本轮回放内的序号
    #[serde(rename_all = "camelCase")]
    LogEntryRevealed { index: usize, entry: LogEntry },

    /// 历史追加后的完整快照
    HistoryAppended { samples: Vec<Sample> },

    /// 异步任务轮询到非终态，附带目前已产生的日志
    #[serde(rename_all = "camelCase")]
    TaskProgress {
        task_id: String,
        state: TaskState,
        logs: Vec<LogEntry>,
    },

    /// 连续未决轮询达到告警阈值，任务状态不变
    #[serde(rename_all = "camelCase")]
    PollingDegraded {
        task_id: String,
        consecutive_failures: u32,
    },

    /// 操作完成
    OperationCompleted {
        kind: OperationKind,
        report: ServerReport,
    },

    /// 操作或刷新失败；`kind` 为空表示轻量刷新
    OperationFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<OperationKind>,
        reason: String,
        soft: bool,
    },
}

impl MonitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::Refreshed { .. } => "refreshed",
            MonitorEvent::LogEntryRevealed { .. } => "logEntryRevealed",
            MonitorEvent::HistoryAppended { .. } => "historyAppended",
            MonitorEvent::TaskProgress { .. } => "taskProgress",
            MonitorEvent::PollingDegraded { .. } => "pollingDegraded",
            MonitorEvent::OperationCompleted { .. } => "operationCompleted",
            MonitorEvent::OperationFailed { .. } => "operationFailed",
        }
    }

    /// 操作的最后一个事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorEvent::OperationCompleted { .. } | MonitorEvent::OperationFailed { .. }
        )
    }
}

/// 事件发布器
///
/// 关闭后不再发出任何事件；`close` 返回时保证没有发送仍在进行
pub struct EventPublisher {
    sender: Mutex<Option<broadcast::Sender<MonitorEvent>>>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
        }
    }

    /// 订阅事件；已关闭时返回 None
    pub fn subscribe(&self) -> Option<broadcast::Receiver<MonitorEvent>> {
        self.sender.lock().as_ref().map(|tx| tx.subscribe())
    }

    /// 发布事件，返回是否已交付给发布通道
    pub fn publish(&self, event: MonitorEvent) -> bool {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            tracing::debug!(event = event.name(), "Publisher closed, dropping event");
            return false;
        };
        if let Err(e) = tx.send(event) {
            tracing::debug!(
                event = e.0.name(),
                "Failed to publish event (no receivers)"
            );
        }
        true
    }

    /// 关闭发布器（幂等）
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!("Event publisher closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
