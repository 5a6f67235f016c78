//! Monitoring Session - 监控会话
//!
//! 组合轮询器、日志回放器与采样历史，对视图层只暴露事件流。
//!
//! 两类操作:
//! - 轻量刷新: 一次请求，追加历史，发出 `Refreshed`
//! - 维护操作: 触发请求；内联结果直接回放日志，任务 ID 则先轮询到终态再回放，
//!   最后追加历史并发出 `OperationCompleted`
//!
//! 所有失败都转为 `OperationFailed` 事件，不自动重试。

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::playback::LogPlayback;
use super::poller::{PollEvent, PollLimits, TaskPoller};
use crate::application::ports::{ApiError, OperationRequest, ServerApiPort, ServerReply};
use crate::application::MonitorError;
use crate::domain::{
    LogEntry, Metrics, OperationKind, Sample, SampleHistory, ServerReport, TaskState,
    DEFAULT_HISTORY_CAPACITY,
};
use crate::infrastructure::events::{EventPublisher, MonitorEvent};

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 任务状态轮询间隔
    pub poll_interval: Duration,
    /// 日志回放间隔
    pub log_delay: Duration,
    pub history_capacity: usize,
    pub poll_limits: PollLimits,
    /// 事件通道容量
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            log_delay: Duration::from_millis(600),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            poll_limits: PollLimits::default(),
            event_buffer: 256,
        }
    }
}

/// 监控会话
///
/// 销毁（`teardown` 或 drop）后不再发出任何事件
pub struct MonitoringSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    config: SessionConfig,
    api: Arc<dyn ServerApiPort>,
    publisher: EventPublisher,
    poller: TaskPoller,
    playback: LogPlayback,
    history: Mutex<SampleHistory>,
    last_result: Mutex<Option<ServerReport>>,
    busy: AtomicBool,
    shutdown: CancellationToken,
    operation: Mutex<Option<AbortHandle>>,
    started: Instant,
}

impl MonitoringSession {
    pub fn new(api: Arc<dyn ServerApiPort>, config: SessionConfig) -> Self {
        let inner = SessionInner {
            id: Uuid::new_v4(),
            publisher: EventPublisher::new(config.event_buffer),
            poller: TaskPoller::new(api.clone(), config.poll_limits),
            playback: LogPlayback::new(),
            history: Mutex::new(SampleHistory::new(config.history_capacity)),
            last_result: Mutex::new(None),
            busy: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            operation: Mutex::new(None),
            started: Instant::now(),
            api,
            config,
        };
        tracing::info!(session_id = %inner.id, "Monitoring session created");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// 订阅事件
    pub fn subscribe(&self) -> Result<broadcast::Receiver<MonitorEvent>, MonitorError> {
        self.inner
            .publisher
            .subscribe()
            .ok_or(MonitorError::SessionClosed)
    }

    /// 轻量刷新
    ///
    /// 不经过轮询器和回放器；失败以事件形式报告
    pub async fn run_light_refresh(&self) -> Result<(), MonitorError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(MonitorError::SessionClosed);
        }

        tracing::debug!(session_id = %inner.id, "Light refresh");
        let result = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => return Ok(()),
            result = inner.api.fetch_light_metrics() => result,
        };

        match check_reply(result) {
            Ok(reply) => {
                let report = reply.report;
                inner.remember(&report);
                inner.append_history(report.metrics.as_ref());
                inner.publisher.publish(MonitorEvent::Refreshed { report });
            }
            Err(e) => inner.fail(None, &e),
        }
        Ok(())
    }

    /// 开始一次维护操作
    ///
    /// 已有操作进行中时同步返回 `AlreadyRunning`，不排队。
    /// 返回的句柄在操作的终态事件发出后完成。
    pub fn run_operation(
        &self,
        kind: OperationKind,
        request: OperationRequest,
    ) -> Result<JoinHandle<()>, MonitorError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(MonitorError::SessionClosed);
        }
        if inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(session_id = %inner.id, kind = %kind, "Operation rejected, session busy");
            return Err(MonitorError::AlreadyRunning);
        }

        let guard = BusyGuard(inner.clone());
        let runner = inner.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = runner.shutdown.cancelled() => {}
                _ = runner.drive(kind, request) => {}
            }
        });
        *inner.operation.lock() = Some(handle.abort_handle());

        Ok(handle)
    }

    /// 销毁会话（幂等）
    ///
    /// 返回后保证不再发出任何事件
    pub fn teardown(&self) {
        let inner = &self.inner;
        let first = !inner.shutdown.is_cancelled();
        inner.shutdown.cancel();
        inner.publisher.close();
        inner.poller.cancel();
        inner.playback.cancel();
        if let Some(handle) = inner.operation.lock().take() {
            handle.abort();
        }
        if first {
            tracing::info!(session_id = %inner.id, "Monitoring session torn down");
        }
    }

    /// 清空采样历史（登出/重置时使用）
    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    pub fn task_state(&self) -> TaskState {
        self.inner.poller.state()
    }

    pub fn history(&self) -> Vec<Sample> {
        self.inner.history.lock().snapshot()
    }

    /// 最近一次完整数据（包括轮询中的部分数据）
    pub fn last_result(&self) -> Option<ServerReport> {
        self.inner.last_result.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Drop for MonitoringSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// 操作结束时释放忙标记
struct BusyGuard(Arc<SessionInner>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

/// 同时检查传输层与业务层结果
fn check_reply(result: Result<ServerReply, ApiError>) -> Result<ServerReply, MonitorError> {
    let reply = result?;
    match reply.domain_error() {
        Some(message) => Err(MonitorError::Domain(message)),
        None => Ok(reply),
    }
}

impl SessionInner {
    fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn drive(&self, kind: OperationKind, request: OperationRequest) {
        tracing::info!(session_id = %self.id, kind = %kind, "Operation started");

        let reply = match check_reply(self.api.run_operation(kind, &request).await) {
            Ok(reply) => reply,
            Err(e) => return self.fail(Some(kind), &e),
        };

        match reply.task_id {
            Some(task_id) => self.follow_task(kind, &task_id).await,
            None => self.complete(kind, reply.report).await,
        }
    }

    /// 异步后端：轮询到终态后与内联结果走同样的收尾流程
    async fn follow_task(&self, kind: OperationKind, task_id: &str) {
        let mut events = match self.poller.start(task_id, self.config.poll_interval) {
            Ok(rx) => rx,
            Err(e) => return self.fail(Some(kind), &e),
        };

        while let Some(event) = events.recv().await {
            match event {
                PollEvent::Progress { data, .. } => {
                    let logs = match data {
                        Some(data) => {
                            self.remember(&data);
                            data.logs
                        }
                        None => Vec::new(),
                    };
                    self.publisher.publish(MonitorEvent::TaskProgress {
                        task_id: task_id.to_string(),
                        state: TaskState::Running,
                        logs,
                    });
                }
                PollEvent::Degraded { consecutive, .. } => {
                    self.publisher.publish(MonitorEvent::PollingDegraded {
                        task_id: task_id.to_string(),
                        consecutive_failures: consecutive,
                    });
                }
                PollEvent::Finished {
                    state: TaskState::Complete,
                    data,
                } => {
                    return self.complete(kind, data.unwrap_or_default()).await;
                }
                PollEvent::Finished { data, .. } => {
                    let report = data.unwrap_or_default();
                    if !self.reveal(&report.logs).await {
                        return;
                    }
                    self.remember(&report);
                    let error = MonitorError::TaskFailed {
                        task_id: task_id.to_string(),
                        message: report
                            .message
                            .unwrap_or_else(|| "remote task reported failure".to_string()),
                    };
                    return self.fail(Some(kind), &error);
                }
                PollEvent::TimedOut { attempts } => {
                    let error = MonitorError::PollingTimeout {
                        task_id: task_id.to_string(),
                        attempts,
                    };
                    return self.fail(Some(kind), &error);
                }
            }
        }

        tracing::debug!(session_id = %self.id, task_id = %task_id, "Polling stopped without terminal state");
    }

    /// 回放日志 -> 追加历史 -> 完成
    async fn complete(&self, kind: OperationKind, report: ServerReport) {
        if !self.reveal(&report.logs).await {
            return;
        }
        self.remember(&report);
        self.append_history(report.metrics.as_ref());

        tracing::info!(
            session_id = %self.id,
            kind = %kind,
            logs = report.logs.len(),
            "Operation completed"
        );
        self.publisher
            .publish(MonitorEvent::OperationCompleted { kind, report });
    }

    /// 逐条展示日志，被取消时返回 false
    async fn reveal(&self, logs: &[LogEntry]) -> bool {
        let outcome = self
            .playback
            .play(logs, self.config.log_delay, |index, entry| {
                tracing::debug!(session_id = %self.id, index = index, "Log entry revealed");
                self.publisher.publish(MonitorEvent::LogEntryRevealed {
                    index,
                    entry: entry.clone(),
                });
            })
            .await;
        outcome.is_completed()
    }

    fn remember(&self, report: &ServerReport) {
        *self.last_result.lock() = Some(report.clone());
    }

    /// 指标可用时追加采样并发布快照
    fn append_history(&self, metrics: Option<&Metrics>) {
        let Some(metrics) = metrics else {
            return;
        };
        let timestamp = self.started.elapsed().as_millis() as u64;
        let Some(sample) = Sample::from_metrics(metrics, timestamp, Utc::now()) else {
            tracing::debug!(session_id = %self.id, "Metrics lack memory totals, sample skipped");
            return;
        };

        let samples = {
            let mut history = self.history.lock();
            history.append(sample);
            history.snapshot()
        };
        self.publisher
            .publish(MonitorEvent::HistoryAppended { samples });
    }

    fn fail(&self, kind: Option<OperationKind>, error: &MonitorError) {
        tracing::warn!(
            session_id = %self.id,
            kind = ?kind,
            error = %error,
            "Operation failed"
        );
        self.publisher.publish(MonitorEvent::OperationFailed {
            kind,
            reason: error.to_string(),
            soft: error.is_soft(),
        });
    }
}
