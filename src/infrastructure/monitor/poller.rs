//! Task Poller - 远程任务状态轮询
//!
//! 以固定节奏查询任务状态直到终态或被取消。同一任务不会有两个未完成的查询；
//! 取消后在途查询的结果直接丢弃。

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ApiError, ServerApiPort};
use crate::application::MonitorError;
use crate::domain::{ServerReport, TaskState};

/// 轮询限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    /// 连续未决轮询上限，None 表示不限
    pub max_inconclusive: Option<u32>,
    /// 连续未决轮询达到该值时发出一次告警，None 表示不告警
    pub warn_after: Option<u32>,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            max_inconclusive: Some(24),
            warn_after: Some(3),
        }
    }
}

/// 轮询器向会话报告的事件
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// 非终态响应，附带可能存在的部分数据
    Progress {
        attempt: u32,
        data: Option<ServerReport>,
    },
    /// 连续未决次数达到告警阈值
    Degraded { consecutive: u32, error: ApiError },
    /// 终态响应，之后不再轮询
    Finished {
        state: TaskState,
        data: Option<ServerReport>,
    },
    /// 未决次数超限，轮询放弃
    TimedOut { attempts: u32 },
}

#[derive(Default)]
struct PollerState {
    state: TaskState,
    task_id: Option<String>,
    /// 每次 start / cancel 递增，旧轮次的结果据此丢弃
    generation: u64,
    token: Option<CancellationToken>,
}

/// 任务轮询器
pub struct TaskPoller {
    api: Arc<dyn ServerApiPort>,
    limits: PollLimits,
    shared: Arc<Mutex<PollerState>>,
}

impl TaskPoller {
    pub fn new(api: Arc<dyn ServerApiPort>, limits: PollLimits) -> Self {
        Self {
            api,
            limits,
            shared: Arc::new(Mutex::new(PollerState::default())),
        }
    }

    /// 开始轮询
    ///
    /// 首次查询在一个间隔之后发出。已在运行时返回 `AlreadyPolling`，原轮询不受影响。
    pub fn start(
        &self,
        task_id: &str,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<PollEvent>, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::invalid_argument("poll interval must be > 0"));
        }
        if task_id.is_empty() {
            return Err(MonitorError::invalid_argument("task id cannot be empty"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (generation, token) = {
            let mut shared = self.shared.lock();
            if shared.state == TaskState::Running {
                let current = shared.task_id.clone().unwrap_or_default();
                return Err(MonitorError::AlreadyPolling(current));
            }
            shared.generation += 1;
            shared.state = TaskState::Running;
            shared.task_id = Some(task_id.to_string());
            let token = CancellationToken::new();
            shared.token = Some(token.clone());
            (shared.generation, token)
        };

        tracing::info!(
            task_id = %task_id,
            interval_ms = interval.as_millis() as u64,
            "Task polling started"
        );

        let run = PollRun {
            api: self.api.clone(),
            shared: self.shared.clone(),
            limits: self.limits,
            task_id: task_id.to_string(),
            generation,
            token,
            tx,
        };
        tokio::spawn(run.run(interval));

        Ok(rx)
    }

    /// 取消轮询（幂等），回到 Idle，不发终态事件
    pub fn cancel(&self) {
        let mut shared = self.shared.lock();
        shared.generation += 1;
        if let Some(token) = shared.token.take() {
            token.cancel();
            tracing::info!(task_id = ?shared.task_id, "Task polling cancelled");
        }
        shared.state = TaskState::Idle;
        shared.task_id = None;
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    pub fn task_id(&self) -> Option<String> {
        self.shared.lock().task_id.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state() == TaskState::Running
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 单轮轮询
struct PollRun {
    api: Arc<dyn ServerApiPort>,
    shared: Arc<Mutex<PollerState>>,
    limits: PollLimits,
    task_id: String,
    generation: u64,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<PollEvent>,
}

impl PollRun {
    async fn run(self, interval: Duration) {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        // 慢响应后顺延，不补发
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        let mut inconclusive: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            attempts += 1;
            tracing::debug!(task_id = %self.task_id, attempt = attempts, "Polling task status");

            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!(task_id = %self.task_id, "In-flight poll discarded");
                    return;
                }
                result = self.api.get_task_status(&self.task_id) => result,
            };

            let reply = match result {
                Ok(reply) => reply,
                Err(error) => {
                    inconclusive += 1;
                    if !self.on_inconclusive(inconclusive, attempts, error) {
                        return;
                    }
                    continue;
                }
            };

            match reply.status.task_state() {
                Some(TaskState::Running) => {
                    inconclusive = 0;
                    let event = PollEvent::Progress {
                        attempt: attempts,
                        data: reply.data,
                    };
                    if !self.dispatch(event, None) {
                        return;
                    }
                }
                Some(state) if state.is_terminal() => {
                    tracing::info!(
                        task_id = %self.task_id,
                        state = %state,
                        attempts = attempts,
                        "Task reached terminal state"
                    );
                    let event = PollEvent::Finished {
                        state,
                        data: reply.data,
                    };
                    self.dispatch(event, Some(state));
                    return;
                }
                _ => {
                    inconclusive += 1;
                    let error =
                        ApiError::InvalidResponse("unrecognised task status".to_string());
                    if !self.on_inconclusive(inconclusive, attempts, error) {
                        return;
                    }
                }
            }
        }
    }

    /// 处理一次未决轮询，返回是否继续
    fn on_inconclusive(&self, consecutive: u32, attempts: u32, error: ApiError) -> bool {
        tracing::warn!(
            task_id = %self.task_id,
            attempt = attempts,
            consecutive = consecutive,
            error = %error,
            "Task status poll inconclusive"
        );

        if self.limits.warn_after == Some(consecutive) {
            let event = PollEvent::Degraded { consecutive, error };
            if !self.dispatch(event, None) {
                return false;
            }
        }

        if let Some(max) = self.limits.max_inconclusive {
            if consecutive >= max {
                tracing::warn!(
                    task_id = %self.task_id,
                    attempts = attempts,
                    "Giving up on task status polling"
                );
                self.dispatch(PollEvent::TimedOut { attempts }, Some(TaskState::Idle));
                return false;
            }
        }

        true
    }

    /// 在锁内校验轮次后发送事件，可选地更新状态；轮次已失效返回 false
    fn dispatch(&self, event: PollEvent, new_state: Option<TaskState>) -> bool {
        let mut shared = self.shared.lock();
        if shared.generation != self.generation || self.token.is_cancelled() {
            return false;
        }
        if let Some(state) = new_state {
            shared.state = state;
            shared.token = None;
            if state == TaskState::Idle {
                shared.task_id = None;
            }
        }
        self.tx.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::TaskStatusReply;
    use crate::domain::{LogEntry, LogLevel, RemoteTaskStatus};
    use crate::infrastructure::adapters::ScriptedServerApi;

    fn report(logs: usize) -> ServerReport {
        ServerReport {
            logs: (0..logs)
                .map(|i| LogEntry::new("t", LogLevel::Info, format!("line{}", i)))
                .collect(),
            ..Default::default()
        }
    }

    fn poller(api: &Arc<ScriptedServerApi>, limits: PollLimits) -> TaskPoller {
        TaskPoller::new(api.clone(), limits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_terminal() {
        let api = Arc::new(ScriptedServerApi::new());
        for _ in 0..3 {
            api.push_status(Ok(TaskStatusReply::running()));
        }
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Complete,
            report(2),
        )));

        let poller = poller(&api, PollLimits::default());
        let start = Instant::now();
        let mut rx = poller.start("T1", Duration::from_secs(5)).unwrap();
        assert_eq!(poller.state(), TaskState::Running);

        let mut progress = 0;
        let finished = loop {
            match rx.recv().await.unwrap() {
                PollEvent::Progress { .. } => progress += 1,
                PollEvent::Finished { state, data } => break (state, data),
                other => panic!("unexpected event {:?}", other),
            }
        };

        assert_eq!(progress, 3);
        assert_eq!(finished.0, TaskState::Complete);
        assert_eq!(finished.1.map(|d| d.logs.len()), Some(2));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(api.status_calls(), 4);
        assert_eq!(poller.state(), TaskState::Complete);

        // 终态之后不再轮询
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), 4);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_rejected() {
        let api = Arc::new(ScriptedServerApi::new());
        api.push_status(Ok(TaskStatusReply::running()));
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Failed,
            ServerReport::default(),
        )));

        let poller = poller(&api, PollLimits::default());
        let mut rx = poller.start("T1", Duration::from_secs(1)).unwrap();

        let err = poller.start("T2", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, MonitorError::AlreadyPolling("T1".to_string()));
        assert_eq!(poller.task_id().as_deref(), Some("T1"));

        // 原轮询继续
        assert!(matches!(rx.recv().await, Some(PollEvent::Progress { attempt: 1, .. })));
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Finished {
                state: TaskState::Failed,
                ..
            })
        ));
        assert_eq!(poller.state(), TaskState::Failed);

        // 终态后可以开始新任务
        assert!(poller.start("T2", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let api = Arc::new(ScriptedServerApi::new());
        let poller = poller(&api, PollLimits::default());
        assert!(matches!(
            poller.start("T1", Duration::ZERO),
            Err(MonitorError::InvalidArgument(_))
        ));
        assert_eq!(poller.state(), TaskState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_responses_never_overlap() {
        // 响应耗时超过轮询间隔
        let api = Arc::new(ScriptedServerApi::new().with_latency(Duration::from_millis(2500)));
        for _ in 0..4 {
            api.push_status(Ok(TaskStatusReply::running()));
        }
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Complete,
            ServerReport::default(),
        )));

        let poller = poller(&api, PollLimits::default());
        let mut rx = poller.start("T1", Duration::from_secs(1)).unwrap();
        while let Some(event) = rx.recv().await {
            if matches!(event, PollEvent::Finished { .. }) {
                break;
            }
        }

        assert_eq!(api.status_calls(), 5);
        assert_eq!(api.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_in_flight_result() {
        let api = Arc::new(ScriptedServerApi::new().with_latency(Duration::from_secs(2)));
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Complete,
            ServerReport::default(),
        )));

        let poller = poller(&api, PollLimits::default());
        let mut rx = poller.start("T1", Duration::from_secs(1)).unwrap();

        // 第一次查询在 t=1s 发出，t=3s 才返回
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(api.status_calls(), 1);
        poller.cancel();
        poller.cancel();
        assert_eq!(poller.state(), TaskState::Idle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
        assert_eq!(api.status_calls(), 1);
        assert_eq!(poller.state(), TaskState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_keep_cadence_then_time_out() {
        let api = Arc::new(ScriptedServerApi::new());
        let limits = PollLimits {
            max_inconclusive: Some(4),
            warn_after: Some(2),
        };
        let poller = poller(&api, limits);
        let start = Instant::now();
        let mut rx = poller.start("T1", Duration::from_secs(5)).unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Degraded { consecutive: 2, .. })
        ));
        assert_eq!(poller.state(), TaskState::Running);

        assert_eq!(rx.recv().await, Some(PollEvent::TimedOut { attempts: 4 }));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(api.status_calls(), 4);
        assert_eq!(poller.state(), TaskState::Idle);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_inconclusive_count() {
        let api = Arc::new(ScriptedServerApi::new());
        api.push_status(Err(ApiError::Network("down".to_string())));
        api.push_status(Ok(TaskStatusReply::running()));
        api.push_status(Err(ApiError::Timeout));
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Complete,
            ServerReport::default(),
        )));

        let limits = PollLimits {
            max_inconclusive: Some(2),
            warn_after: None,
        };
        let poller = poller(&api, limits);
        let mut rx = poller.start("T1", Duration::from_secs(1)).unwrap();

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(PollEvent::Finished {
                state: TaskState::Complete,
                ..
            })
        ));
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_is_inconclusive() {
        let api = Arc::new(ScriptedServerApi::new());
        api.push_status(Ok(TaskStatusReply {
            status: RemoteTaskStatus::Unknown,
            data: None,
        }));
        api.push_status(Ok(TaskStatusReply::finished(
            RemoteTaskStatus::Complete,
            ServerReport::default(),
        )));

        let limits = PollLimits {
            max_inconclusive: None,
            warn_after: Some(1),
        };
        let poller = poller(&api, limits);
        let mut rx = poller.start("T1", Duration::from_secs(1)).unwrap();

        assert!(matches!(rx.recv().await, Some(PollEvent::Degraded { consecutive: 1, .. })));
        assert!(matches!(rx.recv().await, Some(PollEvent::Finished { .. })));
    }
}
