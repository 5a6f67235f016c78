//! Log Playback - 日志逐条回放
//!
//! 按固定间隔逐条展示一批日志，可随时取消；同一时刻最多一轮回放有效

use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::LogEntry;

/// 回放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// 全部展示且最后一条的停留时间已过
    Completed { emitted: usize },
    /// 被取消或被新一轮回放取代
    Cancelled { emitted: usize },
}

impl PlaybackOutcome {
    pub fn emitted(&self) -> usize {
        match self {
            PlaybackOutcome::Completed { emitted } | PlaybackOutcome::Cancelled { emitted } => *emitted,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PlaybackOutcome::Completed { .. })
    }
}

#[derive(Default)]
struct PlaybackState {
    /// 每轮回放（以及每次取消）递增
    generation: u64,
    token: Option<CancellationToken>,
}

/// 日志回放器
///
/// 只负责时序与顺序，不理解日志语义
#[derive(Default)]
pub struct LogPlayback {
    state: Mutex<PlaybackState>,
}

impl LogPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回放一批日志
    ///
    /// 第一条立即展示，之后每条间隔 `delay`；最后一条展示后再停留 `delay` 才返回。
    /// 若已有回放在进行，先取消它。`emit` 在内部锁内调用，不能回调本回放器。
    pub async fn play<F>(&self, entries: &[LogEntry], delay: Duration, mut emit: F) -> PlaybackOutcome
    where
        F: FnMut(usize, &LogEntry),
    {
        let (generation, token) = self.begin();
        tracing::debug!(
            generation = generation,
            entries = entries.len(),
            delay_ms = delay.as_millis() as u64,
            "Log playback started"
        );

        for (index, entry) in entries.iter().enumerate() {
            if index > 0 && !hold(&token, delay).await {
                return PlaybackOutcome::Cancelled { emitted: index };
            }

            {
                let state = self.state.lock();
                if state.generation != generation {
                    return PlaybackOutcome::Cancelled { emitted: index };
                }
                emit(index, entry);
            }
        }

        if !entries.is_empty() && !hold(&token, delay).await {
            return PlaybackOutcome::Cancelled {
                emitted: entries.len(),
            };
        }

        self.finish(generation);
        PlaybackOutcome::Completed {
            emitted: entries.len(),
        }
    }

    /// 取消当前回放（幂等）；已展示的日志不撤回
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(token) = state.token.take() {
            token.cancel();
            tracing::debug!("Log playback cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().token.is_some()
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut state = self.state.lock();
        if let Some(previous) = state.token.take() {
            previous.cancel();
            tracing::debug!("Previous log playback superseded");
        }
        state.generation += 1;
        let token = CancellationToken::new();
        state.token = Some(token.clone());
        (state.generation, token)
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.token = None;
        }
    }
}

/// 等待 `delay`，期间被取消则返回 false
async fn hold(token: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLevel;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn entries(n: usize) -> Vec<LogEntry> {
        (0..n)
            .map(|i| LogEntry::new(format!("t{}", i), LogLevel::Info, format!("step{}", i)))
            .collect()
    }

    type Recorded = Arc<Mutex<Vec<(usize, String, Instant)>>>;

    fn recorder() -> (Recorded, impl FnMut(usize, &LogEntry)) {
        let log: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |i: usize, e: &LogEntry| {
            sink.lock().push((i, e.message.clone(), Instant::now()))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_in_order_at_fixed_cadence() {
        let playback = LogPlayback::new();
        let (log, emit) = recorder();
        let start = Instant::now();

        let outcome = playback.play(&entries(4), Duration::from_millis(600), emit).await;

        assert_eq!(outcome, PlaybackOutcome::Completed { emitted: 4 });
        let log = log.lock();
        let indices: Vec<usize> = log.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(log[0].1, "step0");
        assert_eq!(log[0].2 - start, Duration::ZERO);
        assert_eq!(log[3].2 - log[0].2, Duration::from_millis(1800));
        for pair in log.windows(2) {
            assert!(pair[1].2 >= pair[0].2);
        }
        // 最后一条还要停留一个间隔
        assert_eq!(start.elapsed(), Duration::from_millis(2400));
        assert!(!playback.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_completes_immediately() {
        let playback = LogPlayback::new();
        let (log, emit) = recorder();
        let start = Instant::now();

        let outcome = playback.play(&[], Duration::from_millis(600), emit).await;

        assert_eq!(outcome, PlaybackOutcome::Completed { emitted: 0 });
        assert!(log.lock().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_emits_everything() {
        let playback = LogPlayback::new();
        let (log, emit) = recorder();

        let outcome = playback.play(&entries(3), Duration::ZERO, emit).await;

        assert!(outcome.is_completed());
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_emissions() {
        let playback = Arc::new(LogPlayback::new());
        let (log, emit) = recorder();

        let runner = {
            let playback = playback.clone();
            tokio::spawn(async move {
                playback
                    .play(&entries(5), Duration::from_millis(100), emit)
                    .await
            })
        };

        // 第 0、1 条已展示（t=0, t=100）
        tokio::time::sleep(Duration::from_millis(150)).await;
        playback.cancel();
        let outcome = runner.await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Cancelled { emitted: 2 });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(log.lock().len(), 2);

        // 取消后重新回放从 0 开始
        let (fresh, emit) = recorder();
        let outcome = playback.play(&entries(2), Duration::from_millis(100), emit).await;
        assert!(outcome.is_completed());
        let indices: Vec<usize> = fresh.lock().iter().map(|(i, _, _)| *i).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_play_supersedes_previous() {
        let playback = Arc::new(LogPlayback::new());
        let shared: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let playback = playback.clone();
            let shared = shared.clone();
            tokio::spawn(async move {
                let batch: Vec<LogEntry> = (0..5)
                    .map(|i| LogEntry::new("t", LogLevel::Info, format!("a{}", i)))
                    .collect();
                playback
                    .play(&batch, Duration::from_millis(100), |_, e| {
                        shared.lock().push(e.message.clone())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;

        let batch: Vec<LogEntry> = (0..2)
            .map(|i| LogEntry::new("t", LogLevel::Info, format!("b{}", i)))
            .collect();
        let sink = shared.clone();
        let second = playback
            .play(&batch, Duration::from_millis(100), |_, e| {
                sink.lock().push(e.message.clone())
            })
            .await;

        assert!(second.is_completed());
        assert_eq!(first.await.unwrap(), PlaybackOutcome::Cancelled { emitted: 2 });
        assert_eq!(*shared.lock(), vec!["a0", "a1", "b0", "b1"]);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let playback = LogPlayback::new();
        let outcome = playback.play(&entries(1), Duration::ZERO, |_, _| {}).await;
        assert!(outcome.is_completed());
        playback.cancel();
        playback.cancel();
        assert!(!playback.is_active());
    }
}
