//! Monitor - 监控引擎
//!
//! - playback: 日志逐条回放
//! - poller: 异步任务状态轮询
//! - session: 组合以上组件的监控会话

mod playback;
mod poller;
mod session;

pub use playback::{LogPlayback, PlaybackOutcome};
pub use poller::{PollEvent, PollLimits, TaskPoller};
pub use session::{MonitoringSession, SessionConfig};
