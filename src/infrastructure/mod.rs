//! Infrastructure Layer - 基础设施层
//!
//! 提供端口的具体实现与监控引擎

pub mod adapters;
pub mod events;
pub mod monitor;

pub use adapters::{HttpServerApi, HttpServerApiConfig, ScriptedServerApi};
pub use events::{EventPublisher, MonitorEvent};
pub use monitor::{MonitoringSession, SessionConfig};
