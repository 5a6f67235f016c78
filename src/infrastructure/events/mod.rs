//! Events - 视图层事件推送

mod publisher;

pub use publisher::{EventPublisher, MonitorEvent};
