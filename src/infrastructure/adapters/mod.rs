//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod server_api;

pub use server_api::*;
