//! Server API Adapter - 远程主机接口实现

mod http_server_api;
mod scripted_server_api;

pub use http_server_api::{HttpServerApi, HttpServerApiConfig};
pub use scripted_server_api::ScriptedServerApi;
