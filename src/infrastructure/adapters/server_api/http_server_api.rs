//! HTTP Server API - 调用远程主机的 HTTP 接口
//!
//! 实现 ServerApiPort trait
//!
//! 远程接口:
//! GET  {base_url}/api/serverdetails      轻量指标
//! GET  {base_url}/api/healthcheck        完整健康检查
//! POST {base_url}/api/cleartemp          清理临时文件
//! POST {base_url}/api/installupdates     安装更新
//! GET  {base_url}/api/taskstatus/{id}    异步任务状态
//!
//! 响应均为 JSON: `{"status": "success"|"error", "message"?, "taskId"?, ...}`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::application::ports::{
    ApiError, OperationRequest, ServerApiPort, ServerReply, TaskStatusReply,
};

/// HTTP 客户端配置
#[derive(Debug, Clone)]
pub struct HttpServerApiConfig {
    /// 远程主机基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// Bearer 令牌（由外部认证组件签发）
    pub auth_token: Option<String>,
}

impl Default for HttpServerApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 120,
            auth_token: None,
        }
    }
}

impl HttpServerApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// HTTP 服务器接口客户端
pub struct HttpServerApi {
    client: Client,
    config: HttpServerApiConfig,
}

impl HttpServerApi {
    pub fn new(config: HttpServerApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 任务 ID 作为单个路径段编码
    fn task_status_url(&self, task_id: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.url("/api/taskstatus"))
            .map_err(|e| ApiError::Network(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Network("Base URL cannot carry a path".to_string()))?
            .push(task_id);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_send_error)?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        request: &OperationRequest,
    ) -> Result<T, ApiError> {
        tracing::debug!(url = %url, has_params = request.params.is_some(), "POST");
        let mut builder = self.authorize(self.client.post(url));
        if let Some(params) = &request.params {
            builder = builder.json(params);
        }
        let response = builder.send().await.map_err(map_send_error)?;
        decode(response).await
    }
}

fn map_send_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_connect() {
        ApiError::Network(format!("Cannot connect to server: {}", e))
    } else {
        ApiError::Network(e.to_string())
    }
}

/// 非 2xx 视为传输错误；响应体若是 `{"message": ...}` 则取其消息
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::InvalidResponse(e.to_string())
        }
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ServerApiPort for HttpServerApi {
    async fn fetch_light_metrics(&self) -> Result<ServerReply, ApiError> {
        self.get(&self.url("/api/serverdetails")).await
    }

    async fn run_health_check(&self, _request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.get(&self.url("/api/healthcheck")).await
    }

    async fn run_cleanup(&self, request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.post(&self.url("/api/cleartemp"), request).await
    }

    async fn run_install_updates(&self, request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.post(&self.url("/api/installupdates"), request).await
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReply, ApiError> {
        let url = self.task_status_url(task_id)?;
        self.get(url.as_str()).await
    }
}
