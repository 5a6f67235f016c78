//! Scripted Server API - 用于测试的服务器接口
//!
//! 按预先排队的响应逐个返回，不发起网络请求；队列为空时返回网络错误

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{
    ApiError, OperationRequest, ServerApiPort, ServerReply, TaskStatusReply,
};
use crate::domain::OperationKind;

type Queue<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// 脚本化服务器接口
#[derive(Default)]
pub struct ScriptedServerApi {
    light: Queue<ServerReply>,
    operations: Mutex<HashMap<OperationKind, VecDeque<Result<ServerReply, ApiError>>>>,
    statuses: Queue<TaskStatusReply>,
    /// 每次调用的模拟延迟
    latency: Duration,
    requests: Mutex<Vec<(OperationKind, OperationRequest)>>,
    light_calls: AtomicUsize,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedServerApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_light(&self, reply: Result<ServerReply, ApiError>) {
        self.light.lock().push_back(reply);
    }

    pub fn push_operation(&self, kind: OperationKind, reply: Result<ServerReply, ApiError>) {
        self.operations
            .lock()
            .entry(kind)
            .or_default()
            .push_back(reply);
    }

    pub fn push_status(&self, reply: Result<TaskStatusReply, ApiError>) {
        self.statuses.lock().push_back(reply);
    }

    pub fn light_calls(&self) -> usize {
        self.light_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// 已收到的操作请求（按调用顺序）
    pub fn operation_requests(&self) -> Vec<(OperationKind, OperationRequest)> {
        self.requests.lock().clone()
    }

    /// 同时在途调用数的最大值
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, reply: Option<Result<T, ApiError>>) -> Result<T, ApiError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        reply.unwrap_or_else(|| Err(ApiError::Network("no scripted reply".to_string())))
    }

    async fn operation(
        &self,
        kind: OperationKind,
        request: &OperationRequest,
    ) -> Result<ServerReply, ApiError> {
        self.requests.lock().push((kind, request.clone()));
        let reply = self
            .operations
            .lock()
            .get_mut(&kind)
            .and_then(|queue| queue.pop_front());
        self.respond(reply).await
    }
}

/// 在途计数，调用被取消时同样递减
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServerApiPort for ScriptedServerApi {
    async fn fetch_light_metrics(&self) -> Result<ServerReply, ApiError> {
        self.light_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.light.lock().pop_front();
        self.respond(reply).await
    }

    async fn run_health_check(&self, request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.operation(OperationKind::HealthCheck, request).await
    }

    async fn run_cleanup(&self, request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.operation(OperationKind::Cleanup, request).await
    }

    async fn run_install_updates(&self, request: &OperationRequest) -> Result<ServerReply, ApiError> {
        self.operation(OperationKind::InstallUpdates, request).await
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReply, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(task_id = %task_id, "ScriptedServerApi: task status");
        let reply = self.statuses.lock().pop_front();
        self.respond(reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServerReport;

    #[tokio::test]
    async fn test_replies_in_queue_order() {
        let api = ScriptedServerApi::new();
        api.push_operation(OperationKind::Cleanup, Ok(ServerReply::accepted("T1")));
        api.push_operation(OperationKind::Cleanup, Ok(ServerReply::error("busy")));

        let request = OperationRequest::default();
        let first = api.run_operation(OperationKind::Cleanup, &request).await.unwrap();
        assert_eq!(first.task_id.as_deref(), Some("T1"));
        let second = api.run_operation(OperationKind::Cleanup, &request).await.unwrap();
        assert_eq!(second.domain_error().as_deref(), Some("busy"));
        assert_eq!(api.operation_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_queue_is_network_error() {
        let api = ScriptedServerApi::new();
        api.push_light(Ok(ServerReply::success(ServerReport::default())));

        assert!(api.fetch_light_metrics().await.is_ok());
        assert!(matches!(
            api.fetch_light_metrics().await,
            Err(ApiError::Network(_))
        ));
        assert!(matches!(
            api.get_task_status("T1").await,
            Err(ApiError::Network(_))
        ));
        assert_eq!(api.light_calls(), 2);
        assert_eq!(api.status_calls(), 1);
        assert_eq!(api.max_in_flight(), 1);
    }
}
