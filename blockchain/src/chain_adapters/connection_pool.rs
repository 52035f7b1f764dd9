// Standard library imports
use std::{future::Future, sync::Mutex, time::Duration};

// Third party imports
use serde::Serialize;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

// Internal imports
use crate::chain_adapters::interfaces::ChainError;
use cesbot_common::{config::ChainSettings, error::recover};

/// Trạng thái của một RPC endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndpointStatus {
    /// Đang hoạt động tốt
    Healthy,
    /// Có lỗi gần đây nhưng vẫn được dùng
    Degraded,
    /// Bị bỏ qua đến hết thời gian cooldown
    Down,
}

/// Thông tin sức khỏe của một endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    /// URL của endpoint
    pub url: String,
    /// Trạng thái hiện tại
    pub status: EndpointStatus,
    /// Độ trễ trung bình (ms)
    pub avg_latency_ms: f64,
    /// Số lần gọi thành công
    pub success_count: u64,
    /// Số lần lỗi
    pub error_count: u64,
    /// Số lỗi liên tiếp gần nhất
    pub consecutive_failures: u32,
    #[serde(skip)]
    down_until: Option<Instant>,
}

impl EndpointInfo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: EndpointStatus::Healthy,
            avg_latency_ms: 0.0,
            success_count: 0,
            error_count: 0,
            consecutive_failures: 0,
            down_until: None,
        }
    }

    /// Cập nhật sau một request thành công
    pub fn record_success(&mut self, latency_ms: f64) {
        self.success_count += 1;
        let n = self.success_count as f64;
        self.avg_latency_ms += (latency_ms - self.avg_latency_ms) / n;
        self.consecutive_failures = 0;
        self.down_until = None;

        if self.status != EndpointStatus::Healthy {
            info!("Endpoint {} hoạt động lại bình thường", self.url);
            self.status = EndpointStatus::Healthy;
        }
    }

    /// Cập nhật sau một request lỗi
    pub fn record_error(&mut self, failure_threshold: u32, cooldown: Duration) {
        self.error_count += 1;
        self.consecutive_failures += 1;

        if self.consecutive_failures >= failure_threshold {
            self.status = EndpointStatus::Down;
            self.down_until = Some(Instant::now() + cooldown);
            warn!(
                "Endpoint {} bị đánh dấu Down sau {} lỗi liên tiếp",
                self.url, self.consecutive_failures
            );
        } else {
            self.status = EndpointStatus::Degraded;
        }
    }

    /// Endpoint có được thử không (Down hết cooldown được thử lại)
    pub fn is_available(&self) -> bool {
        match (self.status, self.down_until) {
            (EndpointStatus::Down, Some(until)) => Instant::now() >= until,
            (EndpointStatus::Down, None) => false,
            _ => true,
        }
    }
}

struct PooledEndpoint<C> {
    client: C,
    info: Mutex<EndpointInfo>,
}

/// Danh sách endpoint có thứ tự của một network.
///
/// Mỗi lời gọi thử lần lượt các endpoint theo thứ tự cấu hình, bỏ qua endpoint
/// đang Down; nếu mọi endpoint đều Down thì vẫn thử primary.
pub struct EndpointPool<C> {
    network: String,
    endpoints: Vec<PooledEndpoint<C>>,
    request_timeout: Duration,
    failure_threshold: u32,
    cooldown: Duration,
}

impl<C: Clone> EndpointPool<C> {
    /// Tạo pool từ các cặp (url, client)
    pub fn new(network: &str, clients: Vec<(String, C)>, settings: &ChainSettings) -> Self {
        let endpoints = clients
            .into_iter()
            .map(|(url, client)| PooledEndpoint {
                client,
                info: Mutex::new(EndpointInfo::new(&url)),
            })
            .collect();

        Self {
            network: network.to_string(),
            endpoints,
            request_timeout: settings.request_timeout(),
            failure_threshold: settings.failure_threshold.max(1),
            cooldown: settings.cooldown(),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Ảnh chụp sức khỏe các endpoint
    pub fn health(&self) -> Vec<EndpointInfo> {
        self.endpoints
            .iter()
            .map(|endpoint| recover(endpoint.info.lock()).clone())
            .collect()
    }

    fn candidates(&self) -> Vec<usize> {
        let available: Vec<usize> = self
            .endpoints
            .iter()
            .enumerate()
            .filter(|(_, endpoint)| recover(endpoint.info.lock()).is_available())
            .map(|(index, _)| index)
            .collect();

        if available.is_empty() && !self.endpoints.is_empty() {
            debug!("Mọi endpoint của {} đang Down, thử primary", self.network);
            vec![0]
        } else {
            available
        }
    }

    /// Thực hiện `op` trên endpoint khả dụng đầu tiên, chuyển sang endpoint kế
    /// tiếp khi lỗi kết nối, timeout hoặc lỗi RPC.
    pub async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ChainError>
    where
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        if self.endpoints.is_empty() {
            return Err(ChainError::Unsupported(format!("{} has no endpoint", self.network)));
        }

        let mut last_error = None;
        for index in self.candidates() {
            let endpoint = &self.endpoints[index];
            let started = Instant::now();

            let result = match timeout(self.request_timeout, op(endpoint.client.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ChainError::Timeout(self.request_timeout.as_millis() as u64)),
            };

            match result {
                Ok(value) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    recover(endpoint.info.lock()).record_success(latency_ms);
                    return Ok(value);
                }
                Err(e) if e.is_endpoint_fault() => {
                    let url = {
                        let mut info = recover(endpoint.info.lock());
                        info.record_error(self.failure_threshold, self.cooldown);
                        info.url.clone()
                    };
                    warn!("{} trên {} ({}) lỗi: {}", operation, self.network, url, e);
                    metrics::counter!(
                        "rpc_endpoint_failures_total",
                        1,
                        "network" => self.network.clone()
                    );
                    last_error = Some(e);
                }
                // Lỗi không do endpoint (revert, decode) thì endpoint khác cũng cho kết quả như nhau
                Err(e) => return Err(e),
            }
        }

        Err(ChainError::AllEndpointsFailed {
            network: self.network.clone(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no endpoint tried".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn settings() -> ChainSettings {
        ChainSettings {
            request_timeout_ms: 100,
            failure_threshold: 2,
            cooldown_secs: 30,
            tron_api_key: None,
        }
    }

    fn pool() -> EndpointPool<usize> {
        EndpointPool::new(
            "test",
            vec![("primary".to_string(), 0), ("backup".to_string(), 1)],
            &settings(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_over_to_backup() {
        let pool = pool();
        let value = pool
            .call("get_balance", |client| async move {
                if client == 0 {
                    Err(ChainError::Connection("refused".into()))
                } else {
                    Ok(42u64)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);

        let health = pool.health();
        assert_eq!(health[0].status, EndpointStatus::Degraded);
        assert_eq!(health[1].status, EndpointStatus::Healthy);
        assert_eq!(health[1].success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_endpoint_skipped_until_cooldown() {
        let pool = pool();
        let primary_calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&primary_calls);
            pool.call("get_balance", move |client| {
                let calls = Arc::clone(&calls);
                async move {
                    if client == 0 {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(ChainError::Rpc("500".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();
        }
        // Sau 2 lỗi liên tiếp primary bị Down, lần thứ 3 không gọi primary
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.health()[0].status, EndpointStatus::Down);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(pool.health()[0].is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_and_all_failed() {
        let pool = pool();
        let result: Result<(), _> = pool
            .call("get_balance", |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(ChainError::AllEndpointsFailed { last_error, .. }) => {
                assert!(last_error.contains("timed out"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_endpoint_error_not_retried() {
        let pool = pool();
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = pool
            .call("balance_of", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ChainError::ContractCall("execution reverted".into())) }
            })
            .await;
        assert!(matches!(result, Err(ChainError::ContractCall(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.health()[0].status, EndpointStatus::Healthy);
    }
}
