// Standard library imports
use std::{collections::HashMap, sync::Arc};

// Third party imports
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info};

// Internal imports
use crate::{
    portfolio::{format_portfolio, PortfolioView},
    price::PriceAggregator,
};
use cesbot_blockchain::{chain_adapters::validate_address, AdapterRegistry, Balance};
use cesbot_common::{
    metrics::PerformanceMonitor,
    scheduler::{BackgroundScheduler, TaskHandle, TaskOptions},
    utils::{short_address, task_id},
};

/// Lỗi của pipeline portfolio
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

/// Lấy số dư và giá của một ví rồi dựng portfolio
#[derive(Clone)]
pub struct PortfolioService {
    registry: AdapterRegistry,
    prices: Arc<PriceAggregator>,
    monitor: PerformanceMonitor,
}

impl PortfolioService {
    pub fn new(registry: AdapterRegistry, prices: Arc<PriceAggregator>, monitor: PerformanceMonitor) -> Self {
        Self {
            registry,
            prices,
            monitor,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Portfolio trên một network: số dư và giá được lấy đồng thời
    pub async fn network_portfolio(&self, network_id: &str, address: &str) -> Result<PortfolioView, PortfolioError> {
        let adapter = self
            .registry
            .get(network_id)
            .ok_or_else(|| PortfolioError::UnknownNetwork(network_id.to_string()))?;
        let network = adapter.network();
        let symbols = network.symbols();

        let subject = format!("{}:{}", network.id, short_address(address));
        let (balances, prices) = self
            .monitor
            .time("portfolio_fetch", &subject, async {
                tokio::join!(adapter.all_balances(address), self.prices.get_prices(&symbols))
            })
            .await;

        let balances: HashMap<String, Balance> = balances.into_iter().collect();
        debug!("Portfolio {}: {} số dư, {} giá", subject, balances.len(), prices.len());
        Ok(format_portfolio(network, &balances, &prices))
    }

    /// Đưa việc dựng portfolio vào scheduler, trả handle ngay
    pub fn submit_portfolio(
        &self,
        scheduler: &BackgroundScheduler,
        network_id: &str,
        address: &str,
        options: TaskOptions,
    ) -> TaskHandle<PortfolioView> {
        let service = self.clone();
        let network_id = network_id.to_string();
        let address = address.to_string();
        let id = task_id(&format!("portfolio_{network_id}"));

        scheduler.submit(
            id,
            move || async move { Ok(service.network_portfolio(&network_id, &address).await?) },
            options.with_operation("portfolio"),
        )
    }

    /// Portfolio trên mọi network mà địa chỉ hợp lệ, chạy đồng thời
    pub async fn fetch_all(&self, address: &str) -> Vec<PortfolioView> {
        let networks: Vec<String> = self
            .registry
            .adapters()
            .iter()
            .filter(|adapter| validate_address(adapter.network(), address).is_ok())
            .map(|adapter| adapter.network_id().to_string())
            .collect();
        info!("Lấy portfolio {} trên {} network", short_address(address), networks.len());

        let wallets: Vec<(String, String)> = networks
            .into_iter()
            .map(|network| (network, address.to_string()))
            .collect();
        self.fetch_wallets(&wallets).await
    }

    /// Portfolio cho các cặp (network, địa chỉ), chạy đồng thời; network không
    /// tồn tại bị bỏ qua
    pub async fn fetch_wallets(&self, wallets: &[(String, String)]) -> Vec<PortfolioView> {
        let views = join_all(
            wallets
                .iter()
                .map(|(network, address)| self.network_portfolio(network, address)),
        )
        .await;

        views.into_iter().filter_map(Result::ok).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::InMemoryPriceHistory;
    use cesbot_blockchain::{chain_adapters::StubAdapter, predefined_networks};
    use cesbot_common::config::{PerformanceConfig, PriceSettings, SchedulerConfig};

    fn service() -> PortfolioService {
        let mut registry = AdapterRegistry::new();
        for network in predefined_networks().into_iter().filter(|n| n.id == "ton" || n.id == "solana") {
            registry.register(Arc::new(StubAdapter::new(network)));
        }
        // Không có server: mọi API giá lỗi ngay, rơi về giá dự phòng
        let settings = PriceSettings {
            market_api_url: "http://127.0.0.1:9".to_string(),
            exchange_rate_url: "http://127.0.0.1:9/rates".to_string(),
            ..PriceSettings::default()
        };
        let prices = PriceAggregator::new(settings, Arc::new(InMemoryPriceHistory::new())).unwrap();
        PortfolioService::new(registry, Arc::new(prices), PerformanceMonitor::new(PerformanceConfig::default()))
    }

    #[tokio::test]
    async fn test_unknown_network_is_error() {
        let result = service().network_portfolio("ethereum", "0xabc").await;
        assert_eq!(result.unwrap_err(), PortfolioError::UnknownNetwork("ethereum".to_string()));
    }

    #[tokio::test]
    async fn test_submitted_portfolio_degrades_not_fails() {
        let service = service();
        let scheduler = BackgroundScheduler::new(SchedulerConfig::default());

        let handle = service.submit_portfolio(&scheduler, "ton", "EQ-wallet", TaskOptions::default());
        let view = handle.wait().await.unwrap();
        assert_eq!(view.network, "ton");
        assert!(view.degraded);
        assert_eq!(view.total.usd_text, "0.00");
        assert_eq!(service.monitor.stats().total_operations, 1);
    }

    #[tokio::test]
    async fn test_fetch_all_covers_every_network() {
        let views = service().fetch_all("wallet").await;
        let mut networks: Vec<_> = views.iter().map(|v| v.network.as_str()).collect();
        networks.sort();
        assert_eq!(networks, vec!["solana", "ton"]);
        // API giá không truy cập được: giá dự phòng, không lỗi
        for view in &views {
            assert_eq!(view.tokens.len(), 1);
            assert!(view.tokens[0].price_usd > 0.0);
        }
    }
}
