// Standard library imports
use std::collections::HashMap;

// Third party imports
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

// Internal imports
use crate::{
    chain_adapters::{
        connection_pool::{EndpointInfo, EndpointPool},
        interfaces::{ChainAdapter, ChainError},
    },
    core::{dec_str_to_f64, units_to_f64, NetworkConfig, TokenConfig},
};
use cesbot_common::config::ChainSettings;

/// Header chứa API key của TronGrid
const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// Số decimals của TRX (1 TRX = 1_000_000 SUN)
const TRX_DECIMALS: u8 = 6;

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<TronAccount>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Tài khoản TRON trả về từ `/v1/accounts/{address}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TronAccount {
    /// Số dư TRX tính bằng SUN
    #[serde(default)]
    pub balance: u64,
    /// Danh sách `{contract: amount}` của TRC-20
    #[serde(default)]
    pub trc20: Vec<HashMap<String, String>>,
}

impl TronAccount {
    /// Số dư TRC-20 dạng chuỗi số nguyên theo contract
    pub fn trc20_amount(&self, contract: &str) -> Option<&str> {
        self.trc20
            .iter()
            .find_map(|entry| entry.get(contract))
            .map(String::as_str)
    }
}

/// Client HTTP tối giản cho TronGrid
#[derive(Debug, Clone)]
pub struct TronClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TronClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Đọc tài khoản; `None` khi địa chỉ chưa từng có giao dịch
    pub async fn account(&self, address: &str) -> Result<Option<TronAccount>, ChainError> {
        let url = format!("{}/v1/accounts/{}", self.base_url, address);
        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Rpc(format!("TronGrid returned {status}")));
        }

        let body: AccountsResponse = response
            .json()
            .await
            .map_err(|e| ChainError::DecodeError(e.to_string()))?;

        if !body.success {
            return Err(ChainError::Rpc(body.error.unwrap_or_else(|| "request failed".to_string())));
        }

        debug!("TronGrid trả về {} tài khoản cho {}", body.data.len(), address);
        Ok(body.data.into_iter().next())
    }
}

/// Adapter cho TRON qua TronGrid
pub struct TronAdapter {
    network: NetworkConfig,
    pool: EndpointPool<TronClient>,
}

impl TronAdapter {
    pub fn new(network: NetworkConfig, settings: &ChainSettings) -> Result<Self, ChainError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        let clients: Vec<(String, TronClient)> = network
            .rpc_urls
            .iter()
            .map(|url| {
                let client = TronClient::new(http.clone(), url, settings.tron_api_key.clone());
                (url.clone(), client)
            })
            .collect();

        info!("Khởi tạo TRON adapter {} với {} endpoint", network.id, clients.len());
        let pool = EndpointPool::new(&network.id, clients, settings);
        Ok(Self { network, pool })
    }

    pub fn endpoint_health(&self) -> Vec<EndpointInfo> {
        self.pool.health()
    }

    async fn account(&self, address: &str) -> Result<Option<TronAccount>, ChainError> {
        self.pool
            .call("get_account", |client| async move { client.account(address).await })
            .await
    }
}

#[async_trait]
impl ChainAdapter for TronAdapter {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn fetch_native_balance(&self, address: &str) -> Result<f64, ChainError> {
        let sun = self.account(address).await?.map(|a| a.balance).unwrap_or(0);
        let decimals = self
            .network
            .native_token()
            .map(|t| t.decimals)
            .unwrap_or(TRX_DECIMALS);
        units_to_f64(sun.into(), decimals)
    }

    async fn fetch_token_balance(&self, address: &str, token: &TokenConfig) -> Result<f64, ChainError> {
        let contract = token.contract_address().ok_or_else(|| ChainError::UnknownToken {
            network: self.network.id.clone(),
            symbol: token.symbol.clone(),
        })?;

        match self.account(address).await? {
            Some(account) => match account.trc20_amount(contract) {
                Some(amount) => dec_str_to_f64(amount, token.decimals),
                None => Ok(0.0),
            },
            None => Ok(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predefined_networks;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const WALLET: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";

    fn adapter(url: String, api_key: Option<&str>) -> TronAdapter {
        let mut network = predefined_networks().into_iter().find(|n| n.id == "tron").unwrap();
        network.rpc_urls = vec![url];
        let settings = ChainSettings {
            tron_api_key: api_key.map(str::to_string),
            ..ChainSettings::default()
        };
        TronAdapter::new(network, &settings).unwrap()
    }

    #[tokio::test]
    async fn test_trx_and_trc20_from_account_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{WALLET}")))
            .and(header("TRON-PRO-API-KEY", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "balance": 12_500_000u64,
                    "trc20": [
                        {"TXLAQ63Xg1NAzckPwKHvzw7CSEmLMEqcdj": "1"},
                        {"TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t": "250000000"}
                    ]
                }],
                "success": true
            })))
            .mount(&server)
            .await;

        let adapter = adapter(server.uri(), Some("secret"));
        let trx = adapter.native_balance(WALLET).await;
        assert_eq!(trx.value, 12.5);
        assert!(!trx.degraded);

        let usdt = adapter.token_balance(WALLET, "USDT").await;
        assert_eq!(usdt.value, 250.0);
        assert!(!usdt.degraded);
    }

    #[tokio::test]
    async fn test_inactive_account_is_exact_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "success": true
            })))
            .mount(&server)
            .await;

        let adapter = adapter(server.uri(), None);
        let balances = adapter.all_balances(WALLET).await;
        assert_eq!(balances.len(), 2);
        for (_, balance) in balances {
            assert_eq!(balance.value, 0.0);
            assert!(!balance.degraded);
        }
    }

    #[tokio::test]
    async fn test_error_response_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let adapter = adapter(server.uri(), None);
        let balance = adapter.native_balance(WALLET).await;
        assert!(balance.degraded);
        assert_eq!(balance.value, 0.0);

        let invalid = adapter.native_balance("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").await;
        assert!(invalid.degraded);
    }
}
