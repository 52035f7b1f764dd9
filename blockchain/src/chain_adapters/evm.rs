// Standard library imports
use std::sync::Arc;

// Third party imports
use async_trait::async_trait;
use ethers::{
    contract::ContractError,
    providers::{Http, Middleware, Provider, ProviderError},
    types::Address,
};
use tracing::{info, warn};

// Internal imports
use crate::{
    abi::Erc20,
    chain_adapters::{
        connection_pool::{EndpointInfo, EndpointPool},
        interfaces::{ChainAdapter, ChainError},
    },
    core::{units_to_f64, NetworkConfig, TokenConfig},
};
use cesbot_common::config::ChainSettings;

type HttpProvider = Arc<Provider<Http>>;

/// Adapter cho chain EVM qua JSON-RPC (chỉ đọc)
pub struct EvmAdapter {
    network: NetworkConfig,
    pool: EndpointPool<HttpProvider>,
}

impl EvmAdapter {
    /// Tạo adapter, một provider cho mỗi RPC URL hợp lệ
    pub fn new(network: NetworkConfig, settings: &ChainSettings) -> Result<Self, ChainError> {
        let mut clients = Vec::with_capacity(network.rpc_urls.len());
        for url in &network.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => clients.push((url.clone(), Arc::new(provider))),
                Err(e) => warn!("Bỏ qua RPC URL không hợp lệ {} ({}): {}", url, network.id, e),
            }
        }

        if clients.is_empty() {
            return Err(ChainError::Connection(format!(
                "no usable rpc url for {}",
                network.id
            )));
        }

        info!("Khởi tạo EVM adapter {} với {} endpoint", network.id, clients.len());
        let pool = EndpointPool::new(&network.id, clients, settings);
        Ok(Self { network, pool })
    }

    /// Sức khỏe các endpoint
    pub fn endpoint_health(&self) -> Vec<EndpointInfo> {
        self.pool.health()
    }

    fn parse_address(&self, address: &str) -> Result<Address, ChainError> {
        address.parse::<Address>().map_err(|_| ChainError::InvalidAddress {
            network: self.network.id.clone(),
            address: address.to_string(),
        })
    }
}

fn provider_error(e: ProviderError) -> ChainError {
    match e {
        ProviderError::HTTPError(e) => ChainError::Connection(e.to_string()),
        other => ChainError::Rpc(other.to_string()),
    }
}

fn contract_error(e: ContractError<Provider<Http>>) -> ChainError {
    if e.is_revert() {
        ChainError::ContractCall(e.to_string())
    } else if let ContractError::DecodingError(e) = e {
        ChainError::DecodeError(e.to_string())
    } else {
        ChainError::Rpc(e.to_string())
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn fetch_native_balance(&self, address: &str) -> Result<f64, ChainError> {
        let owner = self.parse_address(address)?;
        let decimals = self.network.native_token().map(|t| t.decimals).unwrap_or(18);

        let raw = self
            .pool
            .call("eth_getBalance", |provider| async move {
                provider.get_balance(owner, None).await.map_err(provider_error)
            })
            .await?;

        units_to_f64(raw, decimals)
    }

    async fn fetch_token_balance(&self, address: &str, token: &TokenConfig) -> Result<f64, ChainError> {
        let owner = self.parse_address(address)?;
        let contract = token
            .contract_address()
            .ok_or_else(|| ChainError::UnknownToken {
                network: self.network.id.clone(),
                symbol: token.symbol.clone(),
            })
            .and_then(|a| self.parse_address(a))?;

        let raw = self
            .pool
            .call("balanceOf", |provider| async move {
                Erc20::new(contract, provider)
                    .balance_of(owner)
                    .call()
                    .await
                    .map_err(contract_error)
            })
            .await?;

        units_to_f64(raw, token.decimals)
    }
}
