// Third party imports
use async_trait::async_trait;

// Internal imports
use crate::{
    chain_adapters::interfaces::{ChainAdapter, ChainError},
    core::{NetworkConfig, TokenConfig},
};

/// Adapter cho network chưa được hỗ trợ: mọi số dư là degraded zero
pub struct StubAdapter {
    network: NetworkConfig,
}

impl StubAdapter {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network }
    }
}

#[async_trait]
impl ChainAdapter for StubAdapter {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn fetch_native_balance(&self, _address: &str) -> Result<f64, ChainError> {
        Err(ChainError::Unsupported(self.network.id.clone()))
    }

    async fn fetch_token_balance(&self, _address: &str, _token: &TokenConfig) -> Result<f64, ChainError> {
        Err(ChainError::Unsupported(self.network.id.clone()))
    }
}
