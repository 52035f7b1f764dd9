// Standard library imports
use std::sync::Arc;

// Third party imports
use tracing::{info, warn};

// Internal imports
use crate::{
    chain_adapters::{
        evm::EvmAdapter,
        interfaces::{ChainAdapter, ChainError},
        stub::StubAdapter,
        tron::TronAdapter,
    },
    core::{NetworkConfig, NetworkKind},
};
use cesbot_common::config::ChainSettings;

/// Registry chứa một adapter cho mỗi network, theo thứ tự cấu hình
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tạo adapter theo `NetworkKind`; network không khởi tạo được dùng stub
    pub fn from_networks(networks: Vec<NetworkConfig>, settings: &ChainSettings) -> Self {
        let mut registry = Self::new();
        for network in networks {
            let id = network.id.clone();
            let built: Result<Arc<dyn ChainAdapter>, ChainError> = match network.kind {
                NetworkKind::Evm => EvmAdapter::new(network.clone(), settings).map(|a| Arc::new(a) as _),
                NetworkKind::Tron => TronAdapter::new(network.clone(), settings).map(|a| Arc::new(a) as _),
                NetworkKind::Pending => {
                    info!("Network {} chưa được hỗ trợ, dùng stub adapter", id);
                    Ok(Arc::new(StubAdapter::new(network.clone())))
                }
            };

            match built {
                Ok(adapter) => registry.register(adapter),
                Err(e) => {
                    warn!("Không thể khởi tạo adapter {}: {}, dùng stub", id, e);
                    registry.register(Arc::new(StubAdapter::new(network)));
                }
            }
        }
        registry
    }

    /// Thêm hoặc thay adapter cùng network id
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        match self
            .adapters
            .iter_mut()
            .find(|existing| existing.network_id() == adapter.network_id())
        {
            Some(existing) => *existing = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn get(&self, network_id: &str) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.network_id().eq_ignore_ascii_case(network_id))
            .cloned()
    }

    pub fn adapters(&self) -> &[Arc<dyn ChainAdapter>] {
        &self.adapters
    }

    pub fn network_ids(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.network_id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
