//! Adapter đọc số dư cho từng network

pub mod adapter_registry;
pub mod connection_pool;
pub mod evm;
pub mod interfaces;
pub mod stub;
pub mod tron;

pub use adapter_registry::AdapterRegistry;
pub use connection_pool::{EndpointInfo, EndpointPool, EndpointStatus};
pub use evm::EvmAdapter;
pub use interfaces::{validate_address, Balance, ChainAdapter, ChainError};
pub use stub::StubAdapter;
pub use tron::{TronAccount, TronAdapter, TronClient};
