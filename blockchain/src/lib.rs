//! Đọc dữ liệu blockchain: cấu hình network/token, adapter số dư theo network

pub mod abi;
pub mod chain_adapters;
pub mod core;

pub use chain_adapters::{AdapterRegistry, Balance, ChainAdapter, ChainError};
pub use self::core::{load_networks, predefined_networks, NetworkConfig, NetworkKind, TokenConfig};
