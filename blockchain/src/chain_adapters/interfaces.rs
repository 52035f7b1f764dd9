// Third party imports
use async_trait::async_trait;
use ethers::types::Address;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// Internal imports
use crate::core::{NetworkConfig, NetworkKind, TokenConfig};

/// ChainError định nghĩa các loại lỗi khi đọc dữ liệu từ blockchain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Lỗi kết nối đến RPC
    #[error("Connection error: {0}")]
    Connection(String),

    /// Lỗi timeout khi chờ kết quả
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Lỗi do RPC trả về
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Lỗi gọi contract
    #[error("Contract call error: {0}")]
    ContractCall(String),

    /// Lỗi giải mã dữ liệu trả về
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Địa chỉ không hợp lệ
    #[error("Invalid address for {network}: {address}")]
    InvalidAddress { network: String, address: String },

    /// Token không được cấu hình trên network
    #[error("Unknown token {symbol} on {network}")]
    UnknownToken { network: String, symbol: String },

    /// Network chưa được hỗ trợ
    #[error("Unsupported network: {0}")]
    Unsupported(String),

    /// Mọi endpoint đều lỗi
    #[error("All endpoints failed for {network}: {last_error}")]
    AllEndpointsFailed { network: String, last_error: String },
}

impl ChainError {
    /// Lỗi có nên đánh dấu endpoint là không khỏe không
    pub fn is_endpoint_fault(&self) -> bool {
        matches!(
            self,
            ChainError::Connection(_) | ChainError::Timeout(_) | ChainError::Rpc(_)
        )
    }
}

/// Số dư đã đổi ra đơn vị hiển thị.
///
/// `degraded = true` nghĩa là không đọc được dữ liệu và `value` là 0 thay thế,
/// phân biệt với tài khoản thật sự có số dư 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub value: f64,
    pub degraded: bool,
}

impl Balance {
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 {
            Self { value, degraded: false }
        } else {
            Self::degraded()
        }
    }

    pub fn zero() -> Self {
        Self { value: 0.0, degraded: false }
    }

    pub fn degraded() -> Self {
        Self { value: 0.0, degraded: true }
    }
}

/// Kiểm tra địa chỉ theo loại network
pub fn validate_address(network: &NetworkConfig, address: &str) -> Result<(), ChainError> {
    let valid = match network.kind {
        NetworkKind::Evm => address.parse::<Address>().is_ok() && address.starts_with("0x"),
        NetworkKind::Tron => is_tron_address(address),
        NetworkKind::Pending => !address.trim().is_empty(),
    };

    if valid {
        Ok(())
    } else {
        Err(ChainError::InvalidAddress {
            network: network.id.clone(),
            address: address.to_string(),
        })
    }
}

/// Địa chỉ TRON dạng base58: bắt đầu bằng `T`, dài 34 ký tự
pub fn is_tron_address(address: &str) -> bool {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    address.len() == 34 && address.starts_with('T') && address.chars().all(|c| BASE58.contains(c))
}

/// Adapter đọc số dư của một network.
///
/// Implementation chỉ cần các hàm `fetch_*` (trả lỗi thật); các hàm
/// `native_balance`/`token_balance` không bao giờ trả lỗi mà hạ cấp về 0 và
/// ghi log. Adapter không tự retry.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Cấu hình network của adapter
    fn network(&self) -> &NetworkConfig;

    fn network_id(&self) -> &str {
        &self.network().id
    }

    fn kind(&self) -> NetworkKind {
        self.network().kind
    }

    /// Đọc số dư native token
    async fn fetch_native_balance(&self, address: &str) -> Result<f64, ChainError>;

    /// Đọc số dư token có contract
    async fn fetch_token_balance(&self, address: &str, token: &TokenConfig) -> Result<f64, ChainError>;

    /// Số dư native token, lỗi thành degraded zero
    async fn native_balance(&self, address: &str) -> Balance {
        let network = self.network();
        if let Err(e) = validate_address(network, address) {
            return degrade(network, &network.native_symbol, &e);
        }
        match self.fetch_native_balance(address).await {
            Ok(value) => Balance::new(value),
            Err(e) => degrade(network, &network.native_symbol, &e),
        }
    }

    /// Số dư token theo symbol, lỗi thành degraded zero
    async fn token_balance(&self, address: &str, symbol: &str) -> Balance {
        let network = self.network();
        let token = match network.token(symbol) {
            Some(token) => token,
            None => {
                let e = ChainError::UnknownToken {
                    network: network.id.clone(),
                    symbol: symbol.to_string(),
                };
                return degrade(network, symbol, &e);
            }
        };

        if token.is_native() {
            return self.native_balance(address).await;
        }
        if let Err(e) = validate_address(network, address) {
            return degrade(network, symbol, &e);
        }
        match self.fetch_token_balance(address, token).await {
            Ok(value) => Balance::new(value),
            Err(e) => degrade(network, symbol, &e),
        }
    }

    /// Số dư mọi token đã cấu hình, đọc đồng thời, giữ thứ tự cấu hình
    async fn all_balances(&self, address: &str) -> Vec<(String, Balance)> {
        let symbols = self.network().symbols();
        let balances = join_all(symbols.iter().map(|symbol| self.token_balance(address, symbol))).await;
        debug!("Đã đọc {} số dư trên {}", balances.len(), self.network_id());
        symbols.into_iter().zip(balances).collect()
    }
}

fn degrade(network: &NetworkConfig, symbol: &str, error: &ChainError) -> Balance {
    warn!("Không thể đọc số dư {} trên {}: {}", symbol, network.id, error);
    metrics::counter!("chain_balance_degraded_total", 1, "network" => network.id.clone());
    Balance::degraded()
}
