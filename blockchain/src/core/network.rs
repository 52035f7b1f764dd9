// Standard library imports
use std::collections::HashMap;

// Third party imports
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// Internal imports
use cesbot_common::config::{NetworkOverride, TokenOverride};

/// Loại network, quyết định adapter được dùng
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkKind {
    /// Chain EVM (JSON-RPC)
    Evm,
    /// TRON (mô hình account/resource)
    Tron,
    /// Chưa hỗ trợ, dùng stub adapter
    Pending,
}

/// Địa chỉ contract của token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenContract {
    /// Native asset của network
    Native,
    /// Token có contract
    Contract(String),
}

/// Cấu hình một token trên một network.
///
/// `decimals` phải trùng với giá trị khai báo trong contract, nếu không số dư
/// sẽ lệch theo lũy thừa của 10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub name: String,
    pub contract: TokenContract,
    pub decimals: u8,
}

impl TokenConfig {
    pub fn native(symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            contract: TokenContract::Native,
            decimals,
        }
    }

    pub fn contract(symbol: &str, name: &str, address: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            contract: TokenContract::Contract(address.to_string()),
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.contract == TokenContract::Native
    }

    pub fn contract_address(&self) -> Option<&str> {
        match &self.contract {
            TokenContract::Native => None,
            TokenContract::Contract(address) => Some(address),
        }
    }
}

impl From<&TokenOverride> for TokenConfig {
    fn from(token: &TokenOverride) -> Self {
        Self {
            symbol: token.symbol.to_uppercase(),
            name: token.name.clone(),
            contract: match &token.contract {
                Some(address) => TokenContract::Contract(address.clone()),
                None => TokenContract::Native,
            },
            decimals: token.decimals,
        }
    }
}

/// Tham số phí / gas của network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeParams {
    /// Gas limit mặc định
    pub gas_limit: Option<u64>,
    /// Gas price mặc định (gwei)
    pub gas_price_gwei: Option<f64>,
    /// Hỗ trợ EIP-1559
    pub eip1559: bool,
    /// Fee limit cho smart contract TRON (SUN)
    pub fee_limit_sun: Option<u64>,
}

/// Cấu hình một network. Bất biến sau khi khởi động, dùng chung (read-only)
/// cho mọi adapter của network đó.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Định danh network, ví dụ `polygon`
    pub id: String,
    /// Tên hiển thị
    pub name: String,
    pub kind: NetworkKind,
    /// Symbol của native token
    pub native_symbol: String,
    /// RPC endpoint theo thứ tự ưu tiên, phần tử đầu là primary
    pub rpc_urls: Vec<String>,
    /// Token theo thứ tự hiển thị, native token đứng đầu
    pub tokens: Vec<TokenConfig>,
    pub fees: FeeParams,
}

impl NetworkConfig {
    /// Tra cứu token theo symbol (không phân biệt hoa thường)
    pub fn token(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.tokens.iter().map(|token| token.symbol.clone()).collect()
    }

    pub fn native_token(&self) -> Option<&TokenConfig> {
        self.tokens.iter().find(|token| token.is_native())
    }

    /// Áp dụng cấu hình ghi đè
    pub fn apply_override(&mut self, entry: &NetworkOverride) {
        if !entry.rpc_urls.is_empty() {
            info!("Network {}: dùng {} RPC endpoint từ cấu hình", self.id, entry.rpc_urls.len());
            self.rpc_urls = entry.rpc_urls.clone();
        }
        for token in &entry.tokens {
            let token = TokenConfig::from(token);
            match self.tokens.iter_mut().find(|t| t.symbol == token.symbol) {
                Some(existing) => *existing = token,
                None => self.tokens.push(token),
            }
        }
    }

    /// Kiểm tra cấu hình hợp lệ
    pub fn validate(&self) -> Result<(), String> {
        if self.kind != NetworkKind::Pending && self.rpc_urls.is_empty() {
            return Err(format!("network {} has no rpc url", self.id));
        }
        let mut seen = std::collections::HashSet::new();
        for token in &self.tokens {
            if !seen.insert(token.symbol.as_str()) {
                return Err(format!("network {}: duplicate token {}", self.id, token.symbol));
            }
            if token.decimals > 36 {
                return Err(format!("network {}: token {} has invalid decimals", self.id, token.symbol));
            }
        }
        Ok(())
    }
}

/// Các network được hỗ trợ sẵn
pub fn predefined_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig {
            id: "polygon".to_string(),
            name: "Polygon".to_string(),
            kind: NetworkKind::Evm,
            native_symbol: "POL".to_string(),
            rpc_urls: vec![
                "https://polygon-rpc.com".to_string(),
                "https://polygon-bor-rpc.publicnode.com".to_string(),
            ],
            tokens: vec![
                TokenConfig::native("POL", "Polygon Ecosystem Token", 18),
                TokenConfig::contract(
                    "USDT",
                    "Tether USD",
                    "0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
                    6,
                ),
            ],
            fees: FeeParams {
                gas_limit: Some(100_000),
                gas_price_gwei: Some(50.0),
                eip1559: true,
                fee_limit_sun: None,
            },
        },
        NetworkConfig {
            id: "bsc".to_string(),
            name: "BNB Smart Chain".to_string(),
            kind: NetworkKind::Evm,
            native_symbol: "BNB".to_string(),
            rpc_urls: vec![
                "https://bsc-dataseed.binance.org".to_string(),
                "https://bsc-dataseed1.defibit.io".to_string(),
            ],
            tokens: vec![
                TokenConfig::native("BNB", "BNB", 18),
                TokenConfig::contract(
                    "USDT",
                    "Tether USD",
                    "0x55d398326f99059fF775485246999027B3197955",
                    18,
                ),
            ],
            fees: FeeParams {
                gas_limit: Some(100_000),
                gas_price_gwei: Some(3.0),
                eip1559: false,
                fee_limit_sun: None,
            },
        },
        NetworkConfig {
            id: "tron".to_string(),
            name: "TRON".to_string(),
            kind: NetworkKind::Tron,
            native_symbol: "TRX".to_string(),
            rpc_urls: vec!["https://api.trongrid.io".to_string()],
            tokens: vec![
                TokenConfig::native("TRX", "TRON", 6),
                TokenConfig::contract("USDT", "Tether USD", "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", 6),
            ],
            fees: FeeParams {
                fee_limit_sun: Some(30_000_000),
                ..FeeParams::default()
            },
        },
        NetworkConfig {
            id: "solana".to_string(),
            name: "Solana".to_string(),
            kind: NetworkKind::Pending,
            native_symbol: "SOL".to_string(),
            rpc_urls: vec!["https://api.mainnet-beta.solana.com".to_string()],
            tokens: vec![TokenConfig::native("SOL", "Solana", 9)],
            fees: FeeParams::default(),
        },
        NetworkConfig {
            id: "ton".to_string(),
            name: "TON".to_string(),
            kind: NetworkKind::Pending,
            native_symbol: "TON".to_string(),
            rpc_urls: vec!["https://toncenter.com/api/v2/jsonRPC".to_string()],
            tokens: vec![TokenConfig::native("TON", "Toncoin", 9)],
            fees: FeeParams::default(),
        },
    ]
}

/// Network có sẵn sau khi áp dụng cấu hình ghi đè; network không hợp lệ bị bỏ qua
pub fn load_networks(overrides: &HashMap<String, NetworkOverride>) -> Vec<NetworkConfig> {
    for id in overrides.keys() {
        if !predefined_networks().iter().any(|network| &network.id == id) {
            warn!("Bỏ qua cấu hình cho network không hỗ trợ: {}", id);
        }
    }

    predefined_networks()
        .into_iter()
        .map(|mut network| {
            if let Some(entry) = overrides.get(&network.id) {
                network.apply_override(entry);
            }
            network
        })
        .filter(|network| match network.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Cấu hình network không hợp lệ: {}", e);
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_networks_are_valid() {
        let networks = predefined_networks();
        assert!(networks.iter().all(|n| n.validate().is_ok()));
        for network in &networks {
            let native = network.native_token().unwrap();
            assert_eq!(native.symbol, network.native_symbol);
        }
    }

    #[test]
    fn test_token_lookup_is_case_insensitive() {
        let networks = predefined_networks();
        let tron = networks.iter().find(|n| n.id == "tron").unwrap();
        let usdt = tron.token("usdt").unwrap();
        assert_eq!(usdt.decimals, 6);
        assert_eq!(usdt.contract_address(), Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        assert!(tron.token("CES").is_none());
    }

    #[test]
    fn test_override_replaces_rpc_and_adds_token() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "polygon".to_string(),
            NetworkOverride {
                rpc_urls: vec!["https://my-node.example".to_string()],
                tokens: vec![TokenOverride {
                    symbol: "ces".to_string(),
                    name: "CES".to_string(),
                    contract: Some("0x0000000000000000000000000000000000000001".to_string()),
                    decimals: 18,
                }],
            },
        );

        let networks = load_networks(&overrides);
        let polygon = networks.iter().find(|n| n.id == "polygon").unwrap();
        assert_eq!(polygon.rpc_urls, vec!["https://my-node.example"]);
        assert_eq!(polygon.symbols(), vec!["POL", "USDT", "CES"]);
    }

    #[test]
    fn test_duplicate_token_is_invalid() {
        let mut network = predefined_networks().remove(0);
        network.tokens.push(TokenConfig::native("POL", "dup", 18));
        assert!(network.validate().is_err());
    }
}
