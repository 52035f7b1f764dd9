// Third party imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nguồn của một bản ghi giá
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSource {
    /// API chi tiết của market-data
    ExternalDetailed,
    /// API giá đơn giản
    ExternalSimple,
    /// Giá gần nhất trong lịch sử giá
    Cached,
    /// Hằng số dự phòng
    Fallback,
}

impl PriceSource {
    pub fn label(&self) -> &'static str {
        match self {
            PriceSource::ExternalDetailed => "external-detailed",
            PriceSource::ExternalSimple => "external-simple",
            PriceSource::Cached => "cached",
            PriceSource::Fallback => "fallback",
        }
    }
}

/// Giá của một token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    /// Giá theo USD
    pub price_usd: f64,
    /// Giá theo RUB
    pub price_rub: f64,
    /// Thay đổi 24h (%)
    pub change_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    /// All-time high (USD) đã đối chiếu
    pub ath: Option<f64>,
    pub source: PriceSource,
    pub updated_at: DateTime<Utc>,
}

impl PriceRecord {
    /// Bản ghi chỉ có giá, các số liệu thị trường bằng 0
    pub fn price_only(symbol: &str, price_usd: f64, price_rub: f64, source: PriceSource) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_usd,
            price_rub,
            change_24h: 0.0,
            market_cap: 0.0,
            volume_24h: 0.0,
            ath: None,
            source,
            updated_at: Utc::now(),
        }
    }
}

/// Ánh xạ symbol sang id của market API và giá dự phòng
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPriceInfo {
    pub symbol: String,
    pub api_id: String,
    pub fallback_usd: f64,
}

impl TokenPriceInfo {
    pub fn new(symbol: &str, api_id: &str, fallback_usd: f64) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            api_id: api_id.to_string(),
            fallback_usd,
        }
    }
}

/// Các token có sẵn trong bảng giá
pub fn default_price_tokens() -> Vec<TokenPriceInfo> {
    vec![
        TokenPriceInfo::new("CES", "crypto-emergency", 2.0),
        TokenPriceInfo::new("USDT", "tether", 1.0),
        TokenPriceInfo::new("USDC", "usd-coin", 1.0),
        TokenPriceInfo::new("POL", "polygon-ecosystem-token", 0.5),
        TokenPriceInfo::new("BNB", "binancecoin", 600.0),
        TokenPriceInfo::new("TRX", "tron", 0.25),
        TokenPriceInfo::new("SOL", "solana", 150.0),
        TokenPriceInfo::new("TON", "the-open-network", 5.0),
    ]
}

/// Lỗi khi gọi các API giá
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Missing field {field} for {id}")]
    MissingData { id: String, field: &'static str },

    #[error("Price history error: {0}")]
    History(String),
}
