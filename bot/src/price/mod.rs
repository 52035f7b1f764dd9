//! Giá token: market API, tỷ giá, lịch sử giá và bộ tổng hợp

pub mod aggregator;
pub mod exchange_rate;
pub mod history;
pub mod market_api;
pub mod types;

pub use aggregator::{reconcile_ath, PriceAggregator};
pub use exchange_rate::ExchangeRateClient;
pub use history::{InMemoryPriceHistory, PriceHistoryStore, PriceSample};
pub use market_api::{MarketApiClient, MarketQuote};
pub use types::{default_price_tokens, PriceError, PriceRecord, PriceSource, TokenPriceInfo};
