// Standard library imports
use std::{collections::HashMap, sync::Arc};

// Third party imports
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info, warn};

// Internal imports
use crate::{
    price::{
        exchange_rate::ExchangeRateClient,
        history::{PriceHistoryStore, PriceSample},
        market_api::{MarketApiClient, MarketQuote},
        types::{default_price_tokens, PriceError, PriceRecord, PriceSource, TokenPriceInfo},
    },
    rate_limit::CallSpacing,
};
use cesbot_common::{cache::CacheEntry, config::PriceSettings, metrics::PerformanceMonitor};

/// ATH = max của các giá trị có mặt: ATH đã lưu, ATH nguồn ngoài, giá hiện tại
pub fn reconcile_ath(persisted: Option<f64>, external: Option<f64>, current: f64) -> f64 {
    [persisted, external]
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .fold(current, f64::max)
}

/// Lấy giá token qua chuỗi dự phòng: API chi tiết, API đơn giản, lịch sử giá,
/// hằng số.
pub struct PriceAggregator {
    settings: PriceSettings,
    market: MarketApiClient,
    rates: ExchangeRateClient,
    history: Arc<dyn PriceHistoryStore>,
    tokens: HashMap<String, TokenPriceInfo>,
    cache: DashMap<String, CacheEntry<PriceRecord>>,
    own_token_spacing: CallSpacing,
    monitor: Option<PerformanceMonitor>,
}

impl PriceAggregator {
    pub fn new(settings: PriceSettings, history: Arc<dyn PriceHistoryStore>) -> Result<Self, PriceError> {
        let market = MarketApiClient::new(&settings)?;
        let rates = ExchangeRateClient::new(&settings)?;
        let tokens = default_price_tokens()
            .into_iter()
            .map(|token| (token.symbol.clone(), token))
            .collect();

        Ok(Self {
            own_token_spacing: CallSpacing::new(settings.own_token_min_interval()),
            settings,
            market,
            rates,
            history,
            tokens,
            cache: DashMap::new(),
            monitor: None,
        })
    }

    /// Thêm hoặc thay thông tin giá của một token
    pub fn with_token(mut self, token: TokenPriceInfo) -> Self {
        self.tokens.insert(token.symbol.clone(), token);
        self
    }

    pub fn with_monitor(mut self, monitor: PerformanceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenPriceInfo> {
        self.tokens.get(&symbol.to_uppercase())
    }

    /// Giá của một token. Không bao giờ lỗi: luôn có bản ghi với nguồn tương ứng.
    pub async fn get_price(&self, symbol: &str) -> PriceRecord {
        match &self.monitor {
            Some(monitor) => monitor.time("price_lookup", symbol, self.resolve(symbol)).await,
            None => self.resolve(symbol).await,
        }
    }

    /// Giá nhiều token, lấy đồng thời
    pub async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceRecord> {
        let records = join_all(symbols.iter().map(|symbol| self.get_price(symbol))).await;
        records
            .into_iter()
            .map(|record| (record.symbol.clone(), record))
            .collect()
    }

    async fn resolve(&self, symbol: &str) -> PriceRecord {
        let symbol = symbol.to_uppercase();

        if let Some(entry) = self.cache.get(&symbol) {
            if entry.is_fresh(self.settings.price_ttl()) {
                debug!("Giá {} lấy từ cache", symbol);
                return entry.value.clone();
            }
        }

        match self.tokens.get(&symbol) {
            Some(token) => {
                if let Some(record) = self.fetch_external(token).await {
                    self.cache.insert(symbol.clone(), CacheEntry::new(record.clone()));
                    return record;
                }
            }
            None => warn!("Token {} không có trong bảng giá", symbol),
        }

        self.fallback(&symbol).await
    }

    /// API chi tiết; own_token bị giãn cách giữa các lần gọi
    async fn detailed_quote(&self, token: &TokenPriceInfo) -> Result<MarketQuote, PriceError> {
        if token.symbol.eq_ignore_ascii_case(&self.settings.own_token) {
            self.own_token_spacing.wait().await;
        }
        self.market.detailed(&token.api_id).await
    }

    async fn fetch_external(&self, token: &TokenPriceInfo) -> Option<PriceRecord> {
        let (price_usd, quote, source) = match self.detailed_quote(token).await {
            Ok(quote) => (quote.price_usd, Some(quote), PriceSource::ExternalDetailed),
            Err(e) => {
                warn!("API giá chi tiết lỗi cho {}: {}", token.symbol, e);
                match self.market.simple(&token.api_id).await {
                    Ok(price) => (price, None, PriceSource::ExternalSimple),
                    Err(e) => {
                        warn!("API giá đơn giản lỗi cho {}: {}", token.symbol, e);
                        return None;
                    }
                }
            }
        };

        let rate = self.rates.usd_rub().await;
        let persisted = match self.history.max_price(&token.symbol).await {
            Ok(max) => max,
            Err(e) => {
                warn!("Không đọc được lịch sử giá {}: {}", token.symbol, e);
                None
            }
        };
        let ath = reconcile_ath(persisted, quote.as_ref().and_then(|q| q.ath), price_usd);

        let mut record = PriceRecord::price_only(&token.symbol, price_usd, price_usd * rate, source);
        record.ath = Some(ath);
        if let Some(quote) = quote {
            record.change_24h = quote.change_24h;
            record.market_cap = quote.market_cap;
            record.volume_24h = quote.volume_24h;
        }

        let sample = PriceSample {
            symbol: record.symbol.clone(),
            price_usd: record.price_usd,
            price_rub: record.price_rub,
            ath: record.ath,
            source,
            recorded_at: record.updated_at,
        };
        if let Err(e) = self.history.insert(sample).await {
            warn!("Không ghi được mẫu giá {}: {}", token.symbol, e);
        }

        metrics::counter!("price_lookups_total", 1, "source" => source.label());
        Some(record)
    }

    async fn fallback(&self, symbol: &str) -> PriceRecord {
        match self.history.latest(symbol).await {
            Ok(Some(sample)) => {
                info!("Dùng giá đã lưu cho {}: ${}", symbol, sample.price_usd);
                metrics::counter!("price_lookups_total", 1, "source" => PriceSource::Cached.label());
                let mut record =
                    PriceRecord::price_only(symbol, sample.price_usd, sample.price_rub, PriceSource::Cached);
                record.ath = sample.ath;
                record.updated_at = sample.recorded_at;
                return record;
            }
            Ok(None) => {}
            Err(e) => warn!("Không đọc được lịch sử giá {}: {}", symbol, e),
        }

        let price_usd = self.tokens.get(symbol).map(|t| t.fallback_usd).unwrap_or(0.0);
        let rate = self.rates.usd_rub().await;
        warn!("Dùng giá dự phòng cho {}: ${}", symbol, price_usd);
        metrics::counter!("price_lookups_total", 1, "source" => PriceSource::Fallback.label());
        PriceRecord::price_only(symbol, price_usd, price_usd * rate, PriceSource::Fallback)
    }
}
