// Third party imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// Internal imports
use crate::price::types::{PriceError, PriceSource};

/// Một mẫu giá đã ghi nhận
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub symbol: String,
    pub price_usd: f64,
    pub price_rub: f64,
    /// ATH đã đối chiếu tại thời điểm ghi
    pub ath: Option<f64>,
    pub source: PriceSource,
    pub recorded_at: DateTime<Utc>,
}

/// Kho lịch sử giá do thành phần bên ngoài quản lý (chỉ thêm, truy vấn mới nhất trước)
#[async_trait]
pub trait PriceHistoryStore: Send + Sync {
    /// Mẫu giá mới nhất của symbol
    async fn latest(&self, symbol: &str) -> Result<Option<PriceSample>, PriceError>;

    /// Giá cao nhất từng ghi nhận (tính cả ATH đã lưu)
    async fn max_price(&self, symbol: &str) -> Result<Option<f64>, PriceError>;

    /// Thêm một mẫu giá
    async fn insert(&self, sample: PriceSample) -> Result<(), PriceError>;
}

/// Lịch sử giá trong bộ nhớ
#[derive(Debug, Default)]
pub struct InMemoryPriceHistory {
    samples: RwLock<Vec<PriceSample>>,
}

impl InMemoryPriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }
}

#[async_trait]
impl PriceHistoryStore for InMemoryPriceHistory {
    async fn latest(&self, symbol: &str) -> Result<Option<PriceSample>, PriceError> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .filter(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .max_by_key(|s| s.recorded_at)
            .cloned())
    }

    async fn max_price(&self, symbol: &str) -> Result<Option<f64>, PriceError> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .filter(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .flat_map(|s| std::iter::once(s.price_usd).chain(s.ath))
            .filter(|p| p.is_finite())
            .reduce(f64::max))
    }

    async fn insert(&self, sample: PriceSample) -> Result<(), PriceError> {
        self.samples.write().await.push(sample);
        Ok(())
    }
}
