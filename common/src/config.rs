// Standard library imports
use std::{collections::HashMap, path::Path, time::Duration};

// Third party imports
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

// Internal imports
use crate::error::{CommonError, CommonResult};

/// Prefix biến môi trường, ví dụ `CESBOT__PRICE__API_KEY`
pub const ENV_PREFIX: &str = "CESBOT";

/// Cấu hình toàn bộ ứng dụng, nạp một lần khi khởi động
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub performance: PerformanceConfig,
    pub chain: ChainSettings,
    pub price: PriceSettings,
    /// Ghi đè RPC URL / token theo network id
    pub networks: HashMap<String, NetworkOverride>,
}

/// Cấu hình logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter mặc định khi không có `RUST_LOG`
    pub level: String,
    /// Bật ghi log ra file
    pub file_enabled: bool,
    /// Thư mục chứa file log
    pub directory: String,
    /// Tên file log (xoay vòng theo ngày)
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            directory: "logs".to_string(),
            file_prefix: "cesbot.log".to_string(),
        }
    }
}

/// Cấu hình scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Độ ưu tiên mặc định (cao hơn chạy trước)
    pub default_priority: i32,
    /// Timeout mặc định cho mỗi task (ms)
    pub default_timeout_ms: u64,
    /// Thời gian nghỉ giữa hai task (ms), 0 = chỉ yield
    pub yield_ms: u64,
    /// Dung lượng kênh sự kiện
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_priority: 0,
            default_timeout_ms: 30_000,
            yield_ms: 10,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_ms)
    }
}

/// Cấu hình đo hiệu suất
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Số metric tối đa giữ trong ring buffer
    pub capacity: usize,
    /// Số metric chậm tối đa
    pub slow_capacity: usize,
    /// Ngưỡng chậm (ms)
    pub slow_threshold_ms: u64,
    /// Số thao tác chậm nhất đưa vào báo cáo
    pub report_top_n: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            slow_capacity: 100,
            slow_threshold_ms: 1000,
            report_top_n: 10,
        }
    }
}

/// Cấu hình chung cho các chain adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Timeout cho một lời gọi RPC (ms)
    pub request_timeout_ms: u64,
    /// Số lỗi liên tiếp trước khi endpoint bị đánh dấu Down
    pub failure_threshold: u32,
    /// Thời gian endpoint Down bị bỏ qua (giây)
    pub cooldown_secs: u64,
    /// API key cho TronGrid
    pub tron_api_key: Option<String>,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            failure_threshold: 3,
            cooldown_secs: 60,
            tron_api_key: None,
        }
    }
}

impl ChainSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Cấu hình nguồn giá
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSettings {
    /// Base URL của market-data API
    pub market_api_url: String,
    /// API key (không bắt buộc)
    pub api_key: Option<String>,
    /// Header chứa API key
    pub api_key_header: String,
    /// URL tỷ giá USD
    pub exchange_rate_url: String,
    /// Timeout cho market-data API (ms)
    pub request_timeout_ms: u64,
    /// Timeout cho API tỷ giá (ms)
    pub rate_timeout_ms: u64,
    /// Thời gian giá còn tươi (giây)
    pub price_ttl_secs: u64,
    /// Thời gian cache tỷ giá (giây)
    pub rate_ttl_secs: u64,
    /// Token của hệ thống, bị giới hạn tần suất gọi API chi tiết
    pub own_token: String,
    /// Khoảng cách tối thiểu giữa hai lần gọi API chi tiết cho own_token (ms)
    pub own_token_min_interval_ms: u64,
    /// Tỷ giá USD→RUB dùng khi chưa từng lấy được tỷ giá
    pub fallback_usd_rub: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            market_api_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            api_key_header: "x-cg-demo-api-key".to_string(),
            exchange_rate_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            request_timeout_ms: 10_000,
            rate_timeout_ms: 8_000,
            price_ttl_secs: 30,
            rate_ttl_secs: 60,
            own_token: "CES".to_string(),
            own_token_min_interval_ms: 1_500,
            fallback_usd_rub: 90.0,
        }
    }
}

impl PriceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rate_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_timeout_ms)
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn rate_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_ttl_secs)
    }

    pub fn own_token_min_interval(&self) -> Duration {
        Duration::from_millis(self.own_token_min_interval_ms)
    }
}

/// Ghi đè cấu hình một network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOverride {
    /// Danh sách RPC thay thế (phần tử đầu là primary)
    pub rpc_urls: Vec<String>,
    /// Token bổ sung
    pub tokens: Vec<TokenOverride>,
}

/// Token bổ sung qua cấu hình
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOverride {
    pub symbol: String,
    pub name: String,
    /// `None` nghĩa là native asset
    pub contract: Option<String>,
    pub decimals: u8,
}

impl AppConfig {
    /// Nạp cấu hình từ thư mục `config/` cạnh working directory
    pub fn load() -> CommonResult<Self> {
        // .env không bắt buộc
        let _ = dotenv::dotenv();
        Self::load_from(Path::new("config"))
    }

    /// Nạp cấu hình: `default.toml`, `{RUN_MODE}.toml`, rồi biến môi trường
    pub fn load_from(dir: &Path) -> CommonResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        debug!("Nạp cấu hình từ {} (mode: {})", dir.display(), run_mode);

        let config: AppConfig = Config::builder()
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(&run_mode)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Kiểm tra các giá trị bắt buộc
    pub fn validate(&self) -> CommonResult<()> {
        if self.scheduler.default_timeout_ms == 0 {
            return Err(CommonError::Config("scheduler.default_timeout_ms must be > 0".into()));
        }
        if self.scheduler.event_capacity == 0 {
            return Err(CommonError::Config("scheduler.event_capacity must be > 0".into()));
        }
        if self.performance.capacity == 0 || self.performance.slow_capacity == 0 {
            return Err(CommonError::Config("performance capacities must be > 0".into()));
        }
        if self.chain.request_timeout_ms == 0 || self.price.request_timeout_ms == 0 {
            return Err(CommonError::Config("request timeouts must be > 0".into()));
        }
        if self.price.market_api_url.is_empty() || self.price.exchange_rate_url.is_empty() {
            return Err(CommonError::Config("price API URLs must not be empty".into()));
        }
        for (network, entry) in &self.networks {
            if entry.rpc_urls.iter().any(|url| url.trim().is_empty()) {
                return Err(CommonError::Config(format!("network {network}: empty rpc url")));
            }
        }
        Ok(())
    }
}
