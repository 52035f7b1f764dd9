//! Thành phần dùng chung: cấu hình, logging, lỗi, scheduler task nền và đo
//! hiệu suất.

pub mod cache;
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod scheduler;
pub mod utils;

// Re-exports
pub use self::cache::{CacheEntry, RefreshError, TtlCell};
pub use self::config::{
    AppConfig, ChainSettings, LoggingConfig, NetworkOverride, PerformanceConfig, PriceSettings,
    SchedulerConfig, TokenOverride,
};
pub use self::error::{CommonError, CommonResult};
pub use self::metrics::{
    Metric, MonitorStats, OperationStats, PerformanceGrade, PerformanceMonitor, PerformanceReport,
    SlowSeverity, Timing,
};
pub use self::scheduler::{
    BackgroundScheduler, SchedulerEvent, SchedulerStats, TaskError, TaskHandle, TaskOptions,
};
