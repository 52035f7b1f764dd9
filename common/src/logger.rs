// Standard library imports
use std::path::Path;

// Third party imports
use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Internal imports
use crate::config::LoggingConfig;

/// Khởi tạo tracing subscriber.
///
/// `RUST_LOG` được ưu tiên hơn `config.level`. Khi bật ghi file, guard trả về
/// phải được giữ đến khi tắt chương trình để log còn được flush.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let stdout_layer = fmt::layer().with_target(true);

    if !config.file_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    }

    let log_dir = Path::new(&config.directory);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Không thể tạo thư mục log {}", log_dir.display()))?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Some(guard))
}
