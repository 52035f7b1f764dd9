// Standard library imports
use std::{path::PathBuf, sync::Arc, time::Duration};

// Third party imports
use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};

// Internal imports
use cesbot::{
    ops::OperationalReport,
    price::{InMemoryPriceHistory, PriceAggregator},
    PortfolioService,
};
use cesbot_blockchain::{chain_adapters::validate_address, load_networks, AdapterRegistry};
use cesbot_common::{
    config::AppConfig, logger::init_logging, metrics::PerformanceMonitor, scheduler::BackgroundScheduler,
};

/// Lấy portfolio của các ví trên mọi network hỗ trợ
#[derive(Debug, Parser)]
#[command(name = "cesbot", version, about)]
struct Cli {
    /// Địa chỉ ví (EVM hoặc TRON)
    #[arg(required = true)]
    addresses: Vec<String>,

    /// Thư mục cấu hình
    #[arg(short, long, default_value = "config")]
    config: PathBuf,

    /// Chỉ lấy trên network này
    #[arg(short, long)]
    network: Option<String>,

    /// Độ ưu tiên của task
    #[arg(short, long)]
    priority: Option<i32>,

    /// Timeout mỗi task (ms)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config).context("Không thể nạp cấu hình")?;
    let _guard = init_logging(&config.logging)?;
    info!("Khởi động cesbot");

    let monitor = PerformanceMonitor::new(config.performance.clone());
    let scheduler = BackgroundScheduler::with_monitor(config.scheduler.clone(), monitor.clone());
    let registry = AdapterRegistry::from_networks(load_networks(&config.networks), &config.chain);
    let prices = PriceAggregator::new(config.price.clone(), Arc::new(InMemoryPriceHistory::new()))?
        .with_monitor(monitor.clone());
    let service = PortfolioService::new(registry, Arc::new(prices), monitor.clone());

    let mut options = scheduler.default_options();
    if let Some(priority) = cli.priority {
        options = options.with_priority(priority);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }

    let mut handles = Vec::new();
    for address in &cli.addresses {
        for adapter in service.registry().adapters() {
            if let Some(network) = &cli.network {
                if !adapter.network_id().eq_ignore_ascii_case(network) {
                    continue;
                }
            }
            if validate_address(adapter.network(), address).is_err() {
                continue;
            }
            handles.push(service.submit_portfolio(&scheduler, adapter.network_id(), address, options.clone()));
        }
    }
    info!("Đã đưa {} task portfolio vào scheduler", handles.len());

    for result in join_all(handles.into_iter().map(|handle| handle.wait())).await {
        match result {
            Ok(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            Err(e) => error!("Không lấy được portfolio: {}", e),
        }
    }

    println!("{}", OperationalReport::collect(&scheduler, &monitor).render());
    Ok(())
}
