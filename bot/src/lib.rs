//! Backend portfolio đa network: đọc số dư, tổng hợp giá và dựng portfolio
//! trong scheduler nền.

pub mod ops;
pub mod pipeline;
pub mod portfolio;
pub mod price;
pub mod rate_limit;

pub use ops::OperationalReport;
pub use pipeline::{PortfolioError, PortfolioService};
pub use portfolio::{format_portfolio, PortfolioTotal, PortfolioView, TokenHolding};
pub use price::{PriceAggregator, PriceRecord, PriceSource};
