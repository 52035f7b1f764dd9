//! Cấu hình network, token và chuyển đổi đơn vị

pub mod network;
pub mod units;

pub use network::{
    load_networks, predefined_networks, FeeParams, NetworkConfig, NetworkKind, TokenConfig,
    TokenContract,
};
pub use units::{dec_str_to_f64, units_to_f64};
