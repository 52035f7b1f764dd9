// Third party imports
use ethers::{types::U256, utils::format_units};

// Internal imports
use crate::chain_adapters::interfaces::ChainError;

/// Đổi số nguyên đơn vị nhỏ nhất sang số thực: `raw / 10^decimals`
pub fn units_to_f64(raw: U256, decimals: u8) -> Result<f64, ChainError> {
    let text = format_units(raw, decimals as u32)
        .map_err(|e| ChainError::DecodeError(format!("format units: {e}")))?;
    text.parse::<f64>()
        .map_err(|e| ChainError::DecodeError(format!("parse {text}: {e}")))
}

/// Như `units_to_f64` nhưng nhận chuỗi thập phân (TronGrid trả số dư dạng chuỗi)
pub fn dec_str_to_f64(raw: &str, decimals: u8) -> Result<f64, ChainError> {
    let value = U256::from_dec_str(raw.trim())
        .map_err(|e| ChainError::DecodeError(format!("invalid amount {raw}: {e}")))?;
    units_to_f64(value, decimals)
}
