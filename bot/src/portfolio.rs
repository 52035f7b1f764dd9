// Standard library imports
use std::collections::HashMap;

// Third party imports
use serde::{Deserialize, Serialize};

// Internal imports
use crate::price::PriceRecord;
use cesbot_blockchain::{Balance, NetworkConfig};
use cesbot_common::utils::{format_amount, format_fiat};

/// Số chữ số thập phân tối đa khi hiển thị số lượng token
const AMOUNT_DECIMALS: usize = 6;

/// Một dòng token trong portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub symbol: String,
    pub balance: f64,
    pub price_usd: f64,
    pub price_rub: f64,
    pub value_usd: f64,
    pub value_rub: f64,
    pub display_text: String,
    /// Số dư không đọc được, hiển thị 0
    pub degraded: bool,
}

/// Tổng giá trị portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotal {
    pub usd: f64,
    pub rub: f64,
    pub usd_text: String,
    pub rub_text: String,
}

/// Portfolio của một ví trên một network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub network: String,
    pub tokens: Vec<TokenHolding>,
    pub total: PortfolioTotal,
    /// Có ít nhất một số dư bị hạ cấp
    pub degraded: bool,
}

/// Ghép số dư và giá thành portfolio.
///
/// Token theo thứ tự cấu hình của network, các symbol khác xếp sau theo tên.
/// Giá trị USD và RUB tính độc lập từ hai giá; token không có giá đóng góp 0.
pub fn format_portfolio(
    network: &NetworkConfig,
    balances: &HashMap<String, Balance>,
    prices: &HashMap<String, PriceRecord>,
) -> PortfolioView {
    let mut symbols: Vec<&String> = network
        .tokens
        .iter()
        .filter_map(|token| balances.get_key_value(&token.symbol).map(|(symbol, _)| symbol))
        .collect();
    let mut extra: Vec<&String> = balances
        .keys()
        .filter(|symbol| network.token(symbol).is_none())
        .collect();
    extra.sort();
    symbols.extend(extra);

    let tokens: Vec<TokenHolding> = symbols
        .into_iter()
        .map(|symbol| holding(symbol, balances[symbol], prices.get(symbol)))
        .collect();

    let usd: f64 = tokens.iter().map(|t| t.value_usd).sum();
    let rub: f64 = tokens.iter().map(|t| t.value_rub).sum();

    PortfolioView {
        network: network.id.clone(),
        degraded: tokens.iter().any(|t| t.degraded),
        tokens,
        total: PortfolioTotal {
            usd,
            rub,
            usd_text: format_fiat(usd),
            rub_text: format_fiat(rub),
        },
    }
}

fn holding(symbol: &str, balance: Balance, price: Option<&PriceRecord>) -> TokenHolding {
    let price_usd = price.map(|p| p.price_usd).filter(|p| p.is_finite()).unwrap_or(0.0);
    let price_rub = price.map(|p| p.price_rub).filter(|p| p.is_finite()).unwrap_or(0.0);
    let value_usd = balance.value * price_usd;
    let value_rub = balance.value * price_rub;

    let mut display_text = format!(
        "{}: {} (${} / {} ₽)",
        symbol,
        format_amount(balance.value, AMOUNT_DECIMALS),
        format_fiat(value_usd),
        format_fiat(value_rub)
    );
    if balance.degraded {
        display_text.push_str(" ⚠");
    }

    TokenHolding {
        symbol: symbol.to_string(),
        balance: balance.value,
        price_usd,
        price_rub,
        value_usd,
        value_rub,
        display_text,
        degraded: balance.degraded,
    }
}
