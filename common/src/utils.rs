// Third party imports
use uuid::Uuid;

/// Tạo task id dạng `{prefix}:{uuid}`
pub fn task_id(prefix: &str) -> String {
    format!("{}:{}", prefix, Uuid::new_v4())
}

/// Định dạng số tiền fiat với hai chữ số thập phân
pub fn format_fiat(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }
    // Tránh hiển thị "-0.00"
    let rounded = (value * 100.0).round() / 100.0;
    format!("{:.2}", if rounded == 0.0 { 0.0 } else { rounded })
}

/// Định dạng số lượng token, bỏ các số 0 thừa ở cuối
pub fn format_amount(value: f64, max_decimals: usize) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    let formatted = format!("{:.1$}", value, max_decimals);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Rút gọn địa chỉ ví: `0x1234...abcd`
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fiat() {
        assert_eq!(format_fiat(10.0), "10.00");
        assert_eq!(format_fiat(900.0), "900.00");
        assert_eq!(format_fiat(0.005), "0.01");
        assert_eq!(format_fiat(-0.001), "0.00");
        assert_eq!(format_fiat(f64::NAN), "0.00");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(10.0, 4), "10");
        assert_eq!(format_amount(1.23456789, 4), "1.2346");
        assert_eq!(format_amount(0.5, 6), "0.5");
        assert_eq!(format_amount(0.0, 4), "0");
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            "0x742d...f44e"
        );
        assert_eq!(short_address("TXYZ"), "TXYZ");
    }

    #[test]
    fn test_task_id_prefix() {
        let id = task_id("portfolio");
        assert!(id.starts_with("portfolio:"));
        assert_ne!(id, task_id("portfolio"));
    }
}
