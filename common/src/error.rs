// Standard library imports
use std::sync::PoisonError;

// Third party imports
use thiserror::Error;

/// Lỗi chung
#[derive(Debug, Error)]
pub enum CommonError {
    /// Lỗi cấu hình
    #[error("Config error: {0}")]
    Config(String),
    /// Lỗi không hợp lệ
    #[error("Invalid: {0}")]
    Invalid(String),
    /// Lỗi IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for CommonError {
    fn from(err: config::ConfigError) -> Self {
        CommonError::Config(err.to_string())
    }
}

/// Kiểu kết quả chung
pub type CommonResult<T> = Result<T, CommonError>;

/// Lấy lock kể cả khi mutex đã bị poison.
///
/// Dữ liệu được bảo vệ (queue, ring buffer) luôn hợp lệ giữa các thao tác.
pub fn recover<G>(result: Result<G, PoisonError<G>>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_common_error() {
        let error = CommonError::Config("missing field".to_string());
        assert_eq!(error.to_string(), "Config error: missing field");
    }

    #[test]
    fn test_recover_poisoned_lock() {
        let shared = Arc::new(Mutex::new(7));
        let cloned = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(shared.is_poisoned());
        assert_eq!(*recover(shared.lock()), 7);
    }
}
