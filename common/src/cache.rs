// Standard library imports
use std::{future::Future, time::Duration};

// Third party imports
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

/// Giá trị trong cache kèm thời điểm lưu
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Giá trị lưu trữ
    pub value: T,
    /// Thời điểm lưu
    pub stored_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Tạo entry mới
    pub fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    /// Entry còn trong thời gian sống không
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Lỗi của `TtlCell::get_or_refresh` khi không có giá trị nào để trả
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefreshError<E> {
    /// Refresh vừa chạy và lỗi
    #[error("{0}")]
    Failed(E),
    /// Lần refresh trước lỗi, chưa hết TTL nên không thử lại
    #[error("previous refresh failed, next attempt in {retry_in_ms} ms")]
    Backoff { retry_in_ms: u64 },
}

#[derive(Debug)]
struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    failed_at: Option<Instant>,
}

/// Ô cache một giá trị với TTL.
///
/// Lock được giữ trong lúc refresh: các caller đồng thời trong cùng cửa sổ TTL
/// chờ và dùng lại kết quả thay vì gọi nguồn dữ liệu lần nữa. Refresh lỗi cũng
/// được nhớ trong một TTL.
#[derive(Debug)]
pub struct TtlCell<T> {
    ttl: Duration,
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> TtlCell<T> {
    /// Tạo ô cache rỗng
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(Slot {
                entry: None,
                failed_at: None,
            }),
        }
    }

    /// Lấy giá trị cuối cùng bất kể tuổi
    pub async fn last(&self) -> Option<T> {
        self.slot
            .lock()
            .await
            .entry
            .as_ref()
            .map(|entry| entry.value.clone())
    }

    /// Trả giá trị còn tươi hoặc gọi `refresh`.
    ///
    /// Nếu refresh lỗi mà đã có giá trị cũ thì trả giá trị cũ; chỉ trả lỗi khi
    /// chưa từng có giá trị. Sau một lần lỗi, `refresh` không được gọi lại cho
    /// đến khi hết TTL.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<T, RefreshError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.entry.as_ref() {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.value.clone());
            }
        }

        if let Some(failed_at) = slot.failed_at {
            let since = failed_at.elapsed();
            if since < self.ttl {
                debug!("Refresh lỗi gần đây, chưa thử lại");
                return match slot.entry.as_ref() {
                    Some(stale) => Ok(stale.value.clone()),
                    None => Err(RefreshError::Backoff {
                        retry_in_ms: (self.ttl - since).as_millis() as u64,
                    }),
                };
            }
        }

        match refresh().await {
            Ok(value) => {
                slot.entry = Some(CacheEntry::new(value.clone()));
                slot.failed_at = None;
                Ok(value)
            }
            Err(e) => {
                slot.failed_at = Some(Instant::now());
                match slot.entry.as_ref() {
                    Some(stale) => {
                        warn!("Refresh cache thất bại, dùng giá trị cũ: {}", e);
                        Ok(stale.value.clone())
                    }
                    None => Err(RefreshError::Failed(e)),
                }
            }
        }
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test(start_paused = true)]
    async fn test_value_reused_within_ttl() {
        let cell = TtlCell::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<f64, RefreshError<String>> = cell
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(90.0)
                })
                .await;
            assert_eq!(value.unwrap(), 90.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        let value: Result<f64, RefreshError<String>> = cell
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(95.0)
            })
            .await;
        assert_eq!(value.unwrap(), 95.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_refresh() {
        let cell = Arc::new(TtlCell::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cell.get_or_refresh(|| async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, String>(90.0)
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 90.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_used_when_refresh_fails() {
        let cell = TtlCell::new(Duration::from_secs(60));
        cell.get_or_refresh(|| async { Ok::<_, &str>(88.0) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let value = cell
            .get_or_refresh(|| async { Err::<f64, _>("rate api down") })
            .await;
        assert_eq!(value.unwrap(), 88.0);

        let empty: TtlCell<f64> = TtlCell::new(Duration::from_secs(60));
        let value = empty
            .get_or_refresh(|| async { Err::<f64, _>("rate api down") })
            .await;
        assert_eq!(value, Err(RefreshError::Failed("rate api down")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_not_retried_within_ttl() {
        let cell: TtlCell<f64> = TtlCell::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let failing = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<f64, _>("rate api down")
        };

        assert_eq!(
            cell.get_or_refresh(failing).await,
            Err(RefreshError::Failed("rate api down"))
        );
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            cell.get_or_refresh(failing).await,
            Err(RefreshError::Backoff { retry_in_ms: 40_000 })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(41)).await;
        let value = cell
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(91.0)
            })
            .await;
        assert_eq!(value, Ok(91.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_kept_without_retry_after_failure() {
        let cell = TtlCell::new(Duration::from_secs(60));
        cell.get_or_refresh(|| async { Ok::<_, &str>(88.0) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let calls = AtomicUsize::new(0);
        for _ in 0..4 {
            let value = cell
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<f64, _>("rate api down")
                })
                .await;
            assert_eq!(value, Ok(88.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
