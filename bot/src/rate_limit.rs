// Standard library imports
use std::time::Duration;

// Third party imports
use tokio::{
    sync::Mutex,
    time::{sleep_until, Instant},
};
use tracing::debug;

/// Giãn cách tối thiểu giữa hai lần gọi (bucket một token).
///
/// Caller đến quá sớm bị cho ngủ đến lượt; các caller đồng thời được xếp hàng
/// qua lock.
#[derive(Debug)]
pub struct CallSpacing {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallSpacing {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Chờ đến khi được phép gọi và đánh dấu lần gọi
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let next_allowed = previous + self.min_interval;
            if next_allowed > Instant::now() {
                debug!("Giãn cách lời gọi, chờ {:?}", next_allowed - Instant::now());
                metrics::counter!("price_rate_limited_total", 1);
                sleep_until(next_allowed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced() {
        let spacing = CallSpacing::new(Duration::from_millis(1500));
        let start = Instant::now();

        spacing.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        spacing.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));

        tokio::time::advance(Duration::from_secs(5)).await;
        let before = Instant::now();
        spacing.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_serialised() {
        let spacing = Arc::new(CallSpacing::new(Duration::from_millis(100)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let spacing = Arc::clone(&spacing);
                tokio::spawn(async move { spacing.wait().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
