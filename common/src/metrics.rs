// Standard library imports
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

// Third party imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, warn};

// Internal imports
use crate::config::PerformanceConfig;
use crate::error::recover;

/// Một mẫu đo thời gian cho một thao tác
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Tên thao tác (nhóm thống kê)
    pub operation: String,
    /// Đối tượng của thao tác (task id, địa chỉ ví, ...)
    pub subject: String,
    /// Thời điểm bắt đầu
    pub started_at: DateTime<Utc>,
    /// Thời điểm kết thúc
    pub finished_at: DateTime<Utc>,
    /// Thời gian thực hiện (ms)
    pub duration_ms: f64,
    /// Thông tin bổ sung
    pub details: HashMap<String, Value>,
    /// Thời điểm ghi nhận
    pub timestamp: DateTime<Utc>,
}

/// Mức cảnh báo cho một thao tác vượt ngưỡng chậm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowSeverity {
    /// Vượt ngưỡng
    Warning,
    /// Vượt gấp đôi ngưỡng
    Critical,
}

impl SlowSeverity {
    /// `None` khi thời gian không vượt ngưỡng
    pub fn classify(elapsed: Duration, threshold: Duration) -> Option<Self> {
        if elapsed > threshold * 2 {
            Some(Self::Critical)
        } else if elapsed > threshold {
            Some(Self::Warning)
        } else {
            None
        }
    }
}

/// Thống kê theo từng thao tác
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub average_ms: f64,
    pub slow_count: usize,
    pub slow_percentage: f64,
}

/// Xếp loại hiệu suất, từ tốt nhất đến tệ nhất
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PerformanceGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl PerformanceGrade {
    /// Hàm bậc thang đơn điệu theo thời gian trung bình và tỷ lệ chậm.
    ///
    /// Các mốc thời gian tính theo ngưỡng chậm `threshold_ms`.
    pub fn classify(average_ms: f64, slow_percentage: f64, threshold_ms: f64) -> Self {
        const STEPS: [(f64, f64, PerformanceGrade); 4] = [
            (0.5, 5.0, PerformanceGrade::Excellent),
            (1.0, 10.0, PerformanceGrade::Good),
            (2.0, 25.0, PerformanceGrade::Fair),
            (3.0, 50.0, PerformanceGrade::Poor),
        ];

        STEPS
            .iter()
            .find(|(avg_factor, max_slow, _)| {
                average_ms < threshold_ms * avg_factor && slow_percentage < *max_slow
            })
            .map(|(_, _, grade)| *grade)
            .unwrap_or(PerformanceGrade::Critical)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceGrade::Excellent => "excellent",
            PerformanceGrade::Good => "good",
            PerformanceGrade::Fair => "fair",
            PerformanceGrade::Poor => "poor",
            PerformanceGrade::Critical => "critical",
        }
    }
}

/// Thống kê nhanh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorStats {
    pub total_operations: usize,
    pub slow_operations: usize,
    pub average_ms: f64,
}

/// Báo cáo tổng hợp trên các metric đang được giữ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_operations: usize,
    pub average_ms: f64,
    pub slow_threshold_ms: u64,
    pub slow_operations: usize,
    pub slow_percentage: f64,
    pub fast_percentage: f64,
    pub operations: BTreeMap<String, OperationStats>,
    pub slowest: Vec<Metric>,
    pub grade: PerformanceGrade,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MonitorState {
    metrics: VecDeque<Metric>,
    slow: VecDeque<Metric>,
}

/// Đo thời gian các thao tác và tổng hợp thống kê.
///
/// Chỉ quan sát: không bao giờ chặn hay thay đổi kết quả của thao tác được đo.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    config: PerformanceConfig,
    state: Arc<Mutex<MonitorState>>,
}

impl PerformanceMonitor {
    /// Tạo monitor mới
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MonitorState::default())),
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Bắt đầu đo một thao tác
    pub fn start_timing(&self, operation: &str, subject: &str) -> Timing {
        Timing {
            monitor: self.clone(),
            operation: operation.to_string(),
            subject: subject.to_string(),
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    /// Đo một future và trả nguyên kết quả của nó
    pub async fn time<F, T>(&self, operation: &str, subject: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let timing = self.start_timing(operation, subject);
        let output = fut.await;
        timing.end(HashMap::new());
        output
    }

    /// Ghi một metric đã đo xong
    pub fn record(
        &self,
        operation: &str,
        subject: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        details: HashMap<String, Value>,
    ) -> Metric {
        let finished_at = Utc::now();
        let metric = Metric {
            operation: operation.to_string(),
            subject: subject.to_string(),
            started_at,
            finished_at,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            details,
            timestamp: finished_at,
        };

        let threshold = Duration::from_millis(self.config.slow_threshold_ms);
        let severity = SlowSeverity::classify(elapsed, threshold);
        let is_slow = severity.is_some();

        {
            let mut state = recover(self.state.lock());
            state.metrics.push_back(metric.clone());
            while state.metrics.len() > self.config.capacity {
                state.metrics.pop_front();
            }

            if is_slow {
                state.slow.push_back(metric.clone());
                while state.slow.len() > self.config.slow_capacity {
                    state.slow.pop_front();
                }
            }
        }

        ::metrics::histogram!(
            "operation_duration_ms",
            metric.duration_ms,
            "operation" => metric.operation.clone()
        );

        match severity {
            Some(SlowSeverity::Critical) => error!(
                operation = %metric.operation,
                subject = %metric.subject,
                duration_ms = metric.duration_ms,
                critical = true,
                "Thao tác cực chậm (> 2x ngưỡng {} ms)",
                self.config.slow_threshold_ms
            ),
            Some(SlowSeverity::Warning) => warn!(
                operation = %metric.operation,
                subject = %metric.subject,
                duration_ms = metric.duration_ms,
                "Thao tác chậm (> ngưỡng {} ms)",
                self.config.slow_threshold_ms
            ),
            None => {}
        }

        metric
    }

    /// Các metric đang giữ, cũ nhất trước
    pub fn metrics(&self) -> Vec<Metric> {
        recover(self.state.lock()).metrics.iter().cloned().collect()
    }

    /// Các metric chậm đang giữ, cũ nhất trước
    pub fn slow_metrics(&self) -> Vec<Metric> {
        recover(self.state.lock()).slow.iter().cloned().collect()
    }

    pub fn stats(&self) -> MonitorStats {
        let state = recover(self.state.lock());
        let threshold = self.config.slow_threshold_ms as f64;
        let total = state.metrics.len();
        let sum: f64 = state.metrics.iter().map(|m| m.duration_ms).sum();

        MonitorStats {
            total_operations: total,
            slow_operations: state.metrics.iter().filter(|m| m.duration_ms > threshold).count(),
            average_ms: if total > 0 { sum / total as f64 } else { 0.0 },
        }
    }

    /// Tạo báo cáo tổng hợp
    pub fn report(&self) -> PerformanceReport {
        let metrics = self.metrics();
        let threshold = self.config.slow_threshold_ms as f64;
        let total = metrics.len();

        let mut operations: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
        for metric in &metrics {
            let entry = operations.entry(metric.operation.clone()).or_default();
            entry.0.push(metric.duration_ms);
            if metric.duration_ms > threshold {
                entry.1 += 1;
            }
        }

        let operations = operations
            .into_iter()
            .map(|(name, (durations, slow_count))| {
                let count = durations.len();
                let stats = OperationStats {
                    count,
                    min_ms: durations.iter().copied().fold(f64::INFINITY, f64::min),
                    max_ms: durations.iter().copied().fold(0.0, f64::max),
                    average_ms: durations.iter().sum::<f64>() / count as f64,
                    slow_count,
                    slow_percentage: percentage(slow_count, count),
                };
                (name, stats)
            })
            .collect();

        let slow_operations = metrics.iter().filter(|m| m.duration_ms > threshold).count();
        let average_ms = if total > 0 {
            metrics.iter().map(|m| m.duration_ms).sum::<f64>() / total as f64
        } else {
            0.0
        };
        let slow_percentage = percentage(slow_operations, total);

        let mut slowest = metrics;
        slowest.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
        slowest.truncate(self.config.report_top_n);

        PerformanceReport {
            total_operations: total,
            average_ms,
            slow_threshold_ms: self.config.slow_threshold_ms,
            slow_operations,
            slow_percentage,
            fast_percentage: if total > 0 { 100.0 - slow_percentage } else { 0.0 },
            operations,
            slowest,
            grade: PerformanceGrade::classify(average_ms, slow_percentage, threshold),
            generated_at: Utc::now(),
        }
    }

    /// Xóa toàn bộ metric
    pub fn clear(&self) {
        let mut state = recover(self.state.lock());
        state.metrics.clear();
        state.slow.clear();
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Bộ đếm thời gian đang chạy, kết thúc bằng [`Timing::end`]
#[must_use = "gọi end() để ghi metric"]
#[derive(Debug)]
pub struct Timing {
    monitor: PerformanceMonitor,
    operation: String,
    subject: String,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Timing {
    /// Kết thúc đo và ghi metric
    pub fn end(self, details: HashMap<String, Value>) -> Metric {
        let elapsed = self.start.elapsed();
        self.monitor
            .record(&self.operation, &self.subject, self.started_at, elapsed, details)
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(capacity: usize, slow_capacity: usize) -> PerformanceMonitor {
        PerformanceMonitor::new(PerformanceConfig {
            capacity,
            slow_capacity,
            slow_threshold_ms: 100,
            report_top_n: 3,
        })
    }

    fn record_ms(monitor: &PerformanceMonitor, operation: &str, subject: &str, ms: u64) {
        monitor.record(
            operation,
            subject,
            Utc::now(),
            Duration::from_millis(ms),
            HashMap::new(),
        );
    }

    /// Writer gom log vào bộ nhớ cho test
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    #[test]
    fn test_slow_severity_boundaries() {
        let threshold = Duration::from_millis(100);
        let classify = |ms| SlowSeverity::classify(Duration::from_millis(ms), threshold);

        assert_eq!(classify(50), None);
        assert_eq!(classify(100), None);
        assert_eq!(classify(101), Some(SlowSeverity::Warning));
        assert_eq!(classify(200), Some(SlowSeverity::Warning));
        assert_eq!(classify(201), Some(SlowSeverity::Critical));
    }

    #[test]
    fn test_slow_operations_are_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let monitor = monitor(10, 10);

            record_ms(&monitor, "op", "fast", 100);
            assert_eq!(logs.take(), "");

            record_ms(&monitor, "op", "slow", 150);
            let output = logs.take();
            assert!(output.contains("WARN"), "{output}");
            assert!(!output.contains("critical=true"), "{output}");

            record_ms(&monitor, "op", "very-slow", 250);
            let output = logs.take();
            assert!(output.contains("ERROR"), "{output}");
            assert!(output.contains("critical=true"), "{output}");
            assert!(output.contains("subject=very-slow"), "{output}");
        });
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let monitor = monitor(5, 5);
        for i in 0..6 {
            record_ms(&monitor, "op", &format!("subject-{i}"), 10);
        }

        let metrics = monitor.metrics();
        assert_eq!(metrics.len(), 5);
        assert!(metrics.iter().all(|m| m.subject != "subject-0"));
        assert_eq!(metrics.last().unwrap().subject, "subject-5");
    }

    #[test]
    fn test_slow_list_is_bounded() {
        let monitor = monitor(100, 2);
        record_ms(&monitor, "op", "fast", 50);
        record_ms(&monitor, "op", "slow-1", 150);
        record_ms(&monitor, "op", "slow-2", 250);
        record_ms(&monitor, "op", "slow-3", 120);

        let slow: Vec<_> = monitor.slow_metrics().into_iter().map(|m| m.subject).collect();
        assert_eq!(slow, vec!["slow-2", "slow-3"]);
        assert_eq!(monitor.metrics().len(), 4);
    }

    #[test]
    fn test_report_breakdown() {
        let monitor = monitor(100, 10);
        record_ms(&monitor, "balance", "a", 40);
        record_ms(&monitor, "balance", "b", 160);
        record_ms(&monitor, "price", "c", 20);
        record_ms(&monitor, "price", "d", 30);
        record_ms(&monitor, "price", "e", 300);

        let report = monitor.report();
        assert_eq!(report.total_operations, 5);
        assert_eq!(report.slow_operations, 2);
        assert!((report.slow_percentage - 40.0).abs() < 1e-9);
        assert!((report.fast_percentage - 60.0).abs() < 1e-9);
        assert!((report.average_ms - 110.0).abs() < 1e-6);

        let balance = &report.operations["balance"];
        assert_eq!(balance.count, 2);
        assert!((balance.min_ms - 40.0).abs() < 1e-6);
        assert!((balance.max_ms - 160.0).abs() < 1e-6);
        assert!((balance.slow_percentage - 50.0).abs() < 1e-9);

        let slowest: Vec<_> = report.slowest.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(slowest, vec!["e", "b", "a"]);
    }

    #[test]
    fn test_grade_is_monotonic() {
        assert_eq!(PerformanceGrade::classify(10.0, 0.0, 100.0), PerformanceGrade::Excellent);
        assert_eq!(PerformanceGrade::classify(80.0, 8.0, 100.0), PerformanceGrade::Good);
        assert_eq!(PerformanceGrade::classify(150.0, 20.0, 100.0), PerformanceGrade::Fair);
        assert_eq!(PerformanceGrade::classify(250.0, 40.0, 100.0), PerformanceGrade::Poor);
        assert_eq!(PerformanceGrade::classify(500.0, 90.0, 100.0), PerformanceGrade::Critical);

        // Chậm hơn không bao giờ cho xếp loại tốt hơn
        let mut previous = PerformanceGrade::Excellent;
        for avg in (0..400).step_by(10) {
            let grade = PerformanceGrade::classify(avg as f64, avg as f64 / 5.0, 100.0);
            assert!(grade >= previous);
            previous = grade;
        }
    }

    #[test]
    fn test_clear_resets_everything() {
        let monitor = monitor(10, 10);
        record_ms(&monitor, "op", "a", 500);
        monitor.clear();

        assert!(monitor.metrics().is_empty());
        assert!(monitor.slow_metrics().is_empty());
        assert_eq!(monitor.stats().total_operations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing_measures_future() {
        let monitor = monitor(10, 10);
        let value = monitor
            .time("sleep", "subject", async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                42
            })
            .await;

        assert_eq!(value, 42);
        let metrics = monitor.metrics();
        assert_eq!(metrics.len(), 1);
        assert!(metrics[0].duration_ms >= 250.0);
        assert_eq!(monitor.slow_metrics().len(), 1);
    }
}
