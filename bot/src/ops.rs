// Standard library imports
use std::fmt::Write;

// Third party imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

// Internal imports
use cesbot_common::{
    metrics::{PerformanceMonitor, PerformanceReport},
    scheduler::{BackgroundScheduler, SchedulerStats},
};

/// Ảnh chụp trạng thái vận hành cho dashboard bên ngoài
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalReport {
    pub generated_at: DateTime<Utc>,
    pub scheduler: SchedulerStats,
    pub performance: PerformanceReport,
}

impl OperationalReport {
    pub fn collect(scheduler: &BackgroundScheduler, monitor: &PerformanceMonitor) -> Self {
        Self {
            generated_at: Utc::now(),
            scheduler: scheduler.stats(),
            performance: monitor.report(),
        }
    }

    /// Báo cáo dạng text
    pub fn render(&self) -> String {
        let perf = &self.performance;
        let sched = &self.scheduler;
        let mut out = String::new();

        let _ = writeln!(out, "=== Báo cáo vận hành ({}) ===", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(
            out,
            "Scheduler: queued={} active={} submitted={} completed={} failed={} timed_out={} stopped={}",
            sched.queued, sched.active, sched.submitted, sched.completed, sched.failed, sched.timed_out, sched.stopped
        );
        let _ = writeln!(
            out,
            "Hiệu suất: {} thao tác, trung bình {:.1} ms, chậm {:.1}% (ngưỡng {} ms), xếp loại {}",
            perf.total_operations,
            perf.average_ms,
            perf.slow_percentage,
            perf.slow_threshold_ms,
            perf.grade.label()
        );

        for (operation, stats) in &perf.operations {
            let _ = writeln!(
                out,
                "  - {}: count={} min={:.1} max={:.1} avg={:.1} ms, chậm {:.1}%",
                operation, stats.count, stats.min_ms, stats.max_ms, stats.average_ms, stats.slow_percentage
            );
        }

        if !perf.slowest.is_empty() {
            let _ = writeln!(out, "Chậm nhất:");
            for metric in &perf.slowest {
                let _ = writeln!(out, "  - {} [{}] {:.1} ms", metric.operation, metric.subject, metric.duration_ms);
            }
        }
        out
    }
}

/// Reset vận hành: reject mọi task và xóa metric. Trả số task bị reject.
pub fn reset(scheduler: &BackgroundScheduler, monitor: &PerformanceMonitor) -> usize {
    let rejected = scheduler.clear_all();
    monitor.clear();
    warn!("Đã reset scheduler và metric hiệu suất ({} task bị reject)", rejected);
    rejected
}
