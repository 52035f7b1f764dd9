//! Background task scheduler.
//!
//! Task được xếp theo độ ưu tiên (cao chạy trước, cùng ưu tiên giữ thứ tự
//! submit) và được một worker loop duy nhất chạy lần lượt từng task. Mỗi task
//! chạy đua với timeout của nó; bên nào xong trước quyết định kết quả của
//! handle, bên thua bị drop (các lời gọi mạng đang dở bị hủy theo).

// Standard library imports
use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

// Third party imports
use futures::{future::BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::{
    sync::{broadcast, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Internal imports
use crate::config::SchedulerConfig;
use crate::error::recover;
use crate::metrics::PerformanceMonitor;

/// Tên thao tác mặc định khi đo hiệu suất task
pub const DEFAULT_OPERATION: &str = "background_task";

/// Lý do một handle bị reject
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Closure của task trả lỗi
    #[error("Task failed: {0}")]
    Failed(String),
    /// Task vượt quá timeout
    #[error("Task {task_id} timed out after {timeout_ms} ms")]
    Timeout { task_id: String, timeout_ms: u64 },
    /// Scheduler bị dừng bằng clear_all (hoặc đã bị drop)
    #[error("Scheduler stopped")]
    Stopped,
}

impl TaskError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }

    fn outcome(&self) -> &'static str {
        match self {
            TaskError::Failed(_) => "failed",
            TaskError::Timeout { .. } => "timeout",
            TaskError::Stopped => "stopped",
        }
    }
}

/// Tùy chọn khi submit task
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Độ ưu tiên, cao hơn chạy trước
    pub priority: i32,
    /// Thời gian tối đa cho task
    pub timeout: Duration,
    /// Nhóm thống kê hiệu suất
    pub operation: String,
}

impl TaskOptions {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            priority: config.default_priority,
            timeout: config.default_timeout(),
            operation: DEFAULT_OPERATION.to_string(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Sự kiện phát ra từ scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    Queued { task_id: String, priority: i32, queue_len: usize },
    Started { task_id: String },
    Completed { task_id: String, elapsed_ms: u64 },
    Failed { task_id: String, error: String },
    TimedOut { task_id: String, timeout_ms: u64 },
    Stopped { rejected: usize },
}

/// Thống kê scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Số task đang chờ
    pub queued: usize,
    /// Số task đang chạy (0 hoặc 1)
    pub active: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub stopped: u64,
}

/// Handle một lần: nhận kết quả hoặc lỗi của task
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: String,
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Chờ task kết thúc
    pub async fn wait(self) -> Result<T, TaskError> {
        // Sender bị drop mà chưa settle nghĩa là scheduler đã bị hủy
        self.rx.await.unwrap_or(Err(TaskError::Stopped))
    }
}

/// Ô settle một lần cho handle
struct Completion<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T, TaskError>>>>,
}

impl<T> Completion<T> {
    fn settle(&self, result: Result<T, TaskError>) -> bool {
        match recover(self.tx.lock()).take() {
            Some(tx) => {
                // Caller có thể đã bỏ handle, kết quả khi đó bị bỏ qua
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }
}

/// Phần type-erased của Completion mà worker và clear_all dùng để reject
trait Settle: Send + Sync {
    fn reject(&self, err: TaskError) -> bool;
}

impl<T: Send> Settle for Completion<T> {
    fn reject(&self, err: TaskError) -> bool {
        self.settle(Err(err))
    }
}

struct QueuedTask {
    id: String,
    priority: i32,
    timeout: Duration,
    operation: String,
    created_at: Instant,
    work: BoxFuture<'static, Result<(), TaskError>>,
    completion: Arc<dyn Settle>,
}

struct InFlight {
    id: String,
    completion: Arc<dyn Settle>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<QueuedTask>,
    in_flight: Option<InFlight>,
    worker_running: bool,
    stats: SchedulerStats,
}

struct Inner {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    events: broadcast::Sender<SchedulerEvent>,
    monitor: Option<PerformanceMonitor>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        recover(self.state.lock())
    }

    fn emit(&self, event: SchedulerEvent) {
        // Không có subscriber không phải là lỗi
        let _ = self.events.send(event);
    }
}

/// Trả worker về trạng thái idle nếu worker loop bị unwind giữa chừng
struct DrainGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let in_flight = {
            let mut state = self.inner.lock();
            state.worker_running = false;
            state.in_flight.take()
        };
        warn!("Worker loop dừng bất thường");
        if let Some(in_flight) = in_flight {
            in_flight
                .completion
                .reject(TaskError::Failed("worker loop aborted".to_string()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

enum Outcome {
    Completed,
    Failed(TaskError),
    TimedOut(TaskError),
    Stopped,
}

/// Scheduler chạy task nền, một task tại một thời điểm.
///
/// Clone rẻ: mọi bản clone dùng chung queue. Tạo một lần khi khởi động và
/// truyền handle cho các caller.
#[derive(Clone)]
pub struct BackgroundScheduler {
    inner: Arc<Inner>,
}

impl BackgroundScheduler {
    /// Tạo scheduler mới
    pub fn new(config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SchedulerState::default()),
                events,
                monitor: None,
            }),
        }
    }

    /// Tạo scheduler có đo hiệu suất cho từng task
    pub fn with_monitor(config: SchedulerConfig, monitor: PerformanceMonitor) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SchedulerState::default()),
                events,
                monitor: Some(monitor),
            }),
        }
    }

    /// Tùy chọn mặc định lấy từ cấu hình
    pub fn default_options(&self) -> TaskOptions {
        TaskOptions::from_config(&self.inner.config)
    }

    /// Nhận sự kiện của scheduler
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Đưa task vào queue và trả handle ngay.
    ///
    /// Phải gọi trong tokio runtime: worker loop được spawn khi đang idle.
    pub fn submit<T, F, Fut>(&self, id: impl Into<String>, work: F, options: TaskOptions) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Completion {
            tx: Mutex::new(Some(tx)),
        });

        let resolver = Arc::clone(&completion);
        let work: BoxFuture<'static, Result<(), TaskError>> = Box::pin(async move {
            match AssertUnwindSafe(async move { work().await }).catch_unwind().await {
                Ok(Ok(value)) => {
                    resolver.settle(Ok(value));
                    Ok(())
                }
                Ok(Err(e)) => Err(TaskError::Failed(format!("{e:#}"))),
                Err(payload) => Err(TaskError::Failed(format!(
                    "task panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        });

        let task = QueuedTask {
            id: id.clone(),
            priority: options.priority,
            timeout: options.timeout,
            operation: options.operation,
            created_at: Instant::now(),
            work,
            completion,
        };

        let (queue_len, start_worker) = {
            let mut state = self.inner.lock();
            // Chèn sau mọi task có ưu tiên >= để giữ thứ tự submit
            let position = state
                .queue
                .iter()
                .position(|queued| queued.priority < task.priority)
                .unwrap_or(state.queue.len());
            state.queue.insert(position, task);
            state.stats.submitted += 1;

            let start_worker = !state.worker_running;
            state.worker_running = true;
            (state.queue.len(), start_worker)
        };

        debug!(task_id = %id, priority = options.priority, queue_len, "Đã thêm task vào queue");
        self.inner.emit(SchedulerEvent::Queued {
            task_id: id.clone(),
            priority: options.priority,
            queue_len,
        });

        if start_worker {
            tokio::spawn(Self::drain(Arc::clone(&self.inner)));
        }

        TaskHandle { id, rx }
    }

    /// Worker loop: chạy từng task cho đến khi queue rỗng
    async fn drain(inner: Arc<Inner>) {
        debug!("Worker loop bắt đầu");
        let mut guard = DrainGuard {
            inner: Arc::clone(&inner),
            armed: true,
        };
        loop {
            let (task, cancel) = {
                let mut state = inner.lock();
                match state.queue.pop_front() {
                    Some(task) => {
                        let cancel = CancellationToken::new();
                        state.in_flight = Some(InFlight {
                            id: task.id.clone(),
                            completion: Arc::clone(&task.completion),
                            cancel: cancel.clone(),
                        });
                        (task, cancel)
                    }
                    None => {
                        state.worker_running = false;
                        guard.armed = false;
                        break;
                    }
                }
            };

            Self::run_task(&inner, task, cancel).await;

            // Nhường CPU cho các việc khác trong runtime
            let pause = inner.config.yield_interval();
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pause).await;
            }
        }
        debug!("Worker loop idle");
    }

    async fn run_task(inner: &Inner, task: QueuedTask, cancel: CancellationToken) {
        let QueuedTask {
            id,
            priority,
            timeout,
            operation,
            created_at,
            work,
            completion,
        } = task;

        let waited = created_at.elapsed();
        debug!(task_id = %id, priority, waited_ms = waited.as_millis() as u64, "Bắt đầu task");
        inner.emit(SchedulerEvent::Started { task_id: id.clone() });

        let timing = inner
            .monitor
            .as_ref()
            .map(|monitor| monitor.start_timing(&operation, &id));
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Stopped,
            result = tokio::time::timeout(timeout, work) => match result {
                Ok(Ok(())) => Outcome::Completed,
                Ok(Err(err)) => Outcome::Failed(err),
                Err(_) => Outcome::TimedOut(TaskError::Timeout {
                    task_id: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        };
        let elapsed = started.elapsed();

        let label = {
            let mut state = inner.lock();
            if state.in_flight.as_ref().map(|f| f.id.as_str()) == Some(id.as_str()) {
                state.in_flight = None;
            }
            match &outcome {
                Outcome::Completed => {
                    state.stats.completed += 1;
                    "completed"
                }
                Outcome::Failed(err) => {
                    state.stats.failed += 1;
                    err.outcome()
                }
                Outcome::TimedOut(err) => {
                    state.stats.timed_out += 1;
                    err.outcome()
                }
                // clear_all đã đếm và reject
                Outcome::Stopped => "stopped",
            }
        };

        match outcome {
            Outcome::Completed => {
                info!(task_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Task hoàn thành");
                inner.emit(SchedulerEvent::Completed {
                    task_id: id.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            Outcome::Failed(err) => {
                warn!(task_id = %id, error = %err, "Task thất bại");
                inner.emit(SchedulerEvent::Failed {
                    task_id: id.clone(),
                    error: err.to_string(),
                });
                completion.reject(err);
            }
            Outcome::TimedOut(err) => {
                warn!(task_id = %id, timeout_ms = timeout.as_millis() as u64, "Task timeout");
                inner.emit(SchedulerEvent::TimedOut {
                    task_id: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
                completion.reject(err);
            }
            Outcome::Stopped => {
                info!(task_id = %id, "Task bị hủy do scheduler dừng");
            }
        }

        ::metrics::counter!("scheduler_tasks_total", 1, "outcome" => label);

        if let Some(timing) = timing {
            let mut details = HashMap::new();
            details.insert("outcome".to_string(), json!(label));
            details.insert("priority".to_string(), json!(priority));
            details.insert("queue_wait_ms".to_string(), json!(waited.as_millis() as u64));
            timing.end(details);
        }
    }

    /// Dừng khẩn cấp: reject mọi task đang chờ và task đang chạy với `Stopped`.
    ///
    /// Future của task đang chạy bị drop, các lời gọi mạng dở dang bị hủy.
    /// Trả về số handle đã bị reject.
    pub fn clear_all(&self) -> usize {
        let (queued, in_flight) = {
            let mut state = self.inner.lock();
            let queued: Vec<QueuedTask> = state.queue.drain(..).collect();
            let in_flight = state.in_flight.take();
            (queued, in_flight)
        };

        let mut rejected = 0;
        for task in queued {
            if task.completion.reject(TaskError::Stopped) {
                rejected += 1;
            }
        }
        if let Some(in_flight) = in_flight {
            in_flight.cancel.cancel();
            if in_flight.completion.reject(TaskError::Stopped) {
                rejected += 1;
            }
        }

        self.inner.lock().stats.stopped += rejected as u64;
        warn!("Scheduler dừng khẩn cấp, đã reject {} task", rejected);
        self.inner.emit(SchedulerEvent::Stopped { rejected });
        rejected
    }

    /// Số task đang chờ
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Số task đang chạy
    pub fn active_count(&self) -> usize {
        usize::from(self.inner.lock().in_flight.is_some())
    }

    /// Worker loop có đang chạy không
    pub fn is_running(&self) -> bool {
        self.inner.lock().worker_running
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.lock();
        SchedulerStats {
            queued: state.queue.len(),
            active: usize::from(state.in_flight.is_some()),
            ..state.stats.clone()
        }
    }
}
