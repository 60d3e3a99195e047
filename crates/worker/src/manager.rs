use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use plm_converter::{ConversionResult, ConvertError, Converter};
use plm_core::error::CoreError;
use plm_core::task::TaskConfig;
use plm_core::types::{timestamp_now, TaskState};
use plm_history::HistoryStore;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cleanup::{self, CleanupReport};
use crate::queue::{job_queue, EnqueueError, JobReceiver, JobSender};
use crate::task::{TaskCounts, TaskRecord};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker tasks draining the queue (at least one is started).
    pub max_workers: usize,
    /// Queue capacity; `0` = unbounded.
    pub queue_size: usize,
    /// Public base URL, used for status URLs.
    pub base_url: String,
    /// Directory holding one run directory per task.
    pub out_root: PathBuf,
    /// Age after which an inactive run directory is reclaimed; zero disables.
    pub ttl: Duration,
    /// Period of the cleanup sweep; zero disables.
    pub cleanup_interval: Duration,
}

struct TaskSlot {
    record: TaskRecord,
    signal: watch::Sender<TaskState>,
}

struct Inner {
    config: WorkerConfig,
    tasks: RwLock<HashMap<String, TaskSlot>>,
    queue: JobSender,
    history: Arc<HistoryStore>,
    converter: Arc<dyn Converter>,
}

/// Owns the job queue, the worker pool and the task registry.
///
/// Tasks are never removed from the registry once accepted; the history
/// store is the durable record.
pub struct TaskManager {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskManager {
    /// Spawn the worker pool and, when enabled, the cleanup loop.
    ///
    /// Background tasks stop when `cancel` fires.
    pub fn start(
        config: WorkerConfig,
        history: Arc<HistoryStore>,
        converter: Arc<dyn Converter>,
        cancel: CancellationToken,
    ) -> Self {
        let (queue, receiver) = job_queue(config.queue_size);
        let worker_count = config.max_workers.max(1);
        let inner = Arc::new(Inner {
            config,
            tasks: RwLock::new(HashMap::new()),
            queue,
            history,
            converter,
        });

        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(worker_count + 1);
        for worker_id in 0..worker_count {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&inner),
                Arc::clone(&receiver),
                cancel.clone(),
            )));
        }

        let (ttl, interval) = (inner.config.ttl, inner.config.cleanup_interval);
        if !ttl.is_zero() && !interval.is_zero() {
            handles.push(tokio::spawn(cleanup_loop(Arc::clone(&inner), cancel.clone())));
        }

        tracing::info!(
            workers = worker_count,
            queue_size = inner.config.queue_size,
            ttl_secs = ttl.as_secs(),
            cleanup_interval_secs = interval.as_secs(),
            "Task manager started",
        );

        Self {
            inner,
            cancel,
            handles: Mutex::new(handles),
        }
    }

    /// Register a task and enqueue it without blocking.
    ///
    /// Fails with `QUEUE_FULL` when the queue is at capacity; the task is
    /// then unregistered as if it had never been submitted.
    pub async fn submit(&self, config: TaskConfig) -> Result<TaskRecord, CoreError> {
        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let record = TaskRecord::queued(task_id.clone(), config);
        let (signal, _) = watch::channel(TaskState::Queued);

        self.inner.tasks.write().await.insert(
            task_id.clone(),
            TaskSlot {
                record: record.clone(),
                signal,
            },
        );

        if let Err(reason) = self.inner.queue.try_send(task_id.clone()) {
            self.inner.tasks.write().await.remove(&task_id);
            tracing::warn!(task_id = %task_id, ?reason, "Task rejected, queue unavailable");
            return Err(CoreError::Capacity("queue full".into()));
        }

        tracing::info!(
            task_id = %task_id,
            project_id = %record.config.project_id(),
            document_label = %record.config.document_label(),
            "Task queued",
        );
        Ok(record)
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.inner.get(task_id).await
    }

    /// Block until the task is terminal or `timeout` elapses.
    ///
    /// Returns the task's current snapshot either way, or `None` if the id
    /// is unknown. `None` as timeout waits indefinitely.
    pub async fn wait(&self, task_id: &str, timeout: Option<Duration>) -> Option<TaskRecord> {
        let mut rx = {
            let tasks = self.inner.tasks.read().await;
            tasks.get(task_id)?.signal.subscribe()
        };

        let terminal = async move {
            // The sender lives in the registry, which never drops it.
            let _ = rx.wait_for(|state| state.is_terminal()).await;
        };
        match timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, terminal).await.is_err() {
                    tracing::debug!(task_id = %task_id, "Wait timed out");
                }
            }
            None => terminal.await,
        }

        self.get(task_id).await
    }

    pub fn status_url(&self, task_id: &str) -> String {
        format!("{}/status/{task_id}", self.inner.config.base_url)
    }

    pub async fn counts(&self) -> TaskCounts {
        let tasks = self.inner.tasks.read().await;
        let mut counts = TaskCounts::default();
        for slot in tasks.values() {
            counts.add(slot.record.state);
        }
        counts
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Run one cleanup sweep now.
    pub async fn cleanup_once(&self) -> CleanupReport {
        self.inner.cleanup_once(SystemTime::now()).await
    }

    /// Run one cleanup sweep as if the clock read `now`.
    pub async fn cleanup_at(&self, now: SystemTime) -> CleanupReport {
        self.inner.cleanup_once(now).await
    }

    /// Cancel background tasks and wait up to `grace` for them to finish.
    pub async fn shutdown(&self, grace: Duration) {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::warn!("Worker did not stop within the grace period");
            }
        }
        tracing::info!("Task manager stopped");
    }
}

impl Inner {
    async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|slot| slot.record.clone())
    }

    /// Paths that must survive a sweep: run dir, input and output of every
    /// queued or running task.
    async fn active_paths(&self) -> Vec<PathBuf> {
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .filter(|slot| !slot.record.state.is_terminal())
            .flat_map(|slot| {
                let config = &slot.record.config;
                [
                    config.work_dir.clone(),
                    config.input_path.clone(),
                    config.output_dir.clone(),
                ]
            })
            .collect()
    }

    async fn cleanup_once(&self, now: SystemTime) -> CleanupReport {
        let active = self.active_paths().await;
        cleanup::sweep_expired(&self.config.out_root, self.config.ttl, &active, now).await
    }

    /// Claim a queued task, returning its configuration.
    async fn mark_running(&self, task_id: &str) -> Option<Arc<TaskConfig>> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks.get_mut(task_id)?;
        if slot.record.state != TaskState::Queued {
            return None;
        }
        slot.record.state = TaskState::Running;
        slot.record.started_at = Some(timestamp_now());
        slot.signal.send_replace(TaskState::Running);
        Some(Arc::clone(&slot.record.config))
    }

    async fn run_task(&self, worker_id: usize, task_id: &str) {
        let Some(config) = self.mark_running(task_id).await else {
            tracing::warn!(worker_id, task_id = %task_id, "Dequeued task is not claimable");
            return;
        };
        tracing::info!(worker_id, task_id = %task_id, "Task started");

        let converter = Arc::clone(&self.converter);
        let outcome = match tokio::spawn(async move { converter.convert(&config).await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(ConvertError::Exception(format!("converter aborted: {e}"))),
        };

        let Some(record) = self.finish(task_id, outcome).await else {
            return;
        };
        match record.state {
            TaskState::Done => tracing::info!(worker_id, task_id = %task_id, "Task completed"),
            _ => tracing::warn!(
                worker_id,
                task_id = %task_id,
                error_code = ?record.error_code,
                error = record.error.as_deref().unwrap_or_default(),
                "Task failed",
            ),
        }

        self.history.record(record.to_history_entry()).await;

        if let Some(slot) = self.tasks.read().await.get(task_id) {
            slot.signal.send_replace(record.state);
        }
    }

    async fn finish(
        &self,
        task_id: &str,
        outcome: Result<ConversionResult, ConvertError>,
    ) -> Option<TaskRecord> {
        let mut tasks = self.tasks.write().await;
        let record = &mut tasks.get_mut(task_id)?.record;
        match outcome {
            Ok(result) => {
                record.state = TaskState::Done;
                record.result = Some(result);
            }
            Err(e) => {
                record.state = TaskState::Error;
                record.error_code = Some(e.code());
                record.error = Some(e.to_string());
            }
        }
        record.finished_at = Some(timestamp_now());
        Some(record.clone())
    }
}

async fn worker_loop(
    worker_id: usize,
    inner: Arc<Inner>,
    receiver: Arc<Mutex<JobReceiver>>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");
    loop {
        let next = {
            let mut receiver = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                guard = receiver.lock() => guard,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                task_id = receiver.recv() => task_id,
            }
        };
        match next {
            Some(task_id) => inner.run_task(worker_id, &task_id).await,
            None => break,
        }
    }
    tracing::debug!(worker_id, "Worker stopped");
}

async fn cleanup_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(inner.config.cleanup_interval);
    // The first tick completes immediately; sweep only after a full period.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup loop stopping");
                break;
            }
            _ = interval.tick() => {
                inner.cleanup_once(SystemTime::now()).await;
            }
        }
    }
}
