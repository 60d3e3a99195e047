//! Integration tests for the task manager: lifecycle, back-pressure,
//! waiting and reclamation of run directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use assert_matches::assert_matches;
use async_trait::async_trait;
use plm_converter::{ConversionResult, ConvertError, Converter};
use plm_core::error::{CoreError, ErrorCode};
use plm_core::task::{NamingMode, TaskConfig};
use plm_core::types::TaskState;
use plm_history::{HistoryConfig, HistoryFilter, HistoryStore};
use plm_worker::{TaskManager, WorkerConfig};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Converter that blocks on a semaphore so tests control when work finishes.
///
/// Labels `fail` and `panic` select the failure modes.
struct GatedConverter {
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Converter for GatedConverter {
    async fn convert(&self, config: &TaskConfig) -> Result<ConversionResult, ConvertError> {
        let _ = self.started.send(config.document_label.clone());
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ConvertError::Exception("gate closed".into()))?;

        match config.document_label.as_str() {
            "fail" => Err(ConvertError::Failed("unsupported entity".into())),
            "panic" => panic!("converter blew up"),
            _ => Ok(ConversionResult {
                document_id: config.document_id(),
                manifest: serde_json::json!({"artifacts": {"document_json": "document.json"}}),
                manifest_path: config.output_dir.join("manifest.json").display().to_string(),
                viewer_url: format!("http://localhost:9000/viewer?doc={}", config.document_id()),
                artifact_urls: BTreeMap::new(),
                output_dir: config.output_dir.display().to_string(),
            }),
        }
    }
}

struct Harness {
    manager: TaskManager,
    history: Arc<HistoryStore>,
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedReceiver<String>,
    out_root: tempfile::TempDir,
}

fn harness(max_workers: usize, queue_size: usize) -> Harness {
    let out_root = tempfile::tempdir().unwrap();
    let history = Arc::new(HistoryStore::new(HistoryConfig::default()));
    let gate = Arc::new(Semaphore::new(0));
    let (tx, started) = mpsc::unbounded_channel();
    let converter = Arc::new(GatedConverter {
        gate: Arc::clone(&gate),
        started: tx,
    });
    let manager = TaskManager::start(
        WorkerConfig {
            max_workers,
            queue_size,
            base_url: "http://localhost:9000".into(),
            out_root: out_root.path().to_path_buf(),
            ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::ZERO,
        },
        Arc::clone(&history),
        converter,
        CancellationToken::new(),
    );
    Harness {
        manager,
        history,
        gate,
        started,
        out_root,
    }
}

fn task(root: &Path, run: &str, label: &str) -> TaskConfig {
    let work_dir = root.join(run);
    std::fs::create_dir_all(work_dir.join("input")).unwrap();
    std::fs::create_dir_all(work_dir.join("output")).unwrap();
    TaskConfig {
        plugin: PathBuf::from("/opt/plugins/libdxf.so"),
        input_path: work_dir.join("input/plan.dxf"),
        output_dir: work_dir.join("output"),
        work_dir,
        emit: Vec::new(),
        naming: NamingMode::Legacy,
        convert_cli: None,
        migration: None,
        validation: None,
        project_id: "alpha".into(),
        document_label: label.into(),
        owner: "ana".into(),
        tags: vec!["arch".into()],
        revision_note: String::new(),
        annotations: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Test: queued -> running -> done with ordered timestamps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_progresses_to_done_and_is_recorded() {
    let mut h = harness(1, 4);
    let config = task(h.out_root.path(), "run1", "plan");

    let record = h.manager.submit(config).await.unwrap();
    assert_eq!(record.state, TaskState::Queued);
    assert_eq!(
        h.manager.status_url(&record.task_id),
        format!("http://localhost:9000/status/{}", record.task_id)
    );

    assert_eq!(h.started.recv().await.as_deref(), Some("plan"));
    let running = h.manager.get(&record.task_id).await.unwrap();
    assert_eq!(running.state, TaskState::Running);
    assert!(running.started_at.is_some());

    h.gate.add_permits(1);
    let done = h.manager.wait(&record.task_id, None).await.unwrap();
    assert_eq!(done.state, TaskState::Done);
    assert!(done.result.is_some());
    assert!(done.error.is_none());

    let started = done.started_at.clone().unwrap();
    let finished = done.finished_at.clone().unwrap();
    assert!(done.created_at <= started);
    assert!(started <= finished);

    let history = h.history.list(&HistoryFilter::default(), 0).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].task_id, record.task_id);
    assert_eq!(history[0].state, TaskState::Done);
    assert!(history[0]
        .viewer_url
        .as_deref()
        .unwrap()
        .starts_with("http://localhost:9000/viewer"));
    assert_eq!(history[0].tags, vec!["arch"]);
}

// ---------------------------------------------------------------------------
// Test: converter failures become error states, never crash the worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failures_are_captured_per_task() {
    let h = harness(1, 4);
    h.gate.add_permits(10);

    let failed = h
        .manager
        .submit(task(h.out_root.path(), "r1", "fail"))
        .await
        .unwrap();
    let panicked = h
        .manager
        .submit(task(h.out_root.path(), "r2", "panic"))
        .await
        .unwrap();
    let ok = h
        .manager
        .submit(task(h.out_root.path(), "r3", "plan"))
        .await
        .unwrap();

    let failed = h.manager.wait(&failed.task_id, None).await.unwrap();
    assert_eq!(failed.state, TaskState::Error);
    assert_eq!(failed.error_code, Some(ErrorCode::ConvertFailed));
    assert_eq!(failed.error.as_deref(), Some("unsupported entity"));

    let panicked = h.manager.wait(&panicked.task_id, None).await.unwrap();
    assert_eq!(panicked.state, TaskState::Error);
    assert_eq!(panicked.error_code, Some(ErrorCode::ConvertException));

    // The same worker keeps serving the queue.
    let ok = h.manager.wait(&ok.task_id, None).await.unwrap();
    assert_eq!(ok.state, TaskState::Done);

    let errors = h
        .history
        .list(
            &HistoryFilter {
                state: "error".into(),
                ..Default::default()
            },
            0,
        )
        .await;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.viewer_url.is_none()));
}

// ---------------------------------------------------------------------------
// Test: a full queue rejects submissions with QUEUE_FULL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn over_submission_yields_queue_full() {
    let mut h = harness(1, 1);

    let first = h
        .manager
        .submit(task(h.out_root.path(), "r1", "a"))
        .await
        .unwrap();
    // Worker is now busy with the first task.
    assert_eq!(h.started.recv().await.as_deref(), Some("a"));

    let second = h
        .manager
        .submit(task(h.out_root.path(), "r2", "b"))
        .await
        .unwrap();
    let err = h
        .manager
        .submit(task(h.out_root.path(), "r3", "c"))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Capacity(_));
    assert_eq!(err.code(), ErrorCode::QueueFull);

    let counts = h.manager.counts().await;
    assert_eq!(counts.running, 1);
    assert_eq!(counts.queued, 1);

    h.gate.add_permits(2);
    assert_eq!(
        h.manager.wait(&first.task_id, None).await.unwrap().state,
        TaskState::Done
    );
    assert_eq!(
        h.manager.wait(&second.task_id, None).await.unwrap().state,
        TaskState::Done
    );
    assert_eq!(h.manager.counts().await.done, 2);
}

// ---------------------------------------------------------------------------
// Test: wait honours its timeout and unknown ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wait_times_out_with_pending_snapshot() {
    let h = harness(1, 4);
    let record = h
        .manager
        .submit(task(h.out_root.path(), "r1", "slow"))
        .await
        .unwrap();

    let pending = h
        .manager
        .wait(&record.task_id, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(!pending.state.is_terminal());

    assert!(h.manager.wait("missing", Some(Duration::ZERO)).await.is_none());
    assert!(h.manager.get("missing").await.is_none());
}

// ---------------------------------------------------------------------------
// Test: cleanup removes expired directories of finished tasks only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cleanup_spares_directories_of_active_tasks() {
    let mut h = harness(1, 4);
    let root = h.out_root.path().to_path_buf();

    h.gate.add_permits(1);
    let finished = h.manager.submit(task(&root, "finished", "a")).await.unwrap();
    h.manager.wait(&finished.task_id, None).await.unwrap();
    assert_eq!(h.started.recv().await.as_deref(), Some("a"));

    // No permits left: this one stays running.
    let active = h.manager.submit(task(&root, "active", "b")).await.unwrap();
    assert_eq!(h.started.recv().await.as_deref(), Some("b"));
    // And this one stays queued behind it.
    let queued = h.manager.submit(task(&root, "queued", "c")).await.unwrap();
    std::fs::create_dir_all(root.join("orphan")).unwrap();

    let later = SystemTime::now() + Duration::from_secs(2 * 3600);
    let report = h.manager.cleanup_at(later).await;

    assert!(!root.join("finished").exists());
    assert!(!root.join("orphan").exists());
    assert!(root.join("active").exists());
    assert!(root.join("queued").exists());
    assert_eq!(report.removed, 2);
    assert_eq!(report.skipped_active, 2);

    // Within the TTL nothing is touched.
    let report = h.manager.cleanup_once().await;
    assert_eq!(report.removed, 0);

    h.gate.add_permits(2);
    h.manager.wait(&active.task_id, None).await.unwrap();
    h.manager.wait(&queued.task_id, None).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: shutdown stops the pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_stops_idle_workers() {
    let h = harness(2, 4);
    h.manager.shutdown(Duration::from_secs(1)).await;

    // With no workers left a submitted task is never claimed.
    let record = h
        .manager
        .submit(task(h.out_root.path(), "r1", "late"))
        .await;
    if let Ok(record) = record {
        let snapshot = h
            .manager
            .wait(&record.task_id, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(snapshot.state, TaskState::Queued);
    }
}
