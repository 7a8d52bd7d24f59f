//! The serialized request pipeline.
//!
//! Producers enqueue requests from any thread; a single worker thread
//! drains the bounded queue and executes them in arrival order, which gives
//! the container a total order over mutations. Responses are delivered
//! through per-request-id oneshot channels, so a caller waiting on one id
//! wakes only for that id.
//!
//! Exactly two synchronization points exist: the request queue and the
//! response map. Everything else lives on the worker.
//!
//! Lifecycle:
//!
//! ```text
//! uninitialized -> initialized -> running <-> paused -> stopped
//! ```
//!
//! `Engine::open` covers the first two states; [`Pipeline::start`] enters
//! `running`. On shutdown the request in flight completes and everything
//! still queued is answered with a `Shutdown` status.

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::events::EventLog;
use crate::unix_now;
use omnifs_protocol::{Operation, QueueStats, Request, Response, StatusCode};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Pipeline lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No engine attached yet.
    Uninitialized,
    /// Engine opened, worker not running.
    Initialized,
    /// Worker executing requests.
    Running,
    /// Worker parked; requests queue up.
    Paused,
    /// Worker stopped; requests are refused.
    Stopped,
}

/// Jobs flowing to the worker.
enum Job {
    Execute(Request),
    Shutdown,
}

/// Atomic execution counters.
#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    errors: AtomicU64,
    total_ms: AtomicU64,
    queued: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> QueueStats {
        let processed = self.processed.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        QueueStats {
            total_processed: processed,
            currently_queued: self.queued.load(Ordering::Relaxed),
            total_errors: self.errors.load(Ordering::Relaxed),
            avg_processing_ms: if processed > 0 { total_ms / processed } else { 0 },
        }
    }
}

/// Lifecycle cell shared between API and worker.
#[derive(Debug)]
struct Lifecycle {
    state: Mutex<LifecycleState>,
    changed: Condvar,
}

impl Lifecycle {
    fn new(state: LifecycleState) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    fn get(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        self.changed.notify_all();
    }

    /// Blocks the worker while paused.
    fn wait_while_paused(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while *state == LifecycleState::Paused {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

type SenderMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// The request pipeline.
///
/// Every method takes `&self`, so producers can share one instance behind
/// an `Arc`.
pub struct Pipeline {
    tx: mpsc::Sender<Job>,
    /// Worker side of the response map.
    senders: SenderMap,
    /// Waiter side of the response map.
    receivers: Mutex<HashMap<u64, oneshot::Receiver<Response>>>,
    counters: Arc<Counters>,
    lifecycle: Arc<Lifecycle>,
    events: Arc<EventLog>,
    next_id: AtomicU64,
    default_timeout: Duration,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Pipeline {
    /// Starts the worker thread over an opened engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start(engine: Engine, config: &Config) -> Result<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let senders: SenderMap = Arc::new(Mutex::new(HashMap::new()));
        let counters = Arc::new(Counters::default());
        let lifecycle = Arc::new(Lifecycle::new(LifecycleState::Running));
        let events = engine.events();

        let worker = {
            let senders = Arc::clone(&senders);
            let counters = Arc::clone(&counters);
            let lifecycle = Arc::clone(&lifecycle);
            thread::Builder::new()
                .name("omnifs-worker".to_string())
                .spawn(move || worker_loop(engine, rx, senders, counters, lifecycle))
                .map_err(omnifs_container::ContainerError::Io)?
        };

        tracing::info!(capacity = config.queue_capacity, "pipeline started");
        Ok(Self {
            tx,
            senders,
            receivers: Mutex::new(HashMap::new()),
            counters,
            lifecycle,
            events,
            next_id: AtomicU64::new(0),
            default_timeout: Duration::from_secs(config.queue_timeout),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }

    /// The engine's event log.
    #[must_use]
    pub fn events(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    /// Execution statistics. Readable from any thread without a request.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// Parks the worker after its current request.
    pub fn pause(&self) {
        if self.lifecycle.get() == LifecycleState::Running {
            self.lifecycle.set(LifecycleState::Paused);
            tracing::info!("pipeline paused");
        }
    }

    /// Resumes a paused worker.
    pub fn resume(&self) {
        if self.lifecycle.get() == LifecycleState::Paused {
            self.lifecycle.set(LifecycleState::Running);
            tracing::info!("pipeline resumed");
        }
    }

    /// Enqueues an operation, suspending while the queue is full.
    ///
    /// Returns the request id to retrieve the response with.
    ///
    /// # Errors
    ///
    /// Returns `Shutdown` once the pipeline has stopped.
    pub async fn submit(&self, session: &str, op: Operation) -> Result<u64> {
        if self.lifecycle.get() == LifecycleState::Stopped {
            return Err(EngineError::Shutdown);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (resp_tx, resp_rx) = oneshot::channel();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, resp_tx);
        self.receivers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, resp_rx);

        let request = Request {
            id,
            session: session.to_string(),
            op,
            enqueued_at: unix_now(),
        };
        self.counters.queued.fetch_add(1, Ordering::Relaxed);

        if self.tx.send(Job::Execute(request)).await.is_err() {
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            self.senders
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            self.receivers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(EngineError::Shutdown);
        }
        Ok(id)
    }

    /// Waits for the response to `id` using the configured default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`wait_response_timeout`](Self::wait_response_timeout).
    pub async fn wait_response(&self, id: u64) -> Result<Response> {
        self.wait_response_timeout(id, self.default_timeout).await
    }

    /// Waits up to `timeout` for the response to `id`.
    ///
    /// A timeout leaves the pending request untouched; the response stays
    /// retrievable under the same id afterwards.
    ///
    /// # Errors
    ///
    /// `UnknownRequest` for an id never submitted (or already retrieved),
    /// `Timeout` when the wait elapses, `Shutdown` when the worker died
    /// without answering.
    pub async fn wait_response_timeout(&self, id: u64, timeout: Duration) -> Result<Response> {
        let mut rx = self
            .receivers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .ok_or(EngineError::UnknownRequest(id))?;

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_closed)) => Err(EngineError::Shutdown),
            Err(_elapsed) => {
                self.receivers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(id, rx);
                Err(EngineError::Timeout)
            }
        }
    }

    /// Submits an operation and waits for its response.
    ///
    /// # Errors
    ///
    /// Propagates submit and wait errors.
    pub async fn execute(&self, session: &str, op: Operation) -> Result<Response> {
        let id = self.submit(session, op).await?;
        self.wait_response(id).await
    }

    /// Stops the pipeline. The request in flight on the worker completes;
    /// everything still queued is answered with a `Shutdown` status; then
    /// the container is flushed and closed. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker cannot be joined.
    pub async fn shutdown(&self) -> Result<()> {
        self.lifecycle.set(LifecycleState::Stopped);
        // Wake the worker even if the queue is empty.
        let _ = self.tx.send(Job::Shutdown).await;

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| {
                    EngineError::InvalidOperation(format!("worker join task failed: {e}"))
                })?
                .map_err(|_| {
                    EngineError::InvalidOperation("worker thread panicked".to_string())
                })?;
            tracing::info!("pipeline stopped");
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Best effort for a dropped-without-shutdown pipeline: stop accepting
        // work and let the worker observe the closed channel.
        self.lifecycle.set(LifecycleState::Stopped);
    }
}

fn worker_loop(
    mut engine: Engine,
    mut rx: mpsc::Receiver<Job>,
    senders: SenderMap,
    counters: Arc<Counters>,
    lifecycle: Arc<Lifecycle>,
) {
    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Execute(request) => {
                lifecycle.wait_while_paused();
                counters.queued.fetch_sub(1, Ordering::Relaxed);
                // A request dequeued after the stop flag is drained, not run.
                let response = if lifecycle.get() == LifecycleState::Stopped {
                    refuse_one(request, &counters)
                } else {
                    run_one(&mut engine, request, &counters)
                };
                deliver(&senders, response);
            }
            Job::Shutdown => {
                drain(&mut rx, &senders, &counters);
                break;
            }
        }
    }

    if let Err(e) = engine.close() {
        tracing::error!(%e, "failed to close container on shutdown");
    }
}

fn run_one(engine: &mut Engine, request: Request, counters: &Counters) -> Response {
    let id = request.id;
    let started = Instant::now();
    let queue_stats = counters.snapshot();

    let mut response =
        match std::panic::catch_unwind(AssertUnwindSafe(|| engine.dispatch(request, queue_stats))) {
            Ok(response) => response,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                for record in engine.events().dump() {
                    tracing::error!(
                        code = %record.code,
                        user = %record.session_user,
                        "ring dump: {}", record.message
                    );
                }
                tracing::error!(request = id, %message, "request panicked");
                Response::failure(id, StatusCode::Io, message)
            }
        };

    let took_ms = started.elapsed().as_millis() as u64;
    response.took_ms = took_ms;
    response.at = unix_now();

    counters.processed.fetch_add(1, Ordering::Relaxed);
    counters.total_ms.fetch_add(took_ms, Ordering::Relaxed);
    if !response.status.is_ok() {
        counters.errors.fetch_add(1, Ordering::Relaxed);
    }
    response
}

fn deliver(senders: &SenderMap, response: Response) {
    let sender = senders
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&response.id);
    if let Some(sender) = sender {
        // The waiter may have given up; that is not an error.
        let _ = sender.send(response);
    }
}

fn refuse_one(request: Request, counters: &Counters) -> Response {
    counters.processed.fetch_add(1, Ordering::Relaxed);
    counters.errors.fetch_add(1, Ordering::Relaxed);
    let mut response =
        Response::failure(request.id, StatusCode::Shutdown, "engine is shutting down");
    response.at = unix_now();
    response
}

fn drain(rx: &mut mpsc::Receiver<Job>, senders: &SenderMap, counters: &Counters) {
    while let Ok(job) = rx.try_recv() {
        if let Job::Execute(request) = job {
            counters.queued.fetch_sub(1, Ordering::Relaxed);
            deliver(senders, refuse_one(request, counters));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnifs_protocol::ResponsePayload;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config {
            total_size: 2 << 20,
            block_size: 512,
            max_files: 256,
            max_users: 8,
            queue_capacity: 32,
            queue_timeout: 5,
            ..Config::default()
        }
    }

    async fn started_pipeline() -> (tempfile::TempDir, Pipeline) {
        let dir = tempdir().unwrap();
        let config = test_config();
        let engine = Engine::format(&config, dir.path().join("t.omni")).unwrap();
        (dir, Pipeline::start(engine, &config).unwrap())
    }

    async fn admin_session(pipeline: &Pipeline) -> String {
        let response = pipeline
            .execute(
                "",
                Operation::Login {
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                },
            )
            .await
            .unwrap();
        match response.payload {
            ResponsePayload::Session(info) => info.session_id,
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let (_dir, pipeline) = started_pipeline().await;
        let session = admin_session(&pipeline).await;

        let response = pipeline
            .execute(
                &session,
                Operation::FileCreate {
                    path: "/a.txt".to_string(),
                    data: b"via pipeline".to_vec(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::Ok);

        let response = pipeline
            .execute(
                &session,
                Operation::FileRead {
                    path: "/a.txt".to_string(),
                },
            )
            .await
            .unwrap();
        match response.payload {
            ResponsePayload::Data(data) => assert_eq!(data, b"via pipeline"),
            other => panic!("unexpected payload: {other:?}"),
        }
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_responses_retrievable_by_id_in_any_order() {
        let (_dir, pipeline) = started_pipeline().await;
        let session = admin_session(&pipeline).await;

        let first = pipeline
            .submit(
                &session,
                Operation::FileCreate {
                    path: "/one".to_string(),
                    data: Vec::new(),
                },
            )
            .await
            .unwrap();
        let second = pipeline
            .submit(
                &session,
                Operation::FileCreate {
                    path: "/two".to_string(),
                    data: Vec::new(),
                },
            )
            .await
            .unwrap();

        // Retrieve out of order.
        let response = pipeline.wait_response(second).await.unwrap();
        assert_eq!(response.id, second);
        assert_eq!(response.status, StatusCode::Ok);
        let response = pipeline.wait_response(first).await.unwrap();
        assert_eq!(response.id, first);

        // A second retrieval of the same id is unknown.
        assert!(matches!(
            pipeline.wait_response(first).await,
            Err(EngineError::UnknownRequest(_))
        ));
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_timeout_leaves_response_retrievable() {
        let (_dir, pipeline) = started_pipeline().await;
        let session = admin_session(&pipeline).await;

        pipeline.pause();
        let id = pipeline
            .submit(
                &session,
                Operation::GetStats,
            )
            .await
            .unwrap();

        let err = pipeline
            .wait_response_timeout(id, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout));

        pipeline.resume();
        let response = pipeline.wait_response(id).await.unwrap();
        assert_eq!(response.status, StatusCode::Ok);
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_count_processed_and_errors() {
        let (_dir, pipeline) = started_pipeline().await;
        let session = admin_session(&pipeline).await;

        pipeline
            .execute(
                &session,
                Operation::FileCreate {
                    path: "/ok".to_string(),
                    data: Vec::new(),
                },
            )
            .await
            .unwrap();
        pipeline
            .execute(
                &session,
                Operation::FileRead {
                    path: "/missing".to_string(),
                },
            )
            .await
            .unwrap();

        let stats = pipeline.stats();
        // login + create + failed read
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.currently_queued, 0);
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_requests() {
        let (_dir, pipeline) = started_pipeline().await;
        let session = admin_session(&pipeline).await;

        // Park the worker so the requests pile up in the queue.
        pipeline.pause();
        let mut ids = Vec::new();
        for i in 0..4 {
            let id = pipeline
                .submit(
                    &session,
                    Operation::FileCreate {
                        path: format!("/queued-{i}"),
                        data: Vec::new(),
                    },
                )
                .await
                .unwrap();
            ids.push(id);
        }

        pipeline.shutdown().await.unwrap();

        // Everything that was still queued was answered with Shutdown.
        for id in ids {
            let response = pipeline
                .wait_response_timeout(id, Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(response.status, StatusCode::Shutdown);
        }

        // New submissions are refused outright.
        assert!(matches!(
            pipeline.submit(&session, Operation::GetStats).await,
            Err(EngineError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let (_dir, pipeline) = started_pipeline().await;
        assert_eq!(pipeline.state(), LifecycleState::Running);
        pipeline.pause();
        assert_eq!(pipeline.state(), LifecycleState::Paused);
        pipeline.resume();
        assert_eq!(pipeline.state(), LifecycleState::Running);
        pipeline.shutdown().await.unwrap();
    }
}
