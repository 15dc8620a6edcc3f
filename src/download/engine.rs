//! Download engine: bounded job queue plus a fixed pool of worker tasks.
//!
//! # Overview
//!
//! [`Fetcher`] validates each submitted [`DownloadRequest`], registers it
//! with the configured [`Monitor`] and pushes it onto a bounded FIFO queue.
//! After [`Fetcher::start`], `max_workers` long-lived Tokio tasks pull jobs
//! off the queue and run them through the download pipeline one at a time.
//!
//! # Example
//!
//! ```no_run
//! use dlfetch::{DownloadRequest, Fetcher, FetcherConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(
//!     FetcherConfig::default()
//!         .with_max_workers(2)
//!         .with_target_dir("./downloads")
//!         .with_on_complete(|result| println!("saved {}", result.path.display())),
//! )?;
//! fetcher.start()?;
//! let outcome = fetcher
//!     .enqueue(DownloadRequest::new(1, "https://example.com/paper.pdf"))
//!     .await;
//! assert!(outcome.is_queued());
//! fetcher.stop().await;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, Transport};
use super::constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_QUEUE_CAPACITY, DEFAULT_TARGET_DIR, MAX_WORKERS, MIN_WORKERS,
};
use super::error::DownloadError;
use super::pipeline::Pipeline;
use super::types::{DownloadRequest, DownloadResult, EnqueueResult};
use super::validation::RequestValidator;
use crate::monitor::{Monitor, NoopMonitor};

/// Called on the worker after a job completed.
pub type CompletionCallback = Arc<dyn Fn(DownloadResult) + Send + Sync>;

/// Called on the worker after a job failed.
pub type ErrorCallback = Arc<dyn Fn(&DownloadRequest, &DownloadError) + Send + Sync>;

/// Error type for engine construction and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Worker count outside the supported range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The value that was provided.
        value: usize,
    },

    /// Queue capacity of zero.
    #[error("invalid queue capacity {value}: must be at least 1")]
    InvalidQueueCapacity {
        /// The value that was provided.
        value: usize,
    },

    /// Target directory was set to an empty path.
    #[error("target directory must not be empty")]
    EmptyTargetDir,

    /// The default HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// `start` was called on a running engine.
    #[error("fetcher is already running")]
    AlreadyStarted,

    /// `start` was called after `stop`.
    #[error("fetcher has been stopped")]
    Stopped,
}

/// Construction options for [`Fetcher`].
///
/// Defaults: reqwest transport with 30s connect / 300s read timeouts,
/// 4 workers, `./downloads`, queue capacity 64, no callbacks, a
/// [`NoopMonitor`] and overwrite disabled. Values are checked once, in
/// [`Fetcher::new`].
#[derive(Clone)]
pub struct FetcherConfig {
    transport: Option<Arc<dyn Transport>>,
    max_workers: usize,
    target_dir: PathBuf,
    queue_capacity: usize,
    on_complete: Option<CompletionCallback>,
    on_error: Option<ErrorCallback>,
    monitor: Arc<dyn Monitor>,
    overwrite: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            transport: None,
            max_workers: DEFAULT_MAX_WORKERS,
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_complete: None,
            on_error: None,
            monitor: Arc::new(NoopMonitor::new()),
            overwrite: false,
        }
    }
}

impl FetcherConfig {
    /// Uses a custom transport instead of the default [`HttpClient`].
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the directory downloads are written under.
    #[must_use]
    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    /// Sets how many jobs may wait in the queue before `enqueue` blocks.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn with_on_complete(mut self, callback: impl Fn(DownloadResult) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_on_error(
        mut self,
        callback: impl Fn(&DownloadRequest, &DownloadError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Allows replacing files that already exist at the destination.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn check(&self) -> Result<(), EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.max_workers) {
            return Err(EngineError::InvalidWorkerCount {
                value: self.max_workers,
            });
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidQueueCapacity {
                value: self.queue_capacity,
            });
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(EngineError::EmptyTargetDir);
        }
        Ok(())
    }
}

impl fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("transport", &self.transport)
            .field("max_workers", &self.max_workers)
            .field("target_dir", &self.target_dir)
            .field("queue_capacity", &self.queue_capacity)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("monitor", &self.monitor)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}

/// Lifecycle of a [`Fetcher`]. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    Created,
    Running,
    Stopped,
}

/// Concurrent download engine.
///
/// # Concurrency Model
///
/// - One bounded `mpsc` queue; `enqueue` waits while it is full
/// - `max_workers` Tokio tasks share the receiver and process one job each
///   at a time
/// - Workers check the stop token before taking a job, so `stop` lets
///   in-flight transfers finish; jobs still queued are failed with
///   [`DownloadError::QueueClosed`]
/// - At most one admitted job writes to a given destination at a time
pub struct Fetcher {
    validator: RequestValidator,
    pipeline: Pipeline,
    monitor: Arc<dyn Monitor>,
    max_workers: usize,
    sender: Mutex<Option<mpsc::Sender<DownloadRequest>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<DownloadRequest>>>,
    in_flight: Arc<Mutex<InFlight>>,
    state: Mutex<FetcherState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stop: CancellationToken,
    on_complete: Option<CompletionCallback>,
    on_error: Option<ErrorCallback>,
}

impl Fetcher {
    /// Creates an engine in the `Created` state.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidWorkerCount`] unless `1 <= max_workers <= 100`
    /// - [`EngineError::InvalidQueueCapacity`] for a zero capacity
    /// - [`EngineError::EmptyTargetDir`] for an empty target directory
    /// - [`EngineError::HttpClient`] if the default client cannot be built
    #[instrument(level = "debug", skip(config))]
    pub fn new(config: FetcherConfig) -> Result<Self, EngineError> {
        config.check()?;

        let transport: Arc<dyn Transport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(HttpClient::try_new()?),
        };
        let validator = RequestValidator::new(config.target_dir, config.overwrite);
        let pipeline = Pipeline::new(transport, Arc::clone(&config.monitor), config.overwrite);
        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        debug!(
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            target_dir = %validator.target_dir().display(),
            overwrite = config.overwrite,
            "creating fetcher"
        );

        Ok(Self {
            validator,
            pipeline,
            monitor: config.monitor,
            max_workers: config.max_workers,
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            in_flight: Arc::new(Mutex::new(InFlight::default())),
            state: Mutex::new(FetcherState::Created),
            workers: Mutex::new(Vec::new()),
            stop: CancellationToken::new(),
            on_complete: config.on_complete,
            on_error: config.on_error,
        })
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<dyn Monitor> {
        &self.monitor
    }

    /// Absolute directory downloads are written under.
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        self.validator.target_dir()
    }

    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    #[must_use]
    pub fn state(&self) -> FetcherState {
        *lock(&self.state)
    }

    /// Validates, registers and queues one request.
    ///
    /// Waits while the queue is full. Rejected requests are returned with
    /// the reason and are neither registered nor queued. A request whose
    /// destination belongs to a job that is still queued or running is
    /// rejected with [`DownloadError::Conflict`], even with overwrite on.
    /// Jobs may be queued before [`Fetcher::start`]; they wait as `pending`.
    #[instrument(skip(self, request), fields(id = request.id, url = %request.url))]
    pub async fn enqueue(&self, mut request: DownloadRequest) -> EnqueueResult {
        let Some(sender) = lock(&self.sender).clone() else {
            debug!("rejecting request, fetcher stopped");
            return EnqueueResult::rejected(request, DownloadError::QueueClosed);
        };

        if let Err(error) = self.validator.validate(&mut request) {
            debug!(error = %error, "request rejected");
            return EnqueueResult::rejected(request, error);
        }

        if let Err(error) = lock(&self.in_flight).claim(&request) {
            debug!(error = %error, "request rejected");
            return EnqueueResult::rejected(request, error);
        }

        self.monitor.register(&request);

        let sent = tokio::select! {
            biased;
            () = self.stop.cancelled() => false,
            result = sender.send(request.clone()) => result.is_ok(),
        };
        if !sent {
            lock(&self.in_flight).release(request.id);
            let error = DownloadError::QueueClosed;
            self.monitor.mark_failed(request.id, &error.to_string());
            debug!("queue closed while waiting for capacity");
            return EnqueueResult::rejected(request, error);
        }

        debug!(path = ?request.full_path(), "request queued");
        EnqueueResult::queued(request)
    }

    /// Enqueues each request in order; one rejection does not stop the rest.
    pub async fn enqueue_many(&self, requests: Vec<DownloadRequest>) -> Vec<EnqueueResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.enqueue(request).await);
        }
        results
    }

    /// Spawns the worker pool.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyStarted`] or [`EngineError::Stopped`] unless the
    /// engine is still in the `Created` state.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        match *state {
            FetcherState::Created => {}
            FetcherState::Running => return Err(EngineError::AlreadyStarted),
            FetcherState::Stopped => return Err(EngineError::Stopped),
        }

        let mut workers = lock(&self.workers);
        for index in 0..self.max_workers {
            let worker = Worker {
                index,
                receiver: Arc::clone(&self.receiver),
                pipeline: self.pipeline.clone(),
                in_flight: Arc::clone(&self.in_flight),
                stop: self.stop.clone(),
                on_complete: self.on_complete.clone(),
                on_error: self.on_error.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        *state = FetcherState::Running;

        info!(workers = self.max_workers, "fetcher started");
        Ok(())
    }

    /// Stops the worker pool and closes the monitor's change signal.
    ///
    /// Workers finish their current job first. Jobs still queued are not
    /// run: each is marked failed with [`DownloadError::QueueClosed`] and
    /// reported to the error callback. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        let handles = {
            let mut state = lock(&self.state);
            if *state == FetcherState::Stopped {
                debug!("fetcher already stopped");
                return;
            }
            *state = FetcherState::Stopped;
            lock(&self.sender).take();
            self.stop.cancel();
            std::mem::take(&mut *lock(&self.workers))
        };

        debug!(workers = handles.len(), "waiting for workers to finish");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task panicked");
            }
        }

        let drained = self.drain_queue().await;
        if drained > 0 {
            debug!(drained, "failed jobs left in the queue");
        }

        self.monitor.shutdown();
        info!("fetcher stopped");
    }

    /// Closes the queue and fails every job still waiting in it.
    async fn drain_queue(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        receiver.close();

        let error = DownloadError::QueueClosed;
        let mut drained = 0;
        while let Ok(request) = receiver.try_recv() {
            lock(&self.in_flight).release(request.id);
            self.monitor.mark_failed(request.id, &error.to_string());
            if let Some(callback) = &self.on_error {
                callback(&request, &error);
            }
            drained += 1;
        }
        drained
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("target_dir", &self.validator.target_dir())
            .field("max_workers", &self.max_workers)
            .field("state", &self.state())
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// IDs and destinations of admitted jobs that have not finished yet.
#[derive(Debug, Default)]
struct InFlight {
    destinations: HashMap<u64, PathBuf>,
    paths: HashSet<PathBuf>,
}

impl InFlight {
    fn claim(&mut self, request: &DownloadRequest) -> Result<(), DownloadError> {
        if self.destinations.contains_key(&request.id) {
            return Err(DownloadError::validation(format!(
                "request {} is already in flight",
                request.id
            )));
        }
        let Some(path) = request.full_path() else {
            return Err(DownloadError::validation(format!(
                "request {} has no resolved destination",
                request.id
            )));
        };
        if !self.paths.insert(path.to_path_buf()) {
            return Err(DownloadError::conflict(path));
        }
        self.destinations.insert(request.id, path.to_path_buf());
        Ok(())
    }

    fn release(&mut self, id: u64) {
        if let Some(path) = self.destinations.remove(&id) {
            self.paths.remove(&path);
        }
    }
}

struct Worker {
    index: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<DownloadRequest>>>,
    pipeline: Pipeline,
    in_flight: Arc<Mutex<InFlight>>,
    stop: CancellationToken,
    on_complete: Option<CompletionCallback>,
    on_error: Option<ErrorCallback>,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.index, "worker started");
        loop {
            let next = tokio::select! {
                biased;
                () = self.stop.cancelled() => None,
                job = next_job(&self.receiver) => job,
            };
            let Some(request) = next else {
                break;
            };
            self.process(request).await;
        }
        debug!(worker = self.index, "worker exiting");
    }

    async fn process(&self, request: DownloadRequest) {
        let outcome = self.pipeline.run(&request).await;
        // Free the ID and destination before callbacks so they may resubmit.
        lock(&self.in_flight).release(request.id);

        match outcome {
            Ok(result) => {
                if let Some(callback) = &self.on_complete {
                    callback(result);
                }
            }
            Err(error) => {
                if let Some(callback) = &self.on_error {
                    callback(&request, &error);
                }
            }
        }
    }
}

async fn next_job(
    receiver: &tokio::sync::Mutex<mpsc::Receiver<DownloadRequest>>,
) -> Option<DownloadRequest> {
    receiver.lock().await.recv().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::download::DownloadErrorKind;
    use crate::download::client::{TransportError, TransportResponse};
    use crate::monitor::{DownloadStatus, ProgressMonitor};

    #[derive(Debug)]
    struct UnreachableTransport;

    #[async_trait]
    impl Transport for UnreachableTransport {
        async fn get(&self, _url: &str) -> Result<TransportResponse, TransportError> {
            Err("network disabled in tests".into())
        }
    }

    fn config(dir: &TempDir) -> (FetcherConfig, Arc<ProgressMonitor>) {
        let monitor = Arc::new(ProgressMonitor::new());
        let config = FetcherConfig::default()
            .with_transport(Arc::new(UnreachableTransport))
            .with_target_dir(dir.path())
            .with_monitor(monitor.clone());
        (config, monitor)
    }

    #[test]
    fn test_config_rejects_worker_count_out_of_range() {
        for value in [0, 101] {
            let result = Fetcher::new(FetcherConfig::default().with_max_workers(value));
            assert!(
                matches!(result, Err(EngineError::InvalidWorkerCount { value: v }) if v == value)
            );
        }
    }

    #[test]
    fn test_config_rejects_zero_capacity_and_empty_dir() {
        assert!(matches!(
            Fetcher::new(FetcherConfig::default().with_queue_capacity(0)),
            Err(EngineError::InvalidQueueCapacity { value: 0 })
        ));
        assert!(matches!(
            Fetcher::new(FetcherConfig::default().with_target_dir("")),
            Err(EngineError::EmptyTargetDir)
        ));
    }

    #[test]
    fn test_defaults() {
        let fetcher = Fetcher::new(FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.max_workers(), 4);
        assert!(fetcher.target_dir().ends_with("downloads"));
        assert!(fetcher.target_dir().is_absolute());
        assert_eq!(fetcher.state(), FetcherState::Created);
        assert_eq!(fetcher.monitor().snapshot().count.total, 0);
    }

    #[tokio::test]
    async fn test_enqueue_before_start_assigns_fifo_positions() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();

        let results = fetcher
            .enqueue_many(vec![
                DownloadRequest::new(1, "https://example.com/a.bin"),
                DownloadRequest::new(2, "https://example.com/b.bin"),
                DownloadRequest::new(3, "https://example.com/c.bin"),
            ])
            .await;
        assert!(results.iter().all(EnqueueResult::is_queued));

        let snapshot = monitor.snapshot();
        let positions: Vec<usize> = [1, 2, 3]
            .iter()
            .map(|id| snapshot.task(*id).unwrap().queue_position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(snapshot.count.pending, 3);
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_registered() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();

        let results = fetcher
            .enqueue_many(vec![
                DownloadRequest::new(1, "not a url"),
                DownloadRequest::new(2, "https://example.com/ok.bin"),
            ])
            .await;

        assert!(!results[0].queued);
        assert_eq!(
            results[0].error.as_ref().map(DownloadError::kind),
            Some(DownloadErrorKind::Validation)
        );
        assert!(results[1].queued);
        assert_eq!(monitor.snapshot().count.total, 1);
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (config, _monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();

        assert!(fetcher.enqueue(DownloadRequest::new(7, "https://example.com/a")).await.queued);
        let second = fetcher.enqueue(DownloadRequest::new(7, "https://example.com/b")).await;

        assert!(!second.queued);
        assert_eq!(second.error.unwrap().kind(), DownloadErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_second_request_for_same_destination_is_conflict() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let fetcher = Fetcher::new(config.with_overwrite(true)).unwrap();

        let first = fetcher
            .enqueue(DownloadRequest::new(1, "https://a.example/x").with_file_name("same.bin"))
            .await;
        let second = fetcher
            .enqueue(DownloadRequest::new(2, "https://b.example/y").with_file_name("same.bin"))
            .await;
        let other = fetcher
            .enqueue(DownloadRequest::new(3, "https://b.example/y").with_file_name("other.bin"))
            .await;

        assert!(first.queued);
        assert!(!second.queued);
        assert!(matches!(
            second.error,
            Some(DownloadError::Conflict { ref path }) if path.ends_with("same.bin")
        ));
        assert!(other.queued);
        assert!(monitor.snapshot().task(2).is_none());
    }

    #[test]
    fn test_in_flight_release_frees_id_and_destination() {
        let mut in_flight = InFlight::default();
        let mut request = DownloadRequest::new(1, "https://example.com/a.bin");
        request.full_path = Some(PathBuf::from("/downloads/a.bin"));
        let mut rival = DownloadRequest::new(2, "https://example.com/a.bin");
        rival.full_path = request.full_path.clone();

        in_flight.claim(&request).unwrap();
        assert_eq!(
            in_flight.claim(&request).unwrap_err().kind(),
            DownloadErrorKind::Validation
        );
        assert_eq!(in_flight.claim(&rival).unwrap_err().kind(), DownloadErrorKind::Conflict);

        in_flight.release(1);
        in_flight.claim(&rival).unwrap();
        in_flight.release(2);
        assert!(in_flight.destinations.is_empty());
        assert!(in_flight.paths.is_empty());
    }

    #[tokio::test]
    async fn test_stop_fails_jobs_left_in_queue() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = Fetcher::new(config.with_on_error(move |request, error| {
            let _ = tx.send((request.id, error.kind()));
        }))
        .unwrap();

        fetcher
            .enqueue_many(vec![
                DownloadRequest::new(1, "https://example.com/a.bin"),
                DownloadRequest::new(2, "https://example.com/b.bin"),
            ])
            .await;
        fetcher.stop().await;

        let snapshot = monitor.snapshot();
        assert!(snapshot.count.all_finished());
        for id in [1, 2] {
            let task = snapshot.task(id).unwrap();
            assert_eq!(task.status, DownloadStatus::Failed);
            assert_eq!(task.error, DownloadError::QueueClosed.to_string());
            assert_eq!(rx.recv().await, Some((id, DownloadErrorKind::QueueClosed)));
        }
        assert!(lock(&fetcher.in_flight).destinations.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();
        let signal = monitor.change_signal();

        fetcher.start().unwrap();
        assert_eq!(fetcher.state(), FetcherState::Running);
        assert!(matches!(fetcher.start(), Err(EngineError::AlreadyStarted)));

        fetcher.stop().await;
        fetcher.stop().await;
        assert_eq!(fetcher.state(), FetcherState::Stopped);
        assert!(matches!(fetcher.start(), Err(EngineError::Stopped)));
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let dir = TempDir::new().unwrap();
        let (config, _monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();

        fetcher.stop().await;
        assert_eq!(fetcher.state(), FetcherState::Stopped);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_is_queue_closed() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let fetcher = Fetcher::new(config).unwrap();
        fetcher.start().unwrap();
        fetcher.stop().await;

        let result = fetcher.enqueue(DownloadRequest::new(1, "https://example.com/a")).await;
        assert!(matches!(result.error, Some(DownloadError::QueueClosed)));
        assert_eq!(monitor.snapshot().count.total, 0);
    }

    #[tokio::test]
    async fn test_failed_job_reaches_error_callback_and_frees_id() {
        let dir = TempDir::new().unwrap();
        let (config, monitor) = config(&dir);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = Fetcher::new(config.with_on_error(move |request, error| {
            let _ = tx.send((request.id, error.kind()));
        }))
        .unwrap();
        fetcher.start().unwrap();

        assert!(fetcher.enqueue(DownloadRequest::new(5, "https://example.com/x")).await.queued);
        let (id, kind) = rx.recv().await.unwrap();
        assert_eq!((id, kind), (5, DownloadErrorKind::Network));
        assert_eq!(
            monitor.snapshot().task(5).unwrap().status,
            DownloadStatus::Failed
        );

        // The same ID may be submitted again once its job is done.
        assert!(fetcher.enqueue(DownloadRequest::new(5, "https://example.com/x")).await.queued);
        fetcher.stop().await;
    }
}
