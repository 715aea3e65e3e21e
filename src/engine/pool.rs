//! Fixed-size pool of workers executing probes concurrently.

use crate::engine::queue::{Job, RequestQueue};
use crate::transport::Transport;
use crate::types::{Probe, ProbeResult};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Default interval between two "Queue: N left" notices.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// A probe tagged with the pool generation it was submitted in.
#[derive(Debug)]
struct Dispatch {
    probe: Probe,
    generation: u64,
}

/// Append-only collection the workers write their results to.
///
/// Results are drained by the control task once a round is joined. Each one
/// carries the generation of its probe so that anything finishing after a
/// `clear()` is dropped instead of showing up in the next round.
#[derive(Debug)]
struct ResultChannel {
    tx: UnboundedSender<(u64, ProbeResult)>,
    rx: Mutex<UnboundedReceiver<(u64, ProbeResult)>>,
}

impl ResultChannel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    fn drain(&self, generation: u64) -> Vec<ProbeResult> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut results = Vec::new();
        while let Ok((produced_in, result)) = rx.try_recv() {
            if produced_in == generation {
                results.push(result);
            } else {
                trace!("[{}] Dropping stale result", result.token);
            }
        }
        results
    }
}

/// Worker pool consuming the request queue.
pub struct WorkerPool {
    transport: Arc<dyn Transport>,
    queue: Arc<RequestQueue<Dispatch>>,
    results: Arc<ResultChannel>,
    generation: Arc<AtomicU64>,
    workers: Vec<JoinHandle<()>>,
    heartbeat: Duration,
}

impl WorkerPool {
    /// Create a pool; no worker runs until `start()`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            queue: Arc::new(RequestQueue::new()),
            results: Arc::new(ResultChannel::new()),
            generation: Arc::new(AtomicU64::new(0)),
            workers: Vec::new(),
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Launch `size` workers.
    pub fn start(&mut self, size: usize) {
        debug!("Starting engine ({} workers)", size);
        for id in 0..size {
            let worker = Worker {
                id,
                transport: self.transport.clone(),
                queue: self.queue.clone(),
                results: self.results.tx.clone(),
            };
            self.workers.push(tokio::spawn(worker.run()));
        }
    }

    /// Stop every worker.
    ///
    /// Pending probes are dropped, one sentinel per worker is queued and all
    /// workers are awaited. Probes already being sent finish naturally.
    pub async fn stop(&mut self) {
        debug!("Shutting engine down");
        self.queue.clear();
        for _ in 0..self.workers.len() {
            self.queue.put(Job::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                error!("Worker ended abnormally: {}", e);
            }
        }
    }

    /// Number of workers started and not yet stopped.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// True once every started worker has exited.
    pub fn is_idle(&self) -> bool {
        self.workers.iter().all(|w| w.is_finished())
    }

    /// Queue a probe for the current round.
    pub fn submit(&self, probe: Probe) {
        self.queue.push(Dispatch {
            probe,
            generation: self.generation.load(Ordering::SeqCst),
        });
    }

    /// Wait for every submitted probe to be processed.
    pub async fn join(&self) {
        self.queue.join(self.heartbeat).await;
    }

    /// Take the results collected so far in the current round.
    ///
    /// Order is arrival order, which means nothing: correlate by token.
    pub fn take_results(&self) -> Vec<ProbeResult> {
        self.results.drain(self.generation.load(Ordering::SeqCst))
    }

    /// Empty the queue and the result collection.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("Dropped {} pending probes", dropped);
        }
        self.results.drain(u64::MAX);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            warn!("Worker pool dropped without stop(), aborting {} workers", self.workers.len());
            for handle in &self.workers {
                handle.abort();
            }
        }
    }
}

struct Worker {
    id: usize,
    transport: Arc<dyn Transport>,
    queue: Arc<RequestQueue<Dispatch>>,
    results: UnboundedSender<(u64, ProbeResult)>,
}

impl Worker {
    async fn run(self) {
        loop {
            let dispatch = match self.queue.get().await {
                Job::Task(dispatch) => dispatch,
                Job::Shutdown => break,
            };
            self.process(dispatch).await;
            self.queue.task_done();
        }
        trace!("Worker {} exiting", self.id);
    }

    async fn process(&self, dispatch: Dispatch) {
        let Dispatch { probe, generation } = dispatch;

        let sent = AssertUnwindSafe(self.transport.send(&probe))
            .catch_unwind()
            .await;

        let outcome = match sent {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                debug!("[{}] {} failed: {}", probe.token, probe.url, e);
                Err(e.to_string())
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("[{}] Worker {} crashed on {}: {}", probe.token, self.id, probe.url, reason);
                return;
            }
        };

        let result = ProbeResult {
            token: probe.token,
            outcome,
        };
        // The receiver lives as long as the pool.
        let _ = self.results.send((generation, result));
    }
}
