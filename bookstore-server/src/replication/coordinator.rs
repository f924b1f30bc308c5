use super::registry::ReplicaRegistry;
use super::transport::Transport;
use super::types::{ReplicationError, ReplicationRequest, ReplicationResult};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Replication Coordinator - fans committed writes out to every active slave
///
/// Features:
/// - One dispatch task per slave per request
/// - Bounded number of transport calls in flight
/// - Per-slave failure isolation
/// - Runtime removal of faulty slaves
pub struct ReplicationCoordinator {
    registry: ReplicaRegistry,

    /// Worker permits; one per in-flight transport call
    permits: Arc<Semaphore>,

    runtime: Handle,

    /// Dispatch tasks that may still be running
    in_flight: Mutex<Vec<AbortHandle>>,

    shut_down: AtomicBool,
}

/// Pending outcome of replicating one request to one slave
///
/// Resolves to a failed result if the dispatch task panicked or was
/// aborted by `shutdown`, or at once if nothing was dispatched.
pub struct PendingReplication {
    slave_id: String,
    /// `None` when the coordinator was already shut down
    handle: Option<JoinHandle<ReplicationResult>>,
}

impl PendingReplication {
    fn not_dispatched(slave_id: String) -> Self {
        Self {
            slave_id,
            handle: None,
        }
    }

    pub fn slave_id(&self) -> &str {
        &self.slave_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl Future for PendingReplication {
    type Output = ReplicationResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(handle) = self.handle.as_mut() else {
            return Poll::Ready(ReplicationResult::failure(self.slave_id.clone()));
        };

        match Pin::new(handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => {
                debug!("Dispatch to {} did not complete: {}", self.slave_id, e);
                Poll::Ready(ReplicationResult::failure(self.slave_id.clone()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl ReplicationCoordinator {
    /// Create a coordinator over the given slaves.
    ///
    /// Dispatch tasks run on the Tokio runtime current at construction.
    pub fn new(
        max_replicator_threads: usize,
        slaves: impl IntoIterator<Item = Arc<dyn Transport>>,
    ) -> Result<Self, ReplicationError> {
        let runtime = Handle::try_current().map_err(|_| ReplicationError::NoRuntime)?;
        let registry = ReplicaRegistry::new(slaves);
        let workers = max_replicator_threads.max(1);

        info!(
            "Initializing replication coordinator with {} slave(s), {} worker(s)",
            registry.len(),
            workers
        );

        Ok(Self {
            registry,
            permits: Arc::new(Semaphore::new(workers)),
            runtime,
            in_flight: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Dispatch `request` to every active slave without waiting for any of them
    pub fn replicate(&self, request: ReplicationRequest) -> Vec<PendingReplication> {
        let slaves = self.registry.snapshot();
        if slaves.is_empty() {
            return Vec::new();
        }

        debug!(
            "Replicating snapshot {} ({}) to {} slave(s)",
            request.snapshot_id,
            request.operation.name(),
            slaves.len()
        );

        // Checked under the in-flight lock so `shutdown` either sees these
        // tasks or they are never spawned
        let mut in_flight = self.in_flight.lock();
        if self.is_shut_down() {
            debug!(
                "Not replicating snapshot {}: {}",
                request.snapshot_id,
                ReplicationError::ShuttingDown
            );
            return slaves
                .into_iter()
                .map(|(slave_id, _)| PendingReplication::not_dispatched(slave_id))
                .collect();
        }
        in_flight.retain(|handle| !handle.is_finished());

        let request = Arc::new(request);
        let mut pending = Vec::with_capacity(slaves.len());

        for (slave_id, transport) in slaves {
            let handle = self.runtime.spawn(Self::dispatch(
                slave_id.clone(),
                transport,
                Arc::clone(&request),
                Arc::clone(&self.permits),
            ));
            in_flight.push(handle.abort_handle());
            pending.push(PendingReplication {
                slave_id,
                handle: Some(handle),
            });
        }

        pending
    }

    async fn dispatch(
        slave_id: String,
        transport: Arc<dyn Transport>,
        request: Arc<ReplicationRequest>,
        permits: Arc<Semaphore>,
    ) -> ReplicationResult {
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                debug!(
                    "Skipping snapshot {} for {}: {}",
                    request.snapshot_id,
                    slave_id,
                    ReplicationError::ShuttingDown
                );
                return ReplicationResult::failure(slave_id);
            }
        };

        match transport.replicate(&request).await {
            Ok(snapshot_id) => {
                debug!(
                    "Slave {} acknowledged snapshot {} at {}",
                    slave_id, request.snapshot_id, snapshot_id
                );
                ReplicationResult::success(slave_id, snapshot_id)
            }
            Err(e) => {
                warn!(
                    "Replication of snapshot {} to {} failed: {}",
                    request.snapshot_id, slave_id, e
                );
                ReplicationResult::failure(slave_id)
            }
        }
    }

    /// Remove slaves from the active set and close their transports.
    ///
    /// Unknown or already removed ids are ignored.
    pub async fn mark_servers_faulty<I>(&self, slave_ids: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for slave_id in slave_ids {
            let slave_id = slave_id.as_ref();
            match self.registry.remove(slave_id) {
                Some(transport) => {
                    warn!("Marking slave {} as faulty", slave_id);
                    transport.close().await;
                }
                None => debug!("Slave {} is not active", slave_id),
            }
        }
    }

    /// Active slave ids, sorted
    pub fn active_slaves(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop dispatching: queued and running tasks are aborted, not awaited
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.permits.close();
        let mut aborted = 0;
        for handle in self.in_flight.lock().drain(..) {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }

        info!(
            "Replication coordinator shut down ({} task(s) aborted)",
            aborted
        );
    }
}

impl Drop for ReplicationCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
