use super::replica::ReplicaStore;
use super::types::{ReplicationError, ReplicationRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Channel used by the coordinator to reach one slave
///
/// The coordinator never times out a call itself. Implementations must
/// resolve every `replicate` call, successfully or not, within a bounded
/// time; a call that never resolves pins a worker permit forever.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identifier of the slave this transport reaches
    fn endpoint(&self) -> &str;

    /// Deliver a request, returning the slave's snapshot id afterwards
    async fn replicate(&self, request: &ReplicationRequest) -> Result<i64, ReplicationError>;

    /// Release connection resources. Safe to call on an already closed transport.
    async fn close(&self);
}

/// In-process transport delivering requests straight to a replica store
pub struct LocalTransport {
    endpoint: String,
    replica: Arc<ReplicaStore>,
    closed: AtomicBool,
}

impl LocalTransport {
    pub fn new(endpoint: impl Into<String>, replica: Arc<ReplicaStore>) -> Self {
        Self {
            endpoint: endpoint.into(),
            replica,
            closed: AtomicBool::new(false),
        }
    }

    pub fn replica(&self) -> &Arc<ReplicaStore> {
        &self.replica
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn replicate(&self, request: &ReplicationRequest) -> Result<i64, ReplicationError> {
        if self.is_closed() {
            return Err(ReplicationError::Closed(self.endpoint.clone()));
        }
        self.replica.apply(request)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed local transport to {}", self.endpoint);
        }
    }
}
