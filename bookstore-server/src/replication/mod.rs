/// Replication module - master/slave fan-out for scaled-out reads
///
/// - 1 Master node (accepts writes, authoritative)
/// - N Slave nodes (read-only copies)
/// - Async replication (writers never wait for slaves)
/// - Operator-driven fault marking (no automatic re-admission)
///
/// Features:
/// - Bounded worker pool for replication calls
/// - Per-slave failure isolation
/// - Snapshot ids for duplicate detection on slaves
/// - Pluggable transport
pub mod config;
pub mod coordinator;
pub mod master;
pub mod registry;
pub mod replica;
pub mod transport;
pub mod types;

pub use config::ReplicationConfig;
pub use coordinator::{PendingReplication, ReplicationCoordinator};
pub use master::{MasterBookStore, ReplicatedWrite};
pub use registry::ReplicaRegistry;
pub use replica::ReplicaStore;
pub use transport::{LocalTransport, Transport};
pub use types::{
    NO_SNAPSHOT, ReplicatedOperation, ReplicationError, ReplicationRequest, ReplicationResult,
};
