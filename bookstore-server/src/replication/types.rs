use crate::core::{BookCopy, BookEditorPick, Isbn, StockBook};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot id reported when a replication attempt did not apply anything
pub const NO_SNAPSHOT: i64 = -1;

/// Write operation propagated from master to slaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum ReplicatedOperation {
    AddBooks(Vec<StockBook>),
    AddCopies(Vec<BookCopy>),
    BuyBooks(Vec<BookCopy>),
    RemoveBooks(Vec<Isbn>),
    RemoveAllBooks,
    UpdateEditorPicks(Vec<BookEditorPick>),
}

impl ReplicatedOperation {
    /// Short operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddBooks(_) => "add_books",
            Self::AddCopies(_) => "add_copies",
            Self::BuyBooks(_) => "buy_books",
            Self::RemoveBooks(_) => "remove_books",
            Self::RemoveAllBooks => "remove_all_books",
            Self::UpdateEditorPicks(_) => "update_editor_picks",
        }
    }
}

/// Replication request (sent from master to every active slave)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRequest {
    /// Master snapshot id produced by this write, strictly increasing per master
    pub snapshot_id: u64,
    pub operation: ReplicatedOperation,
}

impl ReplicationRequest {
    pub fn new(snapshot_id: u64, operation: ReplicatedOperation) -> Self {
        Self {
            snapshot_id,
            operation,
        }
    }
}

/// Outcome of replicating one request to one slave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationResult {
    pub slave_id: String,
    pub succeeded: bool,
    /// Slave snapshot id after the request, or `NO_SNAPSHOT`
    pub snapshot_id: i64,
}

impl ReplicationResult {
    pub fn success(slave_id: impl Into<String>, snapshot_id: i64) -> Self {
        Self {
            slave_id: slave_id.into(),
            succeeded: true,
            snapshot_id,
        }
    }

    pub fn failure(slave_id: impl Into<String>) -> Self {
        Self {
            slave_id: slave_id.into(),
            succeeded: false,
            snapshot_id: NO_SNAPSHOT,
        }
    }
}

/// Replication error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplicationError {
    #[error("Connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Replication to {0} timed out")]
    Timeout(String),

    #[error("Transport to {0} is closed")]
    Closed(String),

    #[error("Slave rejected snapshot {snapshot_id}: {reason}")]
    Rejected { snapshot_id: u64, reason: String },

    #[error("No Tokio runtime available for replication")]
    NoRuntime,

    #[error("Replication coordinator is shut down")]
    ShuttingDown,
}
