use super::coordinator::{PendingReplication, ReplicationCoordinator};
use super::types::{ReplicatedOperation, ReplicationRequest, ReplicationResult};
use crate::core::{
    Book, BookCopy, BookEditorPick, BookStore, CommitHook, InventoryEngine, Isbn, Result,
    StockBook, StockManager,
};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A write committed on the master, with its replication still in flight
pub struct ReplicatedWrite {
    /// Master snapshot id assigned to this write
    pub snapshot_id: u64,
    /// One pending result per slave active at dispatch time
    pub pending: Vec<PendingReplication>,
}

impl ReplicatedWrite {
    /// Wait for every slave to answer
    pub async fn wait_all(self) -> Vec<ReplicationResult> {
        join_all(self.pending).await
    }
}

/// Master Book Store - authoritative inventory that replicates every committed write
///
/// Writes are durable once applied locally; replication never blocks them
/// and never turns a local success into a failure.
pub struct MasterBookStore {
    engine: Arc<InventoryEngine>,
    coordinator: Arc<ReplicationCoordinator>,

    /// Last assigned snapshot id
    snapshot_id: AtomicU64,
}

impl MasterBookStore {
    pub fn new(engine: Arc<InventoryEngine>, coordinator: Arc<ReplicationCoordinator>) -> Self {
        info!(
            "Initializing master book store with {} slave(s)",
            coordinator.active_slaves().len()
        );

        Self {
            engine,
            coordinator,
            snapshot_id: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<InventoryEngine> {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<ReplicationCoordinator> {
        &self.coordinator
    }

    /// Last snapshot id handed out
    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id.load(Ordering::SeqCst)
    }

    /// Apply a write locally, numbering it before its locks are released,
    /// then hand it to the coordinator.
    ///
    /// Conflicting writes therefore carry snapshot ids in commit order.
    fn commit<A, O>(&self, apply: A, operation: O) -> Result<ReplicatedWrite>
    where
        A: FnOnce(CommitHook<'_>) -> Result<()>,
        O: FnOnce() -> ReplicatedOperation,
    {
        let mut snapshot_id = 0;
        apply(&mut || snapshot_id = self.snapshot_id.fetch_add(1, Ordering::SeqCst) + 1)?;

        let operation = operation();
        debug!("Committed snapshot {} ({})", snapshot_id, operation.name());

        let pending = self
            .coordinator
            .replicate(ReplicationRequest::new(snapshot_id, operation));
        Ok(ReplicatedWrite {
            snapshot_id,
            pending,
        })
    }

    pub fn add_books(&self, books: &[StockBook]) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.add_books_with_commit(books, hook),
            || ReplicatedOperation::AddBooks(books.to_vec()),
        )
    }

    pub fn add_copies(&self, copies: &[BookCopy]) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.add_copies_with_commit(copies, hook),
            || ReplicatedOperation::AddCopies(copies.to_vec()),
        )
    }

    pub fn buy_books(&self, requests: &[BookCopy]) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.buy_books_with_commit(requests, hook),
            || ReplicatedOperation::BuyBooks(requests.to_vec()),
        )
    }

    pub fn remove_books(&self, isbns: &[Isbn]) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.remove_books_with_commit(isbns, hook),
            || ReplicatedOperation::RemoveBooks(isbns.to_vec()),
        )
    }

    pub fn remove_all_books(&self) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.remove_all_books_with_commit(hook),
            || ReplicatedOperation::RemoveAllBooks,
        )
    }

    pub fn update_editor_picks(&self, picks: &[BookEditorPick]) -> Result<ReplicatedWrite> {
        self.commit(
            |hook| self.engine.update_editor_picks_with_commit(picks, hook),
            || ReplicatedOperation::UpdateEditorPicks(picks.to_vec()),
        )
    }

    pub fn get_books(&self) -> Vec<StockBook> {
        self.engine.get_books()
    }

    pub fn get_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>> {
        self.engine.get_books_by_isbn(isbns)
    }

    pub fn browse_books(&self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        self.engine.browse_books(isbns)
    }

    pub fn get_editor_picks(&self, num_books: i32) -> Result<Vec<Book>> {
        self.engine.get_editor_picks(num_books)
    }

    /// Stop replicating to the given slaves
    pub async fn mark_servers_faulty<I>(&self, slave_ids: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.coordinator.mark_servers_faulty(slave_ids).await;
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}
