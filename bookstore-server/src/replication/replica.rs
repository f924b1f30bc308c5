use super::types::{ReplicatedOperation, ReplicationError, ReplicationRequest};
use crate::core::{BookStore, InventoryEngine, StockManager};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot ids a replica has already processed
#[derive(Debug, Default)]
struct AppliedSnapshots {
    /// Every id up to and including this one has been processed
    watermark: u64,
    /// Processed ids above the watermark, received out of order
    ahead: BTreeSet<u64>,
}

impl AppliedSnapshots {
    fn contains(&self, snapshot_id: u64) -> bool {
        snapshot_id <= self.watermark || self.ahead.contains(&snapshot_id)
    }

    fn insert(&mut self, snapshot_id: u64) {
        self.ahead.insert(snapshot_id);
        while self.ahead.remove(&(self.watermark + 1)) {
            self.watermark += 1;
        }
    }

    fn highest(&self) -> u64 {
        self.ahead
            .last()
            .copied()
            .unwrap_or(self.watermark)
            .max(self.watermark)
    }
}

/// Replica Store - read-mostly copy of the inventory fed by the master
///
/// Features:
/// - Applies replicated writes through its own inventory engine
/// - Ignores duplicate snapshot ids
/// - Applies out-of-order snapshot ids on arrival
/// - Reports the highest processed snapshot id
pub struct ReplicaStore {
    engine: Arc<InventoryEngine>,
    applied: Mutex<AppliedSnapshots>,
}

impl ReplicaStore {
    /// Create a new replica store around an empty or pre-loaded engine
    pub fn new(engine: Arc<InventoryEngine>) -> Self {
        info!(
            "Initializing replica store with {:?} locking",
            engine.strategy()
        );

        Self {
            engine,
            applied: Mutex::new(AppliedSnapshots::default()),
        }
    }

    /// Engine serving reads on this replica
    pub fn engine(&self) -> &Arc<InventoryEngine> {
        &self.engine
    }

    /// Highest snapshot id this replica has processed
    pub fn snapshot_id(&self) -> u64 {
        self.applied.lock().highest()
    }

    /// Apply one replicated write, returning the replica's snapshot id afterwards
    ///
    /// Every snapshot id is processed at most once: a rejected write is not
    /// applied again if the master resends it.
    ///
    /// A replicated buy that this replica cannot fill (it has diverged from
    /// the master) is rejected, but still records its sale misses locally as
    /// any failed buy does. The master never replicates sale misses, so these
    /// counts exist on this replica only.
    pub fn apply(&self, request: &ReplicationRequest) -> Result<i64, ReplicationError> {
        let mut applied = self.applied.lock();

        if applied.contains(request.snapshot_id) {
            debug!(
                "Ignoring duplicate snapshot {} ({})",
                request.snapshot_id,
                request.operation.name()
            );
            return Ok(to_wire_id(applied.highest()));
        }

        if request.snapshot_id > applied.watermark + 1 {
            debug!(
                "Snapshot {} arrived ahead of {}",
                request.snapshot_id,
                applied.watermark + 1
            );
        }

        let outcome = self.apply_operation(&request.operation);
        applied.insert(request.snapshot_id);

        match outcome {
            Ok(()) => {
                debug!(
                    "Applied snapshot {} ({})",
                    request.snapshot_id,
                    request.operation.name()
                );
                Ok(to_wire_id(applied.highest()))
            }
            Err(e) => {
                let misses = e.sale_misses();
                if !misses.is_empty() {
                    warn!(
                        "Replica recorded {} local sale miss(es) for snapshot {} that the master does not hold",
                        misses.len(),
                        request.snapshot_id
                    );
                }
                warn!(
                    "Replica rejected snapshot {} ({}): {}",
                    request.snapshot_id,
                    request.operation.name(),
                    e
                );
                Err(ReplicationError::Rejected {
                    snapshot_id: request.snapshot_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn apply_operation(&self, operation: &ReplicatedOperation) -> crate::core::Result<()> {
        match operation {
            ReplicatedOperation::AddBooks(books) => self.engine.add_books(books),
            ReplicatedOperation::AddCopies(copies) => self.engine.add_copies(copies),
            ReplicatedOperation::BuyBooks(copies) => self.engine.buy_books(copies),
            ReplicatedOperation::RemoveBooks(isbns) => self.engine.remove_books(isbns),
            ReplicatedOperation::RemoveAllBooks => self.engine.remove_all_books(),
            ReplicatedOperation::UpdateEditorPicks(picks) => {
                self.engine.update_editor_picks(picks)
            }
        }
    }
}

fn to_wire_id(snapshot_id: u64) -> i64 {
    i64::try_from(snapshot_id).unwrap_or(i64::MAX)
}
