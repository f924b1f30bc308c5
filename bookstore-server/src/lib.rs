pub mod config;
pub mod core;
pub mod replication;

// Re-export commonly used types
pub use config::ServerConfig;
pub use core::{
    Book, BookCopy, BookEditorPick, BookStore, BookStoreError, InventoryConfig, InventoryEngine,
    Isbn, LockingStrategy, SaleMiss, StockBook, StockManager,
};
pub use replication::{
    LocalTransport, MasterBookStore, ReplicaStore, ReplicatedWrite, ReplicationConfig,
    ReplicationCoordinator, ReplicationError, ReplicationRequest, ReplicationResult, Transport,
};
