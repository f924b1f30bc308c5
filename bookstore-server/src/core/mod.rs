pub mod catalog;
pub mod error;
pub mod inventory;
pub mod types;

pub use catalog::{Catalog, CommitHook, SingleLockCatalog, TwoLevelCatalog};
pub use error::{BookStoreError, Result};
pub use inventory::{BookStore, InventoryEngine, StockManager};
pub use types::{
    Book, BookCopy, BookEditorPick, INVALID_ISBN, InventoryConfig, Isbn, LockingStrategy,
    SaleMiss, StockBook,
};
