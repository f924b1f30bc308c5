use super::catalog::{Catalog, CommitHook, SingleLockCatalog, TwoLevelCatalog};
use super::error::{BookStoreError, Result};
use super::types::{
    Book, BookCopy, BookEditorPick, InventoryConfig, Isbn, LockingStrategy, StockBook,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::{debug, info};

/// Store-front capabilities: browsing and selling
pub trait BookStore: Send + Sync {
    /// Buy every requested copy or none of them
    fn buy_books(&self, requests: &[BookCopy]) -> Result<()>;

    /// Store-front view of the given books
    fn browse_books(&self, isbns: &[Isbn]) -> Result<Vec<Book>>;

    /// Up to `num_books` distinct promoted books, sampled at random
    fn get_editor_picks(&self, num_books: i32) -> Result<Vec<Book>>;
}

/// Back-office capabilities: administering stock
pub trait StockManager: Send + Sync {
    fn add_books(&self, books: &[StockBook]) -> Result<()>;
    fn add_copies(&self, copies: &[BookCopy]) -> Result<()>;
    fn get_books(&self) -> Vec<StockBook>;
    fn get_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>>;
    fn remove_books(&self, isbns: &[Isbn]) -> Result<()>;
    fn remove_all_books(&self) -> Result<()>;
    fn update_editor_picks(&self, picks: &[BookEditorPick]) -> Result<()>;
}

/// Inventory engine: the catalog plus its locking discipline
pub struct InventoryEngine {
    catalog: Box<dyn Catalog>,
    strategy: LockingStrategy,
    rng: Mutex<StdRng>,
}

impl InventoryEngine {
    /// Create an engine with the given lock granularity, seeded from OS entropy
    pub fn new(strategy: LockingStrategy) -> Self {
        Self::build(strategy, StdRng::from_entropy())
    }

    /// Create an engine whose editor-pick sampling is reproducible
    pub fn with_seed(strategy: LockingStrategy, seed: u64) -> Self {
        Self::build(strategy, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        match config.rng_seed {
            Some(seed) => Self::with_seed(config.locking, seed),
            None => Self::new(config.locking),
        }
    }

    fn build(strategy: LockingStrategy, rng: StdRng) -> Self {
        info!("Initializing inventory engine with {:?} locking", strategy);

        let catalog: Box<dyn Catalog> = match strategy {
            LockingStrategy::Coarse => Box::new(SingleLockCatalog::new()),
            LockingStrategy::Fine => Box::new(TwoLevelCatalog::new()),
        };

        Self {
            catalog,
            strategy,
            rng: Mutex::new(rng),
        }
    }

    pub fn strategy(&self) -> LockingStrategy {
        self.strategy
    }

    /// Number of distinct books in the catalog
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Draw `count` distinct indices below `range`, retrying on collision
    fn sample_indices(&self, range: usize, count: usize) -> Vec<usize> {
        let mut rng = self.rng.lock();
        let mut picked = HashSet::with_capacity(count);
        let mut order = Vec::with_capacity(count);
        while order.len() < count {
            let index = rng.gen_range(0..range);
            if picked.insert(index) {
                order.push(index);
            }
        }
        order
    }
}

impl InventoryEngine {
    // Writes that run `on_commit` before releasing the catalog locks

    pub fn add_books_with_commit(
        &self,
        books: &[StockBook],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        debug!("ADD_BOOKS count={}", books.len());
        self.catalog.add_books(books, on_commit)
    }

    pub fn add_copies_with_commit(
        &self,
        copies: &[BookCopy],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        debug!("ADD_COPIES count={}", copies.len());
        self.catalog.add_copies(copies, on_commit)
    }

    pub fn buy_books_with_commit(
        &self,
        requests: &[BookCopy],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        debug!("BUY_BOOKS count={}", requests.len());
        let result = self.catalog.buy_books(requests, on_commit);
        if let Err(BookStoreError::InsufficientStock { misses }) = &result {
            debug!("BUY_BOOKS missed sales for {} book(s)", misses.len());
        }
        result
    }

    pub fn remove_books_with_commit(
        &self,
        isbns: &[Isbn],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        debug!("REMOVE_BOOKS count={}", isbns.len());
        self.catalog.remove_books(isbns, on_commit)
    }

    pub fn remove_all_books_with_commit(&self, on_commit: CommitHook<'_>) -> Result<()> {
        let removed = self.catalog.remove_all_books(on_commit);
        debug!("REMOVE_ALL_BOOKS removed={}", removed);
        Ok(())
    }

    pub fn update_editor_picks_with_commit(
        &self,
        picks: &[BookEditorPick],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        debug!("UPDATE_EDITOR_PICKS count={}", picks.len());
        self.catalog.update_editor_picks(picks, on_commit)
    }
}

impl StockManager for InventoryEngine {
    fn add_books(&self, books: &[StockBook]) -> Result<()> {
        self.add_books_with_commit(books, &mut || {})
    }

    fn add_copies(&self, copies: &[BookCopy]) -> Result<()> {
        self.add_copies_with_commit(copies, &mut || {})
    }

    fn get_books(&self) -> Vec<StockBook> {
        debug!("GET_BOOKS");
        self.catalog.stock_books()
    }

    fn get_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>> {
        debug!("GET_BOOKS_BY_ISBN count={}", isbns.len());
        self.catalog.stock_books_by_isbn(isbns)
    }

    fn remove_books(&self, isbns: &[Isbn]) -> Result<()> {
        self.remove_books_with_commit(isbns, &mut || {})
    }

    fn remove_all_books(&self) -> Result<()> {
        self.remove_all_books_with_commit(&mut || {})
    }

    fn update_editor_picks(&self, picks: &[BookEditorPick]) -> Result<()> {
        self.update_editor_picks_with_commit(picks, &mut || {})
    }
}

impl BookStore for InventoryEngine {
    fn buy_books(&self, requests: &[BookCopy]) -> Result<()> {
        self.buy_books_with_commit(requests, &mut || {})
    }

    fn browse_books(&self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        debug!("BROWSE_BOOKS count={}", isbns.len());
        self.catalog.books_by_isbn(isbns)
    }

    fn get_editor_picks(&self, num_books: i32) -> Result<Vec<Book>> {
        debug!("GET_EDITOR_PICKS num_books={}", num_books);

        let wanted = usize::try_from(num_books).map_err(|_| {
            BookStoreError::Validation(format!(
                "numBooks = {}, but it must be non-negative",
                num_books
            ))
        })?;

        let mut promoted = self.catalog.editor_picks();
        if wanted >= promoted.len() {
            return Ok(promoted);
        }

        // Catalog iteration order is arbitrary; sort so a seeded rng picks the same books
        promoted.sort_unstable_by_key(|book| book.isbn);
        let mut slots: Vec<Option<Book>> = promoted.into_iter().map(Some).collect();
        Ok(self
            .sample_indices(slots.len(), wanted)
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{INVALID_ISBN, SaleMiss};

    const TEST_ISBN: Isbn = 3044560;

    fn engines() -> Vec<InventoryEngine> {
        vec![
            InventoryEngine::with_seed(LockingStrategy::Coarse, 7),
            InventoryEngine::with_seed(LockingStrategy::Fine, 7),
        ]
    }

    fn default_book() -> StockBook {
        StockBook::new(TEST_ISBN, "Harry Potter and JUnit", "JK Unit", 10.0, 5)
    }

    fn copies(engine: &InventoryEngine, isbn: Isbn) -> i32 {
        engine.get_books_by_isbn(&[isbn]).unwrap()[0].num_copies
    }

    #[test]
    fn test_add_then_lookup() {
        for engine in engines() {
            engine
                .add_books(&[StockBook::new(42, "Answer", "Adams", 4.2, 5)])
                .unwrap();

            let books = engine.get_books_by_isbn(&[42]).unwrap();
            assert_eq!(books.len(), 1);
            assert_eq!(books[0].num_copies, 5);
            assert_eq!(books[0].num_sale_misses, 0);
        }
    }

    #[test]
    fn test_add_books_is_all_or_nothing() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();

            let valid = StockBook::new(TEST_ISBN + 1, "Valid", "Author", 1.0, 1);
            let batches = vec![
                vec![valid.clone(), StockBook::new(-1, "Bad", "Author", 1.0, 1)],
                vec![valid.clone(), StockBook::new(TEST_ISBN + 2, "", "Author", 1.0, 1)],
                vec![valid.clone(), StockBook::new(TEST_ISBN + 2, "T", "", 1.0, 1)],
                vec![valid.clone(), StockBook::new(TEST_ISBN + 2, "T", "A", -1.0, 1)],
                vec![valid.clone(), StockBook::new(TEST_ISBN + 2, "T", "A", 1.0, -1)],
            ];
            for batch in batches {
                assert!(matches!(
                    engine.add_books(&batch),
                    Err(BookStoreError::Validation(_))
                ));
            }

            assert_eq!(
                engine.add_books(&[valid, default_book()]),
                Err(BookStoreError::Duplicate(TEST_ISBN))
            );
            assert_eq!(engine.get_books(), vec![default_book()]);
        }
    }

    #[test]
    fn test_add_copies_validates_first() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();

            assert!(matches!(
                engine.add_copies(&[BookCopy::new(TEST_ISBN, 1), BookCopy::new(-1, 1)]),
                Err(BookStoreError::Validation(_))
            ));
            assert_eq!(
                engine.add_copies(&[BookCopy::new(TEST_ISBN, 1), BookCopy::new(99, 1)]),
                Err(BookStoreError::NotFound(99))
            );
            assert!(matches!(
                engine.add_copies(&[BookCopy::new(TEST_ISBN, 1), BookCopy::new(TEST_ISBN, 0)]),
                Err(BookStoreError::Validation(_))
            ));
            assert_eq!(copies(&engine, TEST_ISBN), 5);

            engine.add_copies(&[BookCopy::new(TEST_ISBN, 10)]).unwrap();
            assert_eq!(copies(&engine, TEST_ISBN), 15);
        }
    }

    #[test]
    fn test_buy_records_sale_miss_without_deducting() {
        for engine in engines() {
            engine.add_books(&[StockBook::new(42, "Answer", "Adams", 4.2, 5)]).unwrap();

            let result = engine.buy_books(&[BookCopy::new(42, 10)]);
            assert_eq!(
                result,
                Err(BookStoreError::InsufficientStock {
                    misses: vec![SaleMiss {
                        isbn: 42,
                        shortfall: 5
                    }]
                })
            );

            let book = &engine.get_books_by_isbn(&[42]).unwrap()[0];
            assert_eq!(book.num_sale_misses, 5);
            assert_eq!(book.num_copies, 5);
        }
    }

    #[test]
    fn test_failed_buy_deducts_nothing_in_batch() {
        for engine in engines() {
            engine
                .add_books(&[
                    StockBook::new(1, "One", "A", 1.0, 10),
                    StockBook::new(2, "Two", "A", 1.0, 1),
                    StockBook::new(3, "Three", "A", 1.0, 0),
                ])
                .unwrap();

            let err = engine
                .buy_books(&[
                    BookCopy::new(1, 4),
                    BookCopy::new(2, 3),
                    BookCopy::new(3, 1),
                ])
                .unwrap_err();
            assert_eq!(err.sale_misses().len(), 2);

            let books = engine.get_books_by_isbn(&[1, 2, 3]).unwrap();
            let state: Vec<(i32, i64)> = books
                .iter()
                .map(|b| (b.num_copies, b.num_sale_misses))
                .collect();
            assert_eq!(state, vec![(10, 0), (1, 2), (0, 1)]);
        }
    }

    #[test]
    fn test_buy_structural_errors_have_no_side_effects() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();

            assert!(matches!(
                engine.buy_books(&[BookCopy::new(TEST_ISBN, 100), BookCopy::new(TEST_ISBN, -1)]),
                Err(BookStoreError::Validation(_))
            ));
            assert_eq!(
                engine.buy_books(&[BookCopy::new(TEST_ISBN, 100), BookCopy::new(77, 1)]),
                Err(BookStoreError::NotFound(77))
            );

            let book = &engine.get_books()[0];
            assert_eq!(book.num_copies, 5);
            assert_eq!(book.num_sale_misses, 0);
        }
    }

    #[test]
    fn test_successful_buy() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();
            engine.buy_books(&[BookCopy::new(TEST_ISBN, 5)]).unwrap();
            assert_eq!(copies(&engine, TEST_ISBN), 0);

            engine.buy_books(&[BookCopy::new(TEST_ISBN, 0)]).unwrap();
            assert_eq!(copies(&engine, TEST_ISBN), 0);
        }
    }

    #[test]
    fn test_remove_books() {
        for engine in engines() {
            engine
                .add_books(&[default_book(), StockBook::new(1, "T", "A", 1.0, 1)])
                .unwrap();

            assert_eq!(
                engine.remove_books(&[1, 2]),
                Err(BookStoreError::NotFound(2))
            );
            assert_eq!(engine.len(), 2);

            engine.remove_books(&[1]).unwrap();
            assert_eq!(engine.get_books(), vec![default_book()]);
            assert_eq!(
                engine.get_books_by_isbn(&[1]),
                Err(BookStoreError::NotFound(1))
            );

            engine.remove_all_books().unwrap();
            assert!(engine.is_empty());

            // A removed ISBN can be added again from scratch
            engine.add_books(&[StockBook::new(1, "T", "A", 1.0, 3)]).unwrap();
            assert_eq!(engine.get_books()[0].num_sale_misses, 0);
        }
    }

    #[test]
    fn test_update_editor_picks() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();

            assert_eq!(
                engine.update_editor_picks(&[
                    BookEditorPick::new(TEST_ISBN, true),
                    BookEditorPick::new(5, true)
                ]),
                Err(BookStoreError::NotFound(5))
            );
            assert!(!engine.get_books()[0].editor_pick);

            engine
                .update_editor_picks(&[BookEditorPick::new(TEST_ISBN, true)])
                .unwrap();
            assert!(engine.get_books()[0].editor_pick);
        }
    }

    #[test]
    fn test_invalid_ids_leave_catalog_unchanged() {
        for engine in engines() {
            engine
                .add_books(&[default_book(), StockBook::new(1, "T", "A", 1.0, 1)])
                .unwrap();

            for bad in [0, INVALID_ISBN, -7] {
                assert!(matches!(
                    engine.remove_books(&[1, bad]),
                    Err(BookStoreError::Validation(_))
                ));
                assert_eq!(engine.len(), 2);

                assert!(matches!(
                    engine.update_editor_picks(&[
                        BookEditorPick::new(TEST_ISBN, true),
                        BookEditorPick::new(bad, true)
                    ]),
                    Err(BookStoreError::Validation(_))
                ));
                assert!(engine.get_books().iter().all(|book| !book.editor_pick));
            }

            assert_eq!(engine.get_books_by_isbn(&[1]).unwrap()[0].num_copies, 1);
        }
    }

    #[test]
    fn test_browse_books() {
        for engine in engines() {
            engine.add_books(&[default_book()]).unwrap();

            let books = engine.browse_books(&[TEST_ISBN]).unwrap();
            assert_eq!(books[0].title, "Harry Potter and JUnit");
            assert!(matches!(
                engine.browse_books(&[0]),
                Err(BookStoreError::Validation(_))
            ));
            assert_eq!(
                engine.browse_books(&[TEST_ISBN + 1]),
                Err(BookStoreError::NotFound(TEST_ISBN + 1))
            );
        }
    }

    #[test]
    fn test_editor_picks_sampling() {
        for engine in engines() {
            let books: Vec<StockBook> = (1..=10)
                .map(|isbn| StockBook::new(isbn, format!("T{}", isbn), "A", 1.0, 1))
                .collect();
            engine.add_books(&books).unwrap();

            let picks: Vec<BookEditorPick> = (1..=6)
                .map(|isbn| BookEditorPick::new(isbn, true))
                .collect();
            engine.update_editor_picks(&picks).unwrap();

            assert!(matches!(
                engine.get_editor_picks(-1),
                Err(BookStoreError::Validation(_))
            ));
            assert!(engine.get_editor_picks(0).unwrap().is_empty());
            assert_eq!(engine.get_editor_picks(6).unwrap().len(), 6);
            assert_eq!(engine.get_editor_picks(100).unwrap().len(), 6);

            for n in 1..6 {
                let sample = engine.get_editor_picks(n).unwrap();
                let distinct: HashSet<Isbn> = sample.iter().map(|b| b.isbn).collect();
                assert_eq!(sample.len(), n as usize);
                assert_eq!(distinct.len(), n as usize);
                assert!(distinct.iter().all(|isbn| (1..=6).contains(isbn)));
            }
        }
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let run = |strategy| {
            let engine = InventoryEngine::with_seed(strategy, 42);
            let books: Vec<StockBook> = (1..=20)
                .map(|isbn| StockBook::new(isbn, "T", "A", 1.0, 1))
                .collect();
            engine.add_books(&books).unwrap();
            let picks: Vec<BookEditorPick> = (1..=20)
                .map(|isbn| BookEditorPick::new(isbn, true))
                .collect();
            engine.update_editor_picks(&picks).unwrap();

            let mut isbns: Vec<Isbn> = engine
                .get_editor_picks(5)
                .unwrap()
                .into_iter()
                .map(|b| b.isbn)
                .collect();
            isbns.sort_unstable();
            isbns
        };

        let coarse = run(LockingStrategy::Coarse);
        assert_eq!(coarse.len(), 5);
        assert_eq!(coarse, run(LockingStrategy::Coarse));
        assert_eq!(coarse, run(LockingStrategy::Fine));
    }
}
