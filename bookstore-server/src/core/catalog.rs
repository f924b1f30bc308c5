//! Catalog storage behind the inventory engine
//!
//! Two lock granularities share one contract:
//!
//! ```text
//! SingleLockCatalog
//!   └─ RwLock<HashMap<Isbn, BookRecord>>          (readers shared, writers exclusive)
//!
//! TwoLevelCatalog
//!   └─ RwLock<HashMap<Isbn, Mutex<BookRecord>>>   (structural lock over the key set)
//!        └─ Mutex<BookRecord>                     (per-book lock over mutable fields)
//! ```
//!
//! Every operation validates its whole batch before mutating anything and
//! holds its locks across validate+apply. Record locks in the two-level
//! catalog are always taken in ascending ISBN order.

use super::error::{BookStoreError, Result};
use super::types::{
    Book, BookCopy, BookEditorPick, BookRecord, Isbn, SaleMiss, StockBook, validate_isbn,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Callback run by a successful write while it still holds its locks.
///
/// Conflicting writes run their hooks in the order they commit.
pub type CommitHook<'a> = &'a mut dyn FnMut();

/// Storage contract shared by both lock granularities
pub trait Catalog: Send + Sync {
    fn add_books(&self, books: &[StockBook], on_commit: CommitHook<'_>) -> Result<()>;
    fn add_copies(&self, copies: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()>;
    fn buy_books(&self, requests: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()>;
    fn remove_books(&self, isbns: &[Isbn], on_commit: CommitHook<'_>) -> Result<()>;
    /// Returns the number of removed books
    fn remove_all_books(&self, on_commit: CommitHook<'_>) -> usize;
    fn update_editor_picks(
        &self,
        picks: &[BookEditorPick],
        on_commit: CommitHook<'_>,
    ) -> Result<()>;
    fn stock_books(&self) -> Vec<StockBook>;
    fn stock_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>>;
    fn books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<Book>>;
    /// Every promoted book, in no particular order
    fn editor_picks(&self) -> Vec<Book>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate new books against each other and against the current key set
fn check_new_books(books: &[StockBook], exists: impl Fn(Isbn) -> bool) -> Result<()> {
    let mut seen = HashSet::with_capacity(books.len());
    for book in books {
        book.validate()?;
        if !seen.insert(book.isbn) {
            return Err(BookStoreError::Validation(format!(
                "ISBN {} appears more than once in the batch",
                book.isbn
            )));
        }
        if exists(book.isbn) {
            return Err(BookStoreError::Duplicate(book.isbn));
        }
    }
    Ok(())
}

/// Sum purchase quantities per ISBN. Quantities must be non-negative.
fn purchase_totals(requests: &[BookCopy]) -> Result<BTreeMap<Isbn, i64>> {
    let mut totals = BTreeMap::new();
    for request in requests {
        validate_isbn(request.isbn)?;
        if request.num_copies < 0 {
            return Err(BookStoreError::Validation(format!(
                "number of copies {} for ISBN {} is invalid",
                request.num_copies, request.isbn
            )));
        }
        *totals.entry(request.isbn).or_insert(0) += i64::from(request.num_copies);
    }
    Ok(totals)
}

/// Sum restock deltas per ISBN. Deltas must be strictly positive.
fn restock_totals(copies: &[BookCopy]) -> Result<BTreeMap<Isbn, i64>> {
    let mut totals = BTreeMap::new();
    for copy in copies {
        validate_isbn(copy.isbn)?;
        if copy.num_copies < 1 {
            return Err(BookStoreError::Validation(format!(
                "number of copies {} for ISBN {} is invalid",
                copy.num_copies, copy.isbn
            )));
        }
        *totals.entry(copy.isbn).or_insert(0) += i64::from(copy.num_copies);
    }
    Ok(totals)
}

fn distinct_isbns(isbns: &[Isbn]) -> Result<BTreeSet<Isbn>> {
    let mut set = BTreeSet::new();
    for &isbn in isbns {
        validate_isbn(isbn)?;
        set.insert(isbn);
    }
    Ok(set)
}

fn restock_overflow(isbn: Isbn) -> BookStoreError {
    BookStoreError::Validation(format!("restocking ISBN {} overflows its copy count", isbn))
}

/// Catalog guarded by a single reader-writer lock
#[derive(Default)]
pub struct SingleLockCatalog {
    books: RwLock<HashMap<Isbn, BookRecord>>,
}

impl SingleLockCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for SingleLockCatalog {
    fn add_books(&self, books: &[StockBook], on_commit: CommitHook<'_>) -> Result<()> {
        let mut map = self.books.write();
        check_new_books(books, |isbn| map.contains_key(&isbn))?;

        for book in books {
            map.insert(book.isbn, BookRecord::from(book.clone()));
        }
        on_commit();
        Ok(())
    }

    fn add_copies(&self, copies: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()> {
        let totals = restock_totals(copies)?;

        let mut map = self.books.write();
        for (&isbn, &delta) in &totals {
            let record = map.get(&isbn).ok_or(BookStoreError::NotFound(isbn))?;
            if !record.can_restock(delta) {
                return Err(restock_overflow(isbn));
            }
        }

        for (isbn, delta) in totals {
            if let Some(record) = map.get_mut(&isbn) {
                record.add_copies(delta);
            }
        }
        on_commit();
        Ok(())
    }

    fn buy_books(&self, requests: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()> {
        let totals = purchase_totals(requests)?;

        let mut map = self.books.write();
        let mut misses = Vec::new();
        for (&isbn, &quantity) in &totals {
            let record = map.get(&isbn).ok_or(BookStoreError::NotFound(isbn))?;
            let shortfall = record.shortfall(quantity);
            if shortfall > 0 {
                misses.push(SaleMiss { isbn, shortfall });
            }
        }

        if !misses.is_empty() {
            for miss in &misses {
                if let Some(record) = map.get_mut(&miss.isbn) {
                    record.add_sale_misses(miss.shortfall);
                }
            }
            return Err(BookStoreError::InsufficientStock { misses });
        }

        for (isbn, quantity) in totals {
            if let Some(record) = map.get_mut(&isbn) {
                record.buy_copies(quantity);
            }
        }
        on_commit();
        Ok(())
    }

    fn remove_books(&self, isbns: &[Isbn], on_commit: CommitHook<'_>) -> Result<()> {
        let targets = distinct_isbns(isbns)?;

        let mut map = self.books.write();
        if let Some(&missing) = targets.iter().find(|&&isbn| !map.contains_key(&isbn)) {
            return Err(BookStoreError::NotFound(missing));
        }
        for isbn in targets {
            map.remove(&isbn);
        }
        on_commit();
        Ok(())
    }

    fn remove_all_books(&self, on_commit: CommitHook<'_>) -> usize {
        let mut map = self.books.write();
        let removed = map.len();
        map.clear();
        on_commit();
        removed
    }

    fn update_editor_picks(
        &self,
        picks: &[BookEditorPick],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        let mut map = self.books.write();
        for pick in picks {
            validate_isbn(pick.isbn)?;
            if !map.contains_key(&pick.isbn) {
                return Err(BookStoreError::NotFound(pick.isbn));
            }
        }

        for pick in picks {
            if let Some(record) = map.get_mut(&pick.isbn) {
                record.set_editor_pick(pick.editor_pick);
            }
        }
        on_commit();
        Ok(())
    }

    fn stock_books(&self) -> Vec<StockBook> {
        self.books
            .read()
            .values()
            .map(BookRecord::to_stock_book)
            .collect()
    }

    fn stock_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>> {
        let map = self.books.read();
        isbns
            .iter()
            .map(|&isbn| {
                validate_isbn(isbn)?;
                map.get(&isbn)
                    .map(BookRecord::to_stock_book)
                    .ok_or(BookStoreError::NotFound(isbn))
            })
            .collect()
    }

    fn books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        let map = self.books.read();
        isbns
            .iter()
            .map(|&isbn| {
                validate_isbn(isbn)?;
                map.get(&isbn)
                    .map(BookRecord::to_book)
                    .ok_or(BookStoreError::NotFound(isbn))
            })
            .collect()
    }

    fn editor_picks(&self) -> Vec<Book> {
        self.books
            .read()
            .values()
            .filter(|record| record.is_editor_pick())
            .map(BookRecord::to_book)
            .collect()
    }

    fn len(&self) -> usize {
        self.books.read().len()
    }
}

type RecordMap = HashMap<Isbn, Mutex<BookRecord>>;

/// Catalog with a structural lock over the key set and one lock per book
#[derive(Default)]
pub struct TwoLevelCatalog {
    books: RwLock<RecordMap>,
}

impl TwoLevelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the records for `isbns` in ascending order.
    ///
    /// `isbns` must already be sorted and free of duplicates.
    fn lock_sorted<'a>(
        map: &'a RecordMap,
        isbns: impl IntoIterator<Item = Isbn>,
    ) -> Result<BTreeMap<Isbn, MutexGuard<'a, BookRecord>>> {
        let mut guards = BTreeMap::new();
        for isbn in isbns {
            let record = map.get(&isbn).ok_or(BookStoreError::NotFound(isbn))?;
            guards.insert(isbn, record.lock());
        }
        Ok(guards)
    }

    /// Lock every record, for reads that must see one consistent state
    fn lock_all(map: &RecordMap) -> BTreeMap<Isbn, MutexGuard<'_, BookRecord>> {
        let mut isbns: Vec<Isbn> = map.keys().copied().collect();
        isbns.sort_unstable();
        isbns
            .into_iter()
            .filter_map(|isbn| map.get(&isbn).map(|record| (isbn, record.lock())))
            .collect()
    }

    /// Lock the records a read asks for, reporting the first invalid or absent ISBN
    fn lock_requested<'a>(
        map: &'a RecordMap,
        isbns: &[Isbn],
    ) -> Result<BTreeMap<Isbn, MutexGuard<'a, BookRecord>>> {
        for &isbn in isbns {
            validate_isbn(isbn)?;
            if !map.contains_key(&isbn) {
                return Err(BookStoreError::NotFound(isbn));
            }
        }
        let targets: BTreeSet<Isbn> = isbns.iter().copied().collect();
        Self::lock_sorted(map, targets)
    }
}

impl Catalog for TwoLevelCatalog {
    fn add_books(&self, books: &[StockBook], on_commit: CommitHook<'_>) -> Result<()> {
        let mut map = self.books.write();
        check_new_books(books, |isbn| map.contains_key(&isbn))?;

        for book in books {
            map.insert(book.isbn, Mutex::new(BookRecord::from(book.clone())));
        }
        on_commit();
        Ok(())
    }

    fn add_copies(&self, copies: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()> {
        let totals = restock_totals(copies)?;

        let map = self.books.read();
        let mut guards = Self::lock_sorted(&map, totals.keys().copied())?;
        for (isbn, delta) in &totals {
            if guards.get(isbn).is_some_and(|record| !record.can_restock(*delta)) {
                return Err(restock_overflow(*isbn));
            }
        }

        for (isbn, delta) in totals {
            if let Some(record) = guards.get_mut(&isbn) {
                record.add_copies(delta);
            }
        }
        on_commit();
        Ok(())
    }

    fn buy_books(&self, requests: &[BookCopy], on_commit: CommitHook<'_>) -> Result<()> {
        let totals = purchase_totals(requests)?;

        let map = self.books.read();
        let mut guards = Self::lock_sorted(&map, totals.keys().copied())?;

        let misses: Vec<SaleMiss> = totals
            .iter()
            .filter_map(|(&isbn, &quantity)| {
                let shortfall = guards.get(&isbn)?.shortfall(quantity);
                (shortfall > 0).then_some(SaleMiss { isbn, shortfall })
            })
            .collect();

        if !misses.is_empty() {
            for miss in &misses {
                if let Some(record) = guards.get_mut(&miss.isbn) {
                    record.add_sale_misses(miss.shortfall);
                }
            }
            return Err(BookStoreError::InsufficientStock { misses });
        }

        for (isbn, quantity) in totals {
            if let Some(record) = guards.get_mut(&isbn) {
                record.buy_copies(quantity);
            }
        }
        on_commit();
        Ok(())
    }

    fn remove_books(&self, isbns: &[Isbn], on_commit: CommitHook<'_>) -> Result<()> {
        let targets = distinct_isbns(isbns)?;

        let mut map = self.books.write();
        if let Some(&missing) = targets.iter().find(|&&isbn| !map.contains_key(&isbn)) {
            return Err(BookStoreError::NotFound(missing));
        }
        for isbn in targets {
            map.remove(&isbn);
        }
        on_commit();
        Ok(())
    }

    fn remove_all_books(&self, on_commit: CommitHook<'_>) -> usize {
        let mut map = self.books.write();
        let removed = map.len();
        map.clear();
        on_commit();
        removed
    }

    fn update_editor_picks(
        &self,
        picks: &[BookEditorPick],
        on_commit: CommitHook<'_>,
    ) -> Result<()> {
        let isbns: Vec<Isbn> = picks.iter().map(|pick| pick.isbn).collect();

        let map = self.books.read();
        let mut guards = Self::lock_requested(&map, &isbns)?;
        for pick in picks {
            if let Some(record) = guards.get_mut(&pick.isbn) {
                record.set_editor_pick(pick.editor_pick);
            }
        }
        on_commit();
        Ok(())
    }

    fn stock_books(&self) -> Vec<StockBook> {
        let map = self.books.read();
        Self::lock_all(&map)
            .values()
            .map(|record| record.to_stock_book())
            .collect()
    }

    fn stock_books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<StockBook>> {
        let map = self.books.read();
        let guards = Self::lock_requested(&map, isbns)?;
        Ok(isbns
            .iter()
            .filter_map(|isbn| guards.get(isbn).map(|record| record.to_stock_book()))
            .collect())
    }

    fn books_by_isbn(&self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        let map = self.books.read();
        let guards = Self::lock_requested(&map, isbns)?;
        Ok(isbns
            .iter()
            .filter_map(|isbn| guards.get(isbn).map(|record| record.to_book()))
            .collect())
    }

    fn editor_picks(&self) -> Vec<Book> {
        let map = self.books.read();
        Self::lock_all(&map)
            .values()
            .filter(|record| record.is_editor_pick())
            .map(|record| record.to_book())
            .collect()
    }

    fn len(&self) -> usize {
        self.books.read().len()
    }
}
