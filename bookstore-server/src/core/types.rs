use super::error::{BookStoreError, Result};
use serde::{Deserialize, Serialize};

/// Book identifier. Valid ISBNs are strictly positive.
pub type Isbn = i32;

/// Sentinel used by clients for "no ISBN"
pub const INVALID_ISBN: Isbn = -1;

/// Full inventory view of a book, including stock telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBook {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub price: f32,
    pub num_copies: i32,
    pub num_sale_misses: i64,
    pub editor_pick: bool,
}

impl StockBook {
    /// Create a book with no demand history and no promotion
    pub fn new(
        isbn: Isbn,
        title: impl Into<String>,
        author: impl Into<String>,
        price: f32,
        num_copies: i32,
    ) -> Self {
        Self {
            isbn,
            title: title.into(),
            author: author.into(),
            price,
            num_copies,
            num_sale_misses: 0,
            editor_pick: false,
        }
    }

    /// Check every field a new catalog entry must satisfy
    pub fn validate(&self) -> Result<()> {
        validate_isbn(self.isbn)?;

        if self.title.trim().is_empty() {
            return Err(BookStoreError::Validation(format!(
                "book {} has an empty title",
                self.isbn
            )));
        }
        if self.author.trim().is_empty() {
            return Err(BookStoreError::Validation(format!(
                "book {} has an empty author",
                self.isbn
            )));
        }
        if self.num_copies < 0 {
            return Err(BookStoreError::Validation(format!(
                "book {} has a negative number of copies ({})",
                self.isbn, self.num_copies
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(BookStoreError::Validation(format!(
                "book {} has an invalid price ({})",
                self.isbn, self.price
            )));
        }
        if self.num_sale_misses < 0 {
            return Err(BookStoreError::Validation(format!(
                "book {} has a negative sale miss count",
                self.isbn
            )));
        }

        Ok(())
    }
}

/// Store-front view of a book, without stock telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub price: f32,
}

/// A quantity of copies of one book, used both for restocking and for buying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookCopy {
    pub isbn: Isbn,
    pub num_copies: i32,
}

impl BookCopy {
    pub fn new(isbn: Isbn, num_copies: i32) -> Self {
        Self { isbn, num_copies }
    }
}

/// Promotion toggle for one book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookEditorPick {
    pub isbn: Isbn,
    pub editor_pick: bool,
}

impl BookEditorPick {
    pub fn new(isbn: Isbn, editor_pick: bool) -> Self {
        Self { isbn, editor_pick }
    }
}

/// Unmet demand recorded when a purchase asked for more than was in stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleMiss {
    pub isbn: Isbn,
    pub shortfall: i64,
}

/// Mutable catalog entry
#[derive(Debug, Clone)]
pub struct BookRecord {
    isbn: Isbn,
    title: String,
    author: String,
    price: f32,
    num_copies: i32,
    num_sale_misses: i64,
    editor_pick: bool,
}

impl BookRecord {
    pub fn isbn(&self) -> Isbn {
        self.isbn
    }

    pub fn num_copies(&self) -> i32 {
        self.num_copies
    }

    pub fn is_editor_pick(&self) -> bool {
        self.editor_pick
    }

    /// Copies missing to satisfy a request of `requested`, zero when in stock
    pub fn shortfall(&self, requested: i64) -> i64 {
        (requested - i64::from(self.num_copies)).max(0)
    }

    /// Whether restocking by `delta` keeps the copy counter representable
    pub fn can_restock(&self, delta: i64) -> bool {
        i32::try_from(i64::from(self.num_copies) + delta).is_ok()
    }

    /// Restock. Callers check `can_restock` first.
    pub fn add_copies(&mut self, delta: i64) {
        let total = i64::from(self.num_copies).saturating_add(delta);
        self.num_copies = i32::try_from(total).unwrap_or(i32::MAX);
    }

    /// Deduct copies. Callers check availability first.
    pub fn buy_copies(&mut self, quantity: i64) {
        debug_assert!(quantity <= i64::from(self.num_copies));
        let remaining = (i64::from(self.num_copies) - quantity).max(0);
        self.num_copies = i32::try_from(remaining).unwrap_or(0);
    }

    pub fn add_sale_misses(&mut self, shortfall: i64) {
        self.num_sale_misses = self.num_sale_misses.saturating_add(shortfall);
    }

    pub fn set_editor_pick(&mut self, editor_pick: bool) {
        self.editor_pick = editor_pick;
    }

    pub fn to_stock_book(&self) -> StockBook {
        StockBook {
            isbn: self.isbn,
            title: self.title.clone(),
            author: self.author.clone(),
            price: self.price,
            num_copies: self.num_copies,
            num_sale_misses: self.num_sale_misses,
            editor_pick: self.editor_pick,
        }
    }

    pub fn to_book(&self) -> Book {
        Book {
            isbn: self.isbn,
            title: self.title.clone(),
            author: self.author.clone(),
            price: self.price,
        }
    }
}

impl From<StockBook> for BookRecord {
    fn from(book: StockBook) -> Self {
        Self {
            isbn: book.isbn,
            title: book.title,
            author: book.author,
            price: book.price,
            num_copies: book.num_copies,
            num_sale_misses: book.num_sale_misses,
            editor_pick: book.editor_pick,
        }
    }
}

/// Reject reserved and non-positive ISBNs
pub fn validate_isbn(isbn: Isbn) -> Result<()> {
    if isbn < 1 {
        return Err(BookStoreError::Validation(format!("ISBN {} is invalid", isbn)));
    }
    Ok(())
}

/// Lock granularity used by the inventory engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockingStrategy {
    /// One reader-writer lock over the whole catalog
    #[default]
    Coarse,
    /// Structural lock over the key set plus one lock per book
    Fine,
}

/// Configuration for the inventory engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Lock granularity
    pub locking: LockingStrategy,
    /// Fixed seed for editor-pick sampling; entropy-seeded when unset
    pub rng_seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_book() {
        assert!(StockBook::new(1, "Dune", "Herbert", 9.5, 3).validate().is_ok());
        assert!(StockBook::new(1, "Dune", "Herbert", 0.0, 0).validate().is_ok());

        let invalid = [
            StockBook::new(0, "Dune", "Herbert", 9.5, 3),
            StockBook::new(INVALID_ISBN, "Dune", "Herbert", 9.5, 3),
            StockBook::new(1, "", "Herbert", 9.5, 3),
            StockBook::new(1, "Dune", "  ", 9.5, 3),
            StockBook::new(1, "Dune", "Herbert", -1.0, 3),
            StockBook::new(1, "Dune", "Herbert", f32::NAN, 3),
            StockBook::new(1, "Dune", "Herbert", 9.5, -3),
        ];
        for book in invalid {
            assert!(
                matches!(book.validate(), Err(BookStoreError::Validation(_))),
                "{:?} should be rejected",
                book
            );
        }
    }

    #[test]
    fn test_record_bookkeeping() {
        let mut record = BookRecord::from(StockBook::new(5, "Emma", "Austen", 4.0, 2));
        assert_eq!(record.shortfall(1), 0);
        assert_eq!(record.shortfall(7), 5);

        record.add_sale_misses(5);
        record.add_copies(3);
        record.buy_copies(4);
        record.set_editor_pick(true);

        let snapshot = record.to_stock_book();
        assert_eq!(snapshot.num_copies, 1);
        assert_eq!(snapshot.num_sale_misses, 5);
        assert!(snapshot.editor_pick);
        assert_eq!(record.to_book().title, "Emma");
    }
}
