use super::types::{Isbn, SaleMiss};
use thiserror::Error;

/// Main error type for inventory operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookStoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("ISBN {0} is duplicated")]
    Duplicate(Isbn),

    #[error("ISBN {0} is not available")]
    NotFound(Isbn),

    #[error("Not enough copies in stock for {} book(s)", .misses.len())]
    InsufficientStock { misses: Vec<SaleMiss> },
}

impl BookStoreError {
    /// True when the request itself was malformed and retrying it unchanged cannot succeed
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Duplicate(_))
    }

    /// Sale misses recorded by a failed purchase, empty for every other error
    pub fn sale_misses(&self) -> &[SaleMiss] {
        match self {
            Self::InsufficientStock { misses } => misses,
            _ => &[],
        }
    }
}

/// Result type alias for inventory operations
pub type Result<T> = std::result::Result<T, BookStoreError>;
