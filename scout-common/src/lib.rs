//! Common types and utilities shared across Domain Scout crates.
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ScoutError`] and [`Result`]: errors crossing crate boundaries
//!
//! ```rust
//! use scout_common::ScoutError;
//!
//! let err = ScoutError::Page("listing.html: No such file or directory".into());
//! assert_eq!(err.to_string(), "Page error: listing.html: No such file or directory");
//! ```

pub mod observability;

#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    /// The key-value store failed to read or write.
    #[error("Storage error: {0}")]
    Store(String),

    /// The page snapshot could not be read.
    #[error("Page error: {0}")]
    Page(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
