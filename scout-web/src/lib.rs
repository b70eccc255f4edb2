//! Page-side domain capture for Domain Scout.
//!
//! - [`domain`]: normalization and validation of hostnames
//! - [`extract`]: DOM passes that collect candidate domains from HTML
//! - [`filter`]: user-defined predicates over a captured list
//! - [`page`]: page snapshots and change subscriptions
//! - [`watch`]: debounced auto-capture sessions
pub mod domain;
pub mod extract;
pub mod filter;
pub mod page;
pub mod watch;

pub use extract::Extractor;
pub use filter::{apply_filters, FilterSettings};
pub use page::{FilePage, PageSnapshot, PageSource, StaticPage};
pub use watch::{AutoDetected, WatchHandle, WatchSession};
