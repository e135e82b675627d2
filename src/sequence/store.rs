// src/sequence/store.rs

//! Shared counter store abstraction.
//!
//! Several server instances can point their allocators at the same store to
//! keep task IDs unique across the fleet on a best-effort basis. The store
//! holds a single-key table with one item (keyed by [`SEQUENCE_NAME`]) and an
//! integer attribute carrying the last issued ID.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use crate::errors::StoreError;

/// Fixed key of the single item holding the counter.
pub const SEQUENCE_NAME: &str = "envlane-global";

pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, StoreError>> + Send + 'a>>;

/// Trait abstracting the shared sequence store.
///
/// Production code uses [`super::TableSequenceStore`]; tests use
/// [`super::MemorySequenceStore`].
pub trait SequenceStore: Send + Sync + Debug {
    /// Read the current counter value.
    ///
    /// Returns `StoreError::NotFound` when the table itself does not exist.
    fn get_sequence(&self) -> StoreFuture<'_, u64>;

    /// Overwrite the counter with `value`.
    fn update_sequence(&self, value: u64) -> StoreFuture<'_, ()>;

    /// Create the table if it does not exist yet.
    fn ensure_sequence_table(&self) -> StoreFuture<'_, ()>;
}
