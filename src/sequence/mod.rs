// src/sequence/mod.rs

//! Task ID allocation.
//!
//! - [`allocator`] owns the read/increment/persist algorithm over the local
//!   sequence file.
//! - [`store`] defines the `SequenceStore` trait for the optional shared
//!   counter.
//! - [`table`] is the file-backed shared table used in production.
//! - [`memory`] is an in-process store for tests and single-host setups.

pub mod allocator;
pub mod memory;
pub mod store;
pub mod table;

pub use allocator::SequenceAllocator;
pub use memory::MemorySequenceStore;
pub use store::{SEQUENCE_NAME, SequenceStore, StoreFuture};
pub use table::TableSequenceStore;
