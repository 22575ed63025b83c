//! CrossCheck cache layer.
//!
//! Key derivation plus the storage backends behind the `CacheStore` port.
//! The cache is advisory everywhere: callers treat errors as misses, and
//! concurrent writers to the same key resolve last-write-wins.

pub mod keys;
pub mod store;

pub use store::{FilesystemStore, MemoryStore};
