//! Durable, encrypted object blob storage for a Chaps token.
//!
//! A store holds two independent namespaces:
//!
//! - **Internal blobs**, keyed by [`InternalBlobId`]. These bootstrap the key
//!   hierarchy, so they are readable and writable before any encryption key
//!   exists. The store does not encrypt them.
//! - **Object blobs**, keyed by [`StoreId`]. Private object blobs are
//!   encrypted with the MAC-then-encrypt scheme of `chaps-crypto` and require
//!   [`ObjectStore::set_encryption_key`] first. Public object blobs are kept
//!   in the clear so a token's public objects can be listed before login.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FileObjectStore`] -- append-only journal replayed into memory at open
//! - [`InMemoryObjectStore`] -- map-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A mutation is appended to the journal before memory is updated; a
//!    failed append leaves the store unchanged.
//! 2. Store ids increase monotonically and are never reused.
//! 3. Stores hold no internal lock. Callers serialize access.
//! 4. Integrity failures are never repaired silently.

pub mod blob;
pub mod config;
pub mod error;
pub mod file;
pub mod journal;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use blob::ObjectBlob;
pub use config::{StoreConfig, SyncMode};
pub use error::{StoreError, StoreResult};
pub use file::{FileObjectStore, StoreStats};
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;

pub use chaps_types::{InternalBlobId, StoreId};
