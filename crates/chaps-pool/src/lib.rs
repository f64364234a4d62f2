//! In-memory object catalog for one Chaps token.
//!
//! [`ObjectPool`] owns every live object of a token, hands out
//! [`SharedObject`] references keyed by [`Handle`], and mirrors each change
//! into an optional [`ObjectStore`]. Private objects only become visible
//! once [`ObjectPool::set_encryption_key`] has been called; operations that
//! need them block until then.
//!
//! # Design Rules
//!
//! 1. The catalog changes only after the store accepted the change.
//! 2. Every catalogued object has exactly one handle, assigned on entry.
//! 3. A failed [`ObjectPool::insert`] or [`ObjectPool::import`] hands the
//!    object back to the caller.
//! 4. Unreadable or mislabelled blobs are skipped during bulk load, never
//!    repaired.
//!
//! [`Handle`]: chaps_types::Handle
//! [`ObjectStore`]: chaps_store::ObjectStore

pub mod error;
pub mod importer;
pub mod pool;

pub use error::{PoolError, PoolResult, Rejected};
pub use importer::ObjectImporter;
pub use pool::{ObjectPool, SharedObject};
