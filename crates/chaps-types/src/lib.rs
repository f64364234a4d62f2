//! Foundation types for the Chaps token object store.
//!
//! This crate provides the identifier and constant types shared by every
//! other Chaps crate. It has no knowledge of persistence or encryption.
//!
//! # Key Types
//!
//! - [`Handle`] -- Process-unique integer naming a live object in a pool
//! - [`StoreId`] -- Persistent integer key of an object blob in a store
//! - [`InternalBlobId`] -- Fixed ids of the unencrypted bookkeeping blobs
//! - [`attributes`] -- PKCS#11 attribute types and object classes

pub mod attributes;
pub mod blob_id;
pub mod error;
pub mod ids;

pub use attributes::{AttributeType, ObjectClass};
pub use blob_id::InternalBlobId;
pub use error::TypeError;
pub use ids::{Handle, StoreId};
