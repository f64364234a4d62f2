//! Token objects for the Chaps object store.
//!
//! An [`Object`] is a mutable map of PKCS#11 attributes plus the two
//! integers the store layer stamps on it: a [`Handle`] issued when the object
//! enters a pool and a [`StoreId`] issued when its blob is persisted.
//!
//! Objects cross the persistence boundary as a flat attribute list (see
//! [`codec`]); integral attributes are re-encoded to the native `CK_ULONG`
//! width on every parse.
//!
//! [`Handle`]: chaps_types::Handle
//! [`StoreId`]: chaps_types::StoreId

pub mod codec;
pub mod error;
pub mod factory;
pub mod object;

pub use codec::{parse_attributes, serialize_attributes};
pub use error::{ObjectError, ObjectResult};
pub use factory::{ChapsFactory, DefaultChapsFactory, HandleGenerator, SequentialHandleGenerator};
pub use object::{AttributeMap, Object};
