use std::collections::BTreeMap;

use chaps_types::{InternalBlobId, StoreId};

use crate::blob::ObjectBlob;
use crate::error::StoreResult;

/// Persistent blob store backing one token.
///
/// All implementations must satisfy these invariants:
/// - Internal blobs are usable before a key is set and are stored as given.
/// - Private object blobs are encrypted at rest and require a key.
/// - Store ids are assigned at insert time, increase monotonically, and are
///   never reused.
/// - A failed mutation leaves the store unchanged.
///
/// Stores are not internally synchronized; mutating methods take `&mut self`
/// and the owner is responsible for serializing access.
pub trait ObjectStore: Send {
    /// Read an internal blob. Returns `Ok(None)` if it was never written.
    fn get_internal_blob(&self, id: InternalBlobId) -> StoreResult<Option<Vec<u8>>>;

    /// Write an internal blob, replacing any previous value.
    fn set_internal_blob(&mut self, id: InternalBlobId, blob: &[u8]) -> StoreResult<()>;

    /// Install the 32-byte key protecting private object blobs.
    ///
    /// Fails if the key has the wrong length.
    fn set_encryption_key(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Persist a new object blob and return its freshly assigned id.
    fn insert_object_blob(&mut self, blob: &ObjectBlob) -> StoreResult<StoreId>;

    /// Delete the object blob stored under `id`.
    fn delete_object_blob(&mut self, id: StoreId) -> StoreResult<()>;

    /// Delete every object blob. Internal blobs are kept.
    fn delete_all_object_blobs(&mut self) -> StoreResult<()>;

    /// Replace the object blob stored under `id`.
    fn update_object_blob(&mut self, id: StoreId, blob: &ObjectBlob) -> StoreResult<()>;

    /// All blobs declared public.
    fn load_public_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>>;

    /// All blobs declared private, decrypted. Requires the key.
    ///
    /// Blobs failing decryption or authentication are logged and left out.
    fn load_private_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>>;
}
