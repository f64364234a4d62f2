use std::collections::BTreeMap;

use chaps_crypto::BlobCipher;
use chaps_types::{InternalBlobId, StoreId};
use tracing::warn;

use crate::blob::ObjectBlob;
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory object store.
///
/// Intended for tests and embedding. Private object blobs are still held as
/// ciphertext so the store behaves exactly like a persistent one; everything
/// is lost when the store is dropped.
#[derive(Default)]
pub struct InMemoryObjectStore {
    cipher: Option<BlobCipher>,
    internal: BTreeMap<InternalBlobId, Vec<u8>>,
    objects: BTreeMap<StoreId, ObjectBlob>,
    last_id: u64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of object blobs currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Raw stored bytes of an object blob (ciphertext if private).
    pub fn raw_object_blob(&self, id: StoreId) -> Option<&ObjectBlob> {
        self.objects.get(&id)
    }

    /// Overwrite the stored bytes of an object blob, bypassing encryption.
    pub fn replace_raw_object_blob(&mut self, id: StoreId, blob: ObjectBlob) {
        self.objects.insert(id, blob);
    }

    fn seal(&self, blob: &ObjectBlob) -> StoreResult<ObjectBlob> {
        if !blob.is_private {
            return Ok(blob.clone());
        }
        let cipher = self.cipher.as_ref().ok_or(StoreError::KeyNotSet)?;
        Ok(ObjectBlob::private(cipher.encrypt(&blob.blob)?))
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get_internal_blob(&self, id: InternalBlobId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.internal.get(&id).cloned())
    }

    fn set_internal_blob(&mut self, id: InternalBlobId, blob: &[u8]) -> StoreResult<()> {
        self.internal.insert(id, blob.to_vec());
        Ok(())
    }

    fn set_encryption_key(&mut self, key: &[u8]) -> StoreResult<()> {
        self.cipher = Some(BlobCipher::new(key)?);
        Ok(())
    }

    fn insert_object_blob(&mut self, blob: &ObjectBlob) -> StoreResult<StoreId> {
        let sealed = self.seal(blob)?;
        self.last_id += 1;
        let id = StoreId::new(self.last_id);
        self.objects.insert(id, sealed);
        Ok(id)
    }

    fn delete_object_blob(&mut self, id: StoreId) -> StoreResult<()> {
        self.objects
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn delete_all_object_blobs(&mut self) -> StoreResult<()> {
        self.objects.clear();
        Ok(())
    }

    fn update_object_blob(&mut self, id: StoreId, blob: &ObjectBlob) -> StoreResult<()> {
        if !self.objects.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let sealed = self.seal(blob)?;
        self.objects.insert(id, sealed);
        Ok(())
    }

    fn load_public_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>> {
        Ok(self
            .objects
            .iter()
            .filter(|(_, blob)| !blob.is_private)
            .map(|(&id, blob)| (id, blob.clone()))
            .collect())
    }

    fn load_private_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>> {
        let cipher = self.cipher.as_ref().ok_or(StoreError::KeyNotSet)?;
        let mut blobs = BTreeMap::new();
        for (&id, sealed) in self.objects.iter().filter(|(_, blob)| blob.is_private) {
            match cipher.decrypt(&sealed.blob) {
                Ok(plaintext) => {
                    blobs.insert(id, ObjectBlob::private(plaintext));
                }
                Err(e) => warn!(store_id = %id, error = %e, "failed to decrypt object blob; skipping"),
            }
        }
        Ok(blobs)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("internal", &self.internal.len())
            .field("objects", &self.objects.len())
            .field("keyed", &self.cipher.is_some())
            .finish()
    }
}
