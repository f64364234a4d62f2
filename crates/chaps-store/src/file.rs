use std::collections::BTreeMap;
use std::path::Path;

use chaps_crypto::BlobCipher;
use chaps_types::{InternalBlobId, StoreId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blob::ObjectBlob;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, JournalRecord};
use crate::traits::ObjectStore;

/// Store ids start here; 0 is never assigned.
const FIRST_STORE_ID: StoreId = StoreId::new(1);

/// An object blob as held at rest.
#[derive(Clone)]
struct StoredBlob {
    is_private: bool,
    /// Ciphertext for private blobs, the plain attribute list otherwise.
    data: Vec<u8>,
}

/// Summary of a store's contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub internal_blobs: usize,
    pub public_objects: usize,
    pub private_objects: usize,
    pub next_store_id: StoreId,
    pub journal_bytes: u64,
    pub dead_records: usize,
}

/// Journal-backed [`ObjectStore`].
///
/// The full store state lives in memory and every mutation is appended to a
/// [`Journal`] before it is applied. Opening the store replays the journal.
/// Superseded records are dropped by compaction, which runs automatically
/// once [`StoreConfig::compact_threshold`] of them have accumulated.
pub struct FileObjectStore {
    journal: Journal,
    cipher: Option<BlobCipher>,
    internal: BTreeMap<InternalBlobId, Vec<u8>>,
    objects: BTreeMap<StoreId, StoredBlob>,
    next_id: StoreId,
    /// Whether the journal holds a `NextId` record.
    next_id_recorded: bool,
    /// Records currently in the journal.
    total_records: usize,
    compact_threshold: usize,
}

impl FileObjectStore {
    /// Open (or create) the store described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let (journal, records) = Journal::open(&config.path, config.sync_mode)?;
        let mut store = Self {
            journal,
            cipher: None,
            internal: BTreeMap::new(),
            objects: BTreeMap::new(),
            next_id: FIRST_STORE_ID,
            next_id_recorded: false,
            total_records: 0,
            compact_threshold: config.compact_threshold,
        };
        for record in records {
            store.apply(record);
        }
        info!(
            path = %config.path.display(),
            internal = store.internal.len(),
            objects = store.objects.len(),
            next_id = %store.next_id,
            "object store opened"
        );
        Ok(store)
    }

    /// Open a store at `path` with default settings.
    pub fn open_path(path: &Path) -> StoreResult<Self> {
        Self::open(&StoreConfig::at(path))
    }

    /// Whether an encryption key has been installed.
    pub fn has_encryption_key(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn stats(&self) -> StoreStats {
        let private_objects = self.objects.values().filter(|b| b.is_private).count();
        StoreStats {
            internal_blobs: self.internal.len(),
            public_objects: self.objects.len() - private_objects,
            private_objects,
            next_store_id: self.next_id,
            journal_bytes: self.journal.offset(),
            dead_records: self.dead_records(),
        }
    }

    /// Rewrite the journal so it holds only live state.
    pub fn compact(&mut self) -> StoreResult<()> {
        let mut records = Vec::with_capacity(1 + self.internal.len() + self.objects.len());
        records.push(JournalRecord::NextId { next: self.next_id });
        for (&id, blob) in &self.internal {
            records.push(JournalRecord::SetInternal {
                id,
                blob: blob.clone(),
            });
        }
        for (&store_id, stored) in &self.objects {
            records.push(JournalRecord::PutObject {
                store_id,
                is_private: stored.is_private,
                data: stored.data.clone(),
            });
        }
        let dropped = self.dead_records();
        self.journal.rewrite(&records)?;
        self.total_records = records.len();
        self.next_id_recorded = true;
        debug!(dropped, live = records.len(), "journal compacted");
        Ok(())
    }

    /// Records that still carry state: the latest `NextId`, one per internal
    /// blob and one per object.
    fn live_records(&self) -> usize {
        usize::from(self.next_id_recorded) + self.internal.len() + self.objects.len()
    }

    fn dead_records(&self) -> usize {
        self.total_records.saturating_sub(self.live_records())
    }

    fn cipher(&self) -> StoreResult<&BlobCipher> {
        self.cipher.as_ref().ok_or(StoreError::KeyNotSet)
    }

    /// Encode a blob for storage, encrypting it if private.
    fn seal(&self, blob: &ObjectBlob) -> StoreResult<Vec<u8>> {
        if blob.is_private {
            Ok(self.cipher()?.encrypt(&blob.blob)?)
        } else {
            Ok(blob.blob.clone())
        }
    }

    /// Append `record` and then apply it to memory.
    fn commit(&mut self, record: JournalRecord) -> StoreResult<()> {
        self.journal.append(&record)?;
        self.apply(record);
        self.maybe_compact();
        Ok(())
    }

    fn apply(&mut self, record: JournalRecord) {
        self.total_records += 1;
        match record {
            JournalRecord::SetInternal { id, blob } => {
                self.internal.insert(id, blob);
            }
            JournalRecord::PutObject {
                store_id,
                is_private,
                data,
            } => {
                self.next_id = self.next_id.max(store_id.next());
                self.objects.insert(store_id, StoredBlob { is_private, data });
            }
            JournalRecord::DeleteObject { store_id } => {
                self.objects.remove(&store_id);
            }
            JournalRecord::DeleteAllObjects => {
                self.objects.clear();
            }
            JournalRecord::NextId { next } => {
                self.next_id = self.next_id.max(next);
                self.next_id_recorded = true;
            }
        }
    }

    fn maybe_compact(&mut self) {
        if self.compact_threshold == 0 || self.dead_records() < self.compact_threshold {
            return;
        }
        // The mutation itself is already durable; a failed compaction only
        // leaves a longer journal behind.
        if let Err(e) = self.compact() {
            warn!(error = %e, "journal compaction failed");
        }
    }
}

impl ObjectStore for FileObjectStore {
    fn get_internal_blob(&self, id: InternalBlobId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.internal.get(&id).cloned())
    }

    fn set_internal_blob(&mut self, id: InternalBlobId, blob: &[u8]) -> StoreResult<()> {
        self.commit(JournalRecord::SetInternal {
            id,
            blob: blob.to_vec(),
        })
    }

    fn set_encryption_key(&mut self, key: &[u8]) -> StoreResult<()> {
        let cipher = BlobCipher::new(key)?;
        if self.cipher.is_some() {
            warn!("replacing store encryption key");
        }
        self.cipher = Some(cipher);
        debug!("store encryption key set");
        Ok(())
    }

    fn insert_object_blob(&mut self, blob: &ObjectBlob) -> StoreResult<StoreId> {
        let data = self.seal(blob)?;
        let store_id = self.next_id;
        self.commit(JournalRecord::PutObject {
            store_id,
            is_private: blob.is_private,
            data,
        })?;
        Ok(store_id)
    }

    fn delete_object_blob(&mut self, id: StoreId) -> StoreResult<()> {
        if !self.objects.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.commit(JournalRecord::DeleteObject { store_id: id })
    }

    fn delete_all_object_blobs(&mut self) -> StoreResult<()> {
        self.commit(JournalRecord::DeleteAllObjects)
    }

    fn update_object_blob(&mut self, id: StoreId, blob: &ObjectBlob) -> StoreResult<()> {
        if !self.objects.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let data = self.seal(blob)?;
        self.commit(JournalRecord::PutObject {
            store_id: id,
            is_private: blob.is_private,
            data,
        })
    }

    fn load_public_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>> {
        Ok(self
            .objects
            .iter()
            .filter(|(_, stored)| !stored.is_private)
            .map(|(&id, stored)| (id, ObjectBlob::public(stored.data.clone())))
            .collect())
    }

    fn load_private_object_blobs(&self) -> StoreResult<BTreeMap<StoreId, ObjectBlob>> {
        let cipher = self.cipher()?;
        let mut blobs = BTreeMap::new();
        for (&id, stored) in self.objects.iter().filter(|(_, stored)| stored.is_private) {
            match cipher.decrypt(&stored.data) {
                Ok(plaintext) => {
                    blobs.insert(id, ObjectBlob::private(plaintext));
                }
                Err(e) => {
                    warn!(store_id = %id, error = %e, "failed to decrypt object blob; skipping");
                }
            }
        }
        Ok(blobs)
    }
}

impl std::fmt::Debug for FileObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObjectStore")
            .field("path", &self.journal.path())
            .field("objects", &self.objects.len())
            .field("keyed", &self.cipher.is_some())
            .finish()
    }
}
