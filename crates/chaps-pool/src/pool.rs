use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::Duration;

use chaps_object::{ChapsFactory, HandleGenerator, Object};
use chaps_store::{ObjectBlob, ObjectStore};
use chaps_types::attributes::{CKA_PRIVATE, CKO_PRIVATE_KEY};
use chaps_types::{Handle, InternalBlobId, StoreId};
use tracing::{debug, info, warn};

use crate::error::{PoolError, PoolResult, Rejected};
use crate::importer::ObjectImporter;

/// A catalogued object. The pool keeps one reference; callers may hold more.
pub type SharedObject = Arc<RwLock<Object>>;

struct PoolState {
    store: Option<Box<dyn ObjectStore>>,
    objects: HashMap<Handle, SharedObject>,
    private_loaded: bool,
    finish_import_pending: bool,
}

impl PoolState {
    fn is_catalogued(&self, handle: Handle, object: &SharedObject) -> bool {
        self.objects
            .get(&handle)
            .is_some_and(|catalogued| Arc::ptr_eq(catalogued, object))
    }
}

/// Thread-safe catalog of the objects of one token.
///
/// A pool with a store starts out exposing public objects only. Operations
/// that need private objects block until [`set_encryption_key`] loads them;
/// after that nothing blocks again. A pool without a store holds session
/// objects and never blocks.
///
/// Lock order is pool, then object: do not hold an object's write guard
/// while calling back into the pool.
///
/// [`set_encryption_key`]: ObjectPool::set_encryption_key
pub struct ObjectPool {
    factory: Arc<dyn ChapsFactory>,
    handle_generator: Arc<dyn HandleGenerator>,
    importer: Mutex<Option<Box<dyn ObjectImporter>>>,
    state: Mutex<PoolState>,
    private_loaded: Condvar,
}

impl ObjectPool {
    /// Create a pool, optionally backed by a persistent `store`.
    pub fn new(
        factory: Arc<dyn ChapsFactory>,
        handle_generator: Arc<dyn HandleGenerator>,
        store: Option<Box<dyn ObjectStore>>,
    ) -> Self {
        let private_loaded = store.is_none();
        Self {
            factory,
            handle_generator,
            importer: Mutex::new(None),
            state: Mutex::new(PoolState {
                store,
                objects: HashMap::new(),
                private_loaded,
                finish_import_pending: false,
            }),
            private_loaded: Condvar::new(),
        }
    }

    /// Attach a legacy importer, run by [`init`](Self::init).
    pub fn with_importer(mut self, importer: Box<dyn ObjectImporter>) -> Self {
        self.importer = Mutex::new(Some(importer));
        self
    }

    /// Load public objects from the store and run the legacy import once.
    pub fn init(&self) -> PoolResult<()> {
        let has_importer = self.lock_importer()?.is_some();
        let run_import = {
            let mut guard = self.lock_state()?;
            let state = &mut *guard;
            let Some(store) = state.store.as_ref() else {
                debug!("object pool has no store");
                return Ok(());
            };
            let blobs = store.load_public_object_blobs()?;
            let imported = store
                .get_internal_blob(InternalBlobId::ImportedTracker)?
                .is_some();
            let loaded = self.load_blobs(state, blobs, false);
            info!(objects = loaded, "public objects loaded");
            has_importer && !imported
        };
        if run_import {
            self.run_import()?;
        }
        Ok(())
    }

    fn run_import(&self) -> PoolResult<()> {
        let mut importer = self.lock_importer()?;
        let Some(importer) = importer.as_mut() else {
            return Ok(());
        };
        if let Err(e) = importer.import_objects(self) {
            warn!(error = %e, "legacy object import failed");
            return Ok(());
        }
        let finish_now = {
            let mut state = self.lock_state()?;
            if let Some(store) = state.store.as_mut() {
                store.set_internal_blob(InternalBlobId::ImportedTracker, &[])?;
            }
            if state.private_loaded {
                true
            } else {
                state.finish_import_pending = true;
                false
            }
        };
        info!("legacy objects imported");
        if finish_now {
            Self::finish_import(&mut **importer, self);
        }
        Ok(())
    }

    fn finish_import(importer: &mut dyn ObjectImporter, pool: &ObjectPool) {
        match importer.finish_import_async(pool) {
            Ok(()) => info!("deferred legacy import finished"),
            Err(e) => warn!(error = %e, "deferred legacy import failed"),
        }
    }

    pub fn get_internal_blob(&self, id: InternalBlobId) -> PoolResult<Option<Vec<u8>>> {
        let state = self.lock_state()?;
        let store = state.store.as_ref().ok_or(PoolError::NoStore)?;
        Ok(store.get_internal_blob(id)?)
    }

    pub fn set_internal_blob(&self, id: InternalBlobId, blob: &[u8]) -> PoolResult<()> {
        let mut state = self.lock_state()?;
        let store = state.store.as_mut().ok_or(PoolError::NoStore)?;
        Ok(store.set_internal_blob(id, blob)?)
    }

    /// Hand the key to the store, load private objects and release waiters.
    ///
    /// If the store rejects the key nothing is loaded and waiters stay
    /// blocked. If the key is accepted but the private objects cannot be
    /// read, the failure is logged and the pool still counts as loaded so
    /// waiters are released. A later call replaces the store's key but does
    /// not load private objects a second time.
    pub fn set_encryption_key(&self, key: &[u8]) -> PoolResult<()> {
        let finish_import = {
            let mut guard = self.lock_state()?;
            let state = &mut *guard;
            if let Some(store) = state.store.as_mut() {
                store.set_encryption_key(key)?;
                if !state.private_loaded {
                    match store.load_private_object_blobs() {
                        Ok(blobs) => {
                            let loaded = self.load_blobs(state, blobs, true);
                            info!(objects = loaded, "private objects loaded");
                        }
                        Err(e) => warn!(error = %e, "failed to load private objects"),
                    }
                }
            }
            state.private_loaded = true;
            self.private_loaded.notify_all();
            std::mem::take(&mut state.finish_import_pending)
        };
        if finish_import {
            let mut importer = self.lock_importer()?;
            if let Some(importer) = importer.as_mut() {
                Self::finish_import(&mut **importer, self);
            }
        }
        Ok(())
    }

    /// Catalogue `object`, first waiting for private objects if it is private.
    pub fn insert(&self, object: Object) -> Result<SharedObject, Rejected> {
        let state = match self.lock_state() {
            Ok(state) => state,
            Err(e) => return Err(Rejected::new(object, e)),
        };
        let mut state = if object.is_private() {
            match self.wait_for_private(state) {
                Ok(state) => state,
                Err(e) => return Err(Rejected::new(object, e)),
            }
        } else {
            state
        };
        self.catalogue(&mut state, object)
    }

    /// Catalogue `object` without waiting for private objects.
    ///
    /// With a store the object is persisted first; the catalog changes only
    /// once the store has accepted the blob. On failure the object is handed
    /// back inside the [`Rejected`].
    pub fn import(&self, object: Object) -> Result<SharedObject, Rejected> {
        let mut state = match self.lock_state() {
            Ok(state) => state,
            Err(e) => return Err(Rejected::new(object, e)),
        };
        self.catalogue(&mut state, object)
    }

    fn catalogue(&self, state: &mut PoolState, mut object: Object) -> Result<SharedObject, Rejected> {
        let existing = object.handle();
        if existing.is_valid() && state.objects.contains_key(&existing) {
            return Err(Rejected::new(object, PoolError::AlreadyCatalogued(existing)));
        }
        if let Some(store) = state.store.as_mut() {
            match persist(&mut **store, &mut object) {
                Ok(store_id) => object.set_store_id(store_id),
                Err(e) => return Err(Rejected::new(object, e)),
            }
        }
        let handle = self.handle_generator.create_handle();
        object.set_handle(handle);
        debug!(%handle, store_id = ?object.store_id(), "object catalogued");
        let shared = Arc::new(RwLock::new(object));
        state.objects.insert(handle, Arc::clone(&shared));
        Ok(shared)
    }

    /// Remove `object` from the catalog and delete its blob.
    pub fn delete(&self, object: &SharedObject) -> PoolResult<()> {
        let mut state = self.lock_state()?;
        let (handle, is_private, store_id) = identity(object)?;
        if !state.is_catalogued(handle, object) {
            return Err(PoolError::UnknownObject(handle));
        }
        if is_private && state.store.is_some() {
            state = self.wait_for_private(state)?;
            if !state.is_catalogued(handle, object) {
                return Err(PoolError::UnknownObject(handle));
            }
        }
        if let Some(store) = state.store.as_mut() {
            let store_id = store_id.ok_or(PoolError::NotPersisted(handle))?;
            store.delete_object_blob(store_id)?;
        }
        state.objects.remove(&handle);
        debug!(%handle, "object deleted");
        Ok(())
    }

    /// Delete every object blob and empty the catalog.
    pub fn delete_all(&self) -> PoolResult<()> {
        let mut state = self.lock_state()?;
        if let Some(store) = state.store.as_mut() {
            store.delete_all_object_blobs()?;
        }
        let removed = state.objects.len();
        state.objects.clear();
        info!(removed, "all objects deleted");
        Ok(())
    }

    /// All catalogued objects matching `template`, in handle order.
    ///
    /// An object matches when it carries every attribute of the template
    /// with an identical value. A template asking for private objects
    /// (`CKA_PRIVATE` true, or class `CKO_PRIVATE_KEY`) waits for them.
    pub fn find(&self, template: &Object) -> PoolResult<Vec<SharedObject>> {
        let mut state = self.lock_state()?;
        if requests_private(template) {
            state = self.wait_for_private(state)?;
        }
        let mut found = Vec::new();
        for (&handle, object) in &state.objects {
            if read(object)?.matches(template) {
                found.push((handle, Arc::clone(object)));
            }
        }
        found.sort_by_key(|(handle, _)| *handle);
        Ok(found.into_iter().map(|(_, object)| object).collect())
    }

    pub fn find_by_handle(&self, handle: Handle) -> PoolResult<Option<SharedObject>> {
        let state = self.lock_state()?;
        Ok(state.objects.get(&handle).cloned())
    }

    /// The catalogued object itself, for in-place modification.
    ///
    /// Changes reach the store only on [`flush`](Self::flush).
    pub fn get_modifiable_object(&self, object: &SharedObject) -> PoolResult<SharedObject> {
        let state = self.lock_state()?;
        let handle = read(object)?.handle();
        if !state.is_catalogued(handle, object) {
            return Err(PoolError::UnknownObject(handle));
        }
        Ok(Arc::clone(object))
    }

    /// Write the current attributes of `object` back to the store.
    pub fn flush(&self, object: &SharedObject) -> PoolResult<()> {
        let mut state = self.lock_state()?;
        let (handle, is_private, store_id) = identity(object)?;
        if !state.is_catalogued(handle, object) {
            return Err(PoolError::UnknownObject(handle));
        }
        if state.store.is_none() {
            return Ok(());
        }
        let blob = read(object)?.serialize()?;
        if is_private {
            state = self.wait_for_private(state)?;
        }
        let store_id = store_id.ok_or(PoolError::NotPersisted(handle))?;
        if let Some(store) = state.store.as_mut() {
            store.update_object_blob(store_id, &ObjectBlob::new(blob, is_private))?;
        }
        debug!(%handle, %store_id, "object flushed");
        Ok(())
    }

    pub fn len(&self) -> PoolResult<usize> {
        Ok(self.lock_state()?.objects.len())
    }

    pub fn is_empty(&self) -> PoolResult<bool> {
        Ok(self.lock_state()?.objects.is_empty())
    }

    /// Whether private objects are visible yet.
    pub fn is_private_loaded(&self) -> PoolResult<bool> {
        Ok(self.lock_state()?.private_loaded)
    }

    /// Wait at most `timeout` for private objects. Returns whether they
    /// are loaded.
    pub fn wait_for_private_objects_timeout(&self, timeout: Duration) -> PoolResult<bool> {
        let state = self.lock_state()?;
        let (state, _) = self
            .private_loaded
            .wait_timeout_while(state, timeout, |state| !state.private_loaded)
            .map_err(|_| PoolError::LockPoisoned)?;
        Ok(state.private_loaded)
    }

    fn lock_state(&self) -> PoolResult<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|_| PoolError::LockPoisoned)
    }

    fn lock_importer(&self) -> PoolResult<MutexGuard<'_, Option<Box<dyn ObjectImporter>>>> {
        self.importer.lock().map_err(|_| PoolError::LockPoisoned)
    }

    /// Block until private objects are loaded, releasing the lock meanwhile.
    fn wait_for_private<'a>(
        &self,
        mut state: MutexGuard<'a, PoolState>,
    ) -> PoolResult<MutexGuard<'a, PoolState>> {
        if !state.private_loaded {
            debug!("waiting for private objects");
        }
        while !state.private_loaded {
            state = self
                .private_loaded
                .wait(state)
                .map_err(|_| PoolError::LockPoisoned)?;
        }
        Ok(state)
    }

    /// Catalogue loaded blobs. Returns how many were accepted.
    fn load_blobs(
        &self,
        state: &mut PoolState,
        blobs: BTreeMap<StoreId, ObjectBlob>,
        private: bool,
    ) -> usize {
        // Objects imported before the load are already catalogued.
        let known: HashSet<StoreId> = state
            .objects
            .values()
            .filter_map(|object| object.read().ok()?.store_id())
            .collect();
        let mut loaded = 0;
        for (store_id, blob) in blobs {
            if known.contains(&store_id) {
                continue;
            }
            if blob.is_private != private {
                warn!(%store_id, "object blob returned with the wrong privacy; skipping");
                continue;
            }
            let mut object = self.factory.create_object();
            if let Err(e) = object.parse(&blob.blob) {
                warn!(%store_id, error = %e, "failed to parse object blob; skipping");
                continue;
            }
            if object.is_private() != blob.is_private {
                warn!(%store_id, "object privacy does not match its blob; skipping");
                continue;
            }
            object.set_store_id(store_id);
            let handle = self.handle_generator.create_handle();
            object.set_handle(handle);
            state.objects.insert(handle, Arc::new(RwLock::new(object)));
            loaded += 1;
        }
        loaded
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ObjectPool");
        if let Ok(state) = self.state.try_lock() {
            debug
                .field("objects", &state.objects.len())
                .field("store", &state.store.is_some())
                .field("private_loaded", &state.private_loaded);
        }
        debug.finish_non_exhaustive()
    }
}

/// Serialize, normalize and store `object`, returning its new store id.
fn persist(store: &mut dyn ObjectStore, object: &mut Object) -> PoolResult<StoreId> {
    let blob = object.serialize()?;
    // Re-parsing brings integral attributes to native width.
    object.parse(&blob)?;
    Ok(store.insert_object_blob(&ObjectBlob::new(blob, object.is_private()))?)
}

fn read(object: &SharedObject) -> PoolResult<RwLockReadGuard<'_, Object>> {
    object.read().map_err(|_| PoolError::LockPoisoned)
}

fn identity(object: &SharedObject) -> PoolResult<(Handle, bool, Option<StoreId>)> {
    let object = read(object)?;
    Ok((object.handle(), object.is_private(), object.store_id()))
}

fn requests_private(template: &Object) -> bool {
    template.get_attribute_bool(CKA_PRIVATE, false) || template.get_object_class() == CKO_PRIVATE_KEY
}
