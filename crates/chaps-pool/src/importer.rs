use crate::error::PoolResult;
use crate::pool::ObjectPool;

/// One-time migration of objects from a legacy token format.
///
/// A pool runs [`import_objects`](Self::import_objects) during
/// [`ObjectPool::init`] the first time it sees a store without the
/// `ImportedTracker` internal blob, and
/// [`finish_import_async`](Self::finish_import_async) once the encryption key
/// arrives. Both run without the pool lock held and call back into the pool.
///
/// `import_objects` runs before private objects are available, so it must
/// catalogue objects with [`ObjectPool::import`], never with the gated
/// [`ObjectPool::insert`].
pub trait ObjectImporter: Send {
    /// Import everything that does not need the encryption key.
    fn import_objects(&mut self, pool: &ObjectPool) -> PoolResult<()>;

    /// Import whatever was deferred until the key became available.
    fn finish_import_async(&mut self, pool: &ObjectPool) -> PoolResult<()>;
}
