use chaps_object::{Object, ObjectError};
use chaps_store::StoreError;
use chaps_types::Handle;

/// Errors from object pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The operation needs a persistent store and the pool has none.
    #[error("no persistent store attached")]
    NoStore,

    /// The object is already in this pool's catalog.
    #[error("object {0} is already catalogued")]
    AlreadyCatalogued(Handle),

    /// The object is not in this pool's catalog.
    #[error("object {0} is not catalogued in this pool")]
    UnknownObject(Handle),

    /// A catalogued object in a store-backed pool has no store id.
    #[error("object {0} has no persisted blob")]
    NotPersisted(Handle),

    /// An importer failed.
    #[error("import failed: {0}")]
    Import(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("object error: {0}")]
    Object(#[from] ObjectError),

    /// A thread panicked while holding a pool lock.
    #[error("pool lock poisoned")]
    LockPoisoned,
}

/// Result alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// An [`Object`] the pool refused to take ownership of.
///
/// Returned by [`ObjectPool::insert`](crate::ObjectPool::insert) and
/// [`ObjectPool::import`](crate::ObjectPool::import) so the caller keeps the
/// object when the operation fails.
#[derive(Debug, thiserror::Error)]
#[error("object rejected: {reason}")]
pub struct Rejected {
    pub object: Object,
    #[source]
    pub reason: PoolError,
}

impl Rejected {
    pub fn new(object: Object, reason: impl Into<PoolError>) -> Self {
        Self {
            object,
            reason: reason.into(),
        }
    }

    pub fn into_object(self) -> Object {
        self.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_keeps_object_and_reason() {
        let mut object = Object::new();
        object.set_attribute_string(chaps_types::attributes::CKA_LABEL, "kept");
        let rejected = Rejected::new(object.clone(), PoolError::NoStore);
        assert_eq!(rejected.to_string(), "object rejected: no persistent store attached");
        assert!(matches!(rejected.reason, PoolError::NoStore));
        assert_eq!(rejected.into_object(), object);
    }

    #[test]
    fn store_errors_convert() {
        let err: PoolError = StoreError::KeyNotSet.into();
        assert!(matches!(err, PoolError::Store(StoreError::KeyNotSet)));
        assert_eq!(err.to_string(), "store error: store encryption key has not been set");
    }
}
