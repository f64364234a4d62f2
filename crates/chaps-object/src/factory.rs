//! Seams through which the pool obtains new objects and handles.

use std::sync::atomic::{AtomicU64, Ordering};

use chaps_types::Handle;

use crate::object::Object;

/// Constructs empty objects for deserialization.
pub trait ChapsFactory: Send + Sync {
    fn create_object(&self) -> Object;
}

/// Factory producing plain [`Object`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChapsFactory;

impl ChapsFactory for DefaultChapsFactory {
    fn create_object(&self) -> Object {
        Object::new()
    }
}

/// Issues process-unique object handles.
pub trait HandleGenerator: Send + Sync {
    fn create_handle(&self) -> Handle;
}

/// Counter-based generator. The first handle is 1; 0 is never issued.
#[derive(Debug)]
pub struct SequentialHandleGenerator {
    next: AtomicU64,
}

impl SequentialHandleGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialHandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleGenerator for SequentialHandleGenerator {
    fn create_handle(&self) -> Handle {
        Handle::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
