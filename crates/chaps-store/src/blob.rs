/// Serialized payload of one object, as exchanged with a store.
///
/// `blob` is the plaintext flat attribute list; encryption happens inside the
/// store. `is_private` is the privacy the writer declared. A reader must
/// check it against the parsed object and treat a mismatch as tampering.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectBlob {
    pub blob: Vec<u8>,
    pub is_private: bool,
}

impl ObjectBlob {
    pub fn new(blob: Vec<u8>, is_private: bool) -> Self {
        Self { blob, is_private }
    }

    pub fn public(blob: Vec<u8>) -> Self {
        Self::new(blob, false)
    }

    pub fn private(blob: Vec<u8>) -> Self {
        Self::new(blob, true)
    }
}

impl std::fmt::Debug for ObjectBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBlob")
            .field("len", &self.blob.len())
            .field("is_private", &self.is_private)
            .finish()
    }
}
