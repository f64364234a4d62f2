use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer handle naming a live object within one process.
///
/// Handles are issued by a `HandleGenerator` when an object enters a pool and
/// never change afterwards. The zero value is reserved as the invalid handle,
/// matching `CK_INVALID_HANDLE`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// The invalid handle. Objects carry it until they are catalogued.
    pub const INVALID: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`Handle::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Key of an object blob inside a persistent store.
///
/// Store ids are assigned by the store at insert time from a monotonically
/// increasing counter and are never reused, even after the blob is deleted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(u64);

impl StoreId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreId({})", self.0)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StoreId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_is_zero() {
        assert_eq!(Handle::INVALID.get(), 0);
        assert!(!Handle::INVALID.is_valid());
        assert!(Handle::new(7).is_valid());
        assert_eq!(Handle::default(), Handle::INVALID);
    }

    #[test]
    fn store_id_next_increments() {
        let id = StoreId::new(41);
        assert_eq!(id.next(), StoreId::new(42));
        assert!(id < id.next());
    }

    #[test]
    fn display_is_plain_integer() {
        assert_eq!(Handle::new(12).to_string(), "12");
        assert_eq!(StoreId::new(3).to_string(), "3");
        assert_eq!(format!("{:?}", Handle::new(12)), "Handle(12)");
    }

    #[test]
    fn serde_roundtrip() {
        let id = StoreId::new(99);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "99");
        let parsed: StoreId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
