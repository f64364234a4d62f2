use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifies one of the singleton internal blobs of a store.
///
/// Internal blobs hold key-hierarchy material and bookkeeping markers. They
/// are readable before any encryption key exists and are not encrypted by the
/// store; the values are expected to be protected by a lower layer already.
/// At most one value is stored per id and the last write wins.
///
/// The numeric values are persisted and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum InternalBlobId {
    EncryptedAuthKey = 0,
    EncryptedMasterKey = 1,
    /// Present once the legacy importer has run for this token.
    ImportedTracker = 2,
    LegacyPrivateRootKey = 3,
    LegacyPublicRootKey = 4,
    AuthDataHash = 5,
}

impl InternalBlobId {
    pub const ALL: [Self; 6] = [
        Self::EncryptedAuthKey,
        Self::EncryptedMasterKey,
        Self::ImportedTracker,
        Self::LegacyPrivateRootKey,
        Self::LegacyPublicRootKey,
        Self::AuthDataHash,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::EncryptedAuthKey => "encrypted-auth-key",
            Self::EncryptedMasterKey => "encrypted-master-key",
            Self::ImportedTracker => "imported-tracker",
            Self::LegacyPrivateRootKey => "legacy-private-root-key",
            Self::LegacyPublicRootKey => "legacy-public-root-key",
            Self::AuthDataHash => "auth-data-hash",
        }
    }
}

impl TryFrom<u8> for InternalBlobId {
    type Error = TypeError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_u8() == raw)
            .ok_or(TypeError::UnknownInternalBlobId(raw))
    }
}

impl From<InternalBlobId> for u8 {
    fn from(id: InternalBlobId) -> Self {
        id.as_u8()
    }
}

impl FromStr for InternalBlobId {
    type Err = TypeError;

    /// Accepts either the kebab-case name or the numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<u8>() {
            return Self::try_from(raw);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| TypeError::UnknownInternalBlobName(s.to_string()))
    }
}

impl fmt::Display for InternalBlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(InternalBlobId::EncryptedAuthKey.as_u8(), 0);
        assert_eq!(InternalBlobId::EncryptedMasterKey.as_u8(), 1);
        assert_eq!(InternalBlobId::ImportedTracker.as_u8(), 2);
        assert_eq!(InternalBlobId::LegacyPrivateRootKey.as_u8(), 3);
        assert_eq!(InternalBlobId::LegacyPublicRootKey.as_u8(), 4);
        assert_eq!(InternalBlobId::AuthDataHash.as_u8(), 5);
    }

    #[test]
    fn try_from_rejects_unknown() {
        assert_eq!(
            InternalBlobId::try_from(6),
            Err(TypeError::UnknownInternalBlobId(6))
        );
        for id in InternalBlobId::ALL {
            assert_eq!(InternalBlobId::try_from(id.as_u8()), Ok(id));
        }
    }

    #[test]
    fn parse_by_name_or_number() {
        assert_eq!(
            "imported-tracker".parse::<InternalBlobId>(),
            Ok(InternalBlobId::ImportedTracker)
        );
        assert_eq!("1".parse::<InternalBlobId>(), Ok(InternalBlobId::EncryptedMasterKey));
        assert!("master".parse::<InternalBlobId>().is_err());
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&InternalBlobId::LegacyPublicRootKey).unwrap();
        assert_eq!(json, "4");
        let back: InternalBlobId = serde_json::from_str("4").unwrap();
        assert_eq!(back, InternalBlobId::LegacyPublicRootKey);
        assert!(serde_json::from_str::<InternalBlobId>("9").is_err());
    }
}
