//! Cryptographic primitives for the Chaps object store.
//!
//! Private object blobs are protected with a MAC-then-encrypt construction:
//! the plaintext is authenticated with HMAC-SHA512, the tag is appended, and
//! the result is encrypted with AES-256-CBC under a fresh random IV which is
//! appended after the ciphertext.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod cipher;
pub mod error;
pub mod mac;

pub use cipher::{BlobCipher, IV_SIZE, KEY_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use mac::{hmac_sha512, verify_hmac_sha512, MAC_SIZE};
