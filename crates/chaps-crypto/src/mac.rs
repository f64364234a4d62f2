use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::{CryptoError, CryptoResult};

/// Size of an HMAC-SHA512 tag in bytes.
pub const MAC_SIZE: usize = 64;

type HmacSha512 = Hmac<Sha512>;

fn keyed(key: &[u8]) -> CryptoResult<HmacSha512> {
    // HMAC accepts keys of any length; the error arm is unreachable in practice.
    HmacSha512::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: MAC_SIZE,
        actual: key.len(),
    })
}

/// Compute HMAC-SHA512 of `input` under `key`.
pub fn hmac_sha512(input: &[u8], key: &[u8]) -> CryptoResult<[u8; MAC_SIZE]> {
    let mut mac = keyed(key)?;
    mac.update(input);
    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Verify an HMAC-SHA512 tag in constant time.
pub fn verify_hmac_sha512(input: &[u8], key: &[u8], tag: &[u8]) -> CryptoResult<bool> {
    let mut mac = keyed(key)?;
    mac.update(input);
    Ok(mac.verify_slice(tag).is_ok())
}
