use openssl::symm::{Cipher, Crypter, Mode};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::mac::{hmac_sha512, verify_hmac_sha512, MAC_SIZE};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AES block and IV size in bytes.
pub const IV_SIZE: usize = 16;

/// MAC-then-encrypt engine for object blobs.
///
/// Output layout of [`encrypt`](Self::encrypt):
/// ```text
/// AES-256-CBC(key, iv, plaintext || HMAC-SHA512(key, plaintext)) || iv
/// ```
/// The IV trails the ciphertext. This layout is what existing stores hold on
/// disk and must be reproduced exactly.
pub struct BlobCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl BlobCipher {
    /// Create a cipher from raw key bytes. The key must be exactly 32 bytes.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key.len(),
            });
        }
        let mut owned = Zeroizing::new([0u8; KEY_SIZE]);
        owned.copy_from_slice(key);
        Ok(Self { key: owned })
    }

    /// Authenticate and encrypt `plaintext` under a fresh random IV.
    ///
    /// Encrypting the same plaintext twice yields different outputs.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let tag = hmac_sha512(plaintext, self.key.as_slice())?;
        let mut maced = Zeroizing::new(Vec::with_capacity(plaintext.len() + MAC_SIZE));
        maced.extend_from_slice(plaintext);
        maced.extend_from_slice(&tag);

        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut output = run_cipher(Mode::Encrypt, self.key.as_slice(), &iv, &maced)?;
        output.extend_from_slice(&iv);
        Ok(output)
    }

    /// Decrypt and verify the output of [`encrypt`](Self::encrypt).
    ///
    /// Fails closed: no plaintext is returned unless the MAC verifies.
    pub fn decrypt(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        if input.len() < IV_SIZE {
            return Err(CryptoError::InputTooShort {
                minimum: IV_SIZE,
                actual: input.len(),
            });
        }
        let (ciphertext, iv) = input.split_at(input.len() - IV_SIZE);
        let maced = Zeroizing::new(run_cipher(
            Mode::Decrypt,
            self.key.as_slice(),
            iv,
            ciphertext,
        )?);
        if maced.len() < MAC_SIZE {
            return Err(CryptoError::InputTooShort {
                minimum: MAC_SIZE,
                actual: maced.len(),
            });
        }
        let (plaintext, tag) = maced.split_at(maced.len() - MAC_SIZE);
        if !verify_hmac_sha512(plaintext, self.key.as_slice(), tag)? {
            return Err(CryptoError::IntegrityCheckFailed);
        }
        Ok(plaintext.to_vec())
    }
}

impl std::fmt::Debug for BlobCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobCipher").finish_non_exhaustive()
    }
}

/// One AES-256-CBC pass with PKCS#7 padding, on a context local to the call.
fn run_cipher(mode: Mode, key: &[u8], iv: &[u8], input: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, mode, key, Some(iv))
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;
    crypter.pad(true);

    let mut output = vec![0u8; input.len() + cipher.block_size()];
    let mut written = crypter
        .update(input, &mut output)
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;
    written += crypter
        .finalize(&mut output[written..])
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;
    output.truncate(written);
    Ok(output)
}
