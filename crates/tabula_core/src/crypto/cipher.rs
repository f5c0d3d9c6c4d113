//! AES-256-GCM sealing with a passphrase-derived key.

use crate::error::{CoreError, CoreResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512_256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Fixed HMAC key of the passphrase derivation.
const KDF_KEY: &[u8] = b"key";

type HmacSha512_256 = Hmac<Sha512_256>;

/// Encryption key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped for security.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Derives the key for `passphrase`.
    ///
    /// The key is the first 32 bytes of `HMAC-SHA-512/256("key", passphrase)`.
    /// There is no salt: a directory is opened by its passphrase alone.
    pub fn derive_from_passphrase(passphrase: &str) -> CoreResult<Self> {
        let mut mac = <HmacSha512_256 as Mac>::new_from_slice(KDF_KEY)
            .map_err(|_| CoreError::encryption_failed("HMAC key rejected"))?;
        mac.update(passphrase.as_bytes());
        let mut digest = mac.finalize().into_bytes();

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&digest[..KEY_SIZE]);
        digest.as_mut_slice().zeroize();
        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Seals and opens record envelopes.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Creates a crypto manager keyed by `passphrase`.
    pub fn from_passphrase(passphrase: &str) -> CoreResult<Self> {
        Ok(Self::new(EncryptionKey::derive_from_passphrase(passphrase)?))
    }

    /// Seals `plaintext` under a fresh random nonce.
    ///
    /// The output format is: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
    pub fn encrypt(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CoreError::encryption_failed("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Opens data produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailed` if the key is wrong or the data was
    /// truncated or modified.
    pub fn decrypt(&self, sealed: &[u8]) -> CoreResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::decryption_failed(
                "ciphertext shorter than nonce and tag",
            ));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::decryption_failed("wrong key or corrupt data"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_matches_reference_vector() {
        let key = EncryptionKey::derive_from_passphrase("correct horse").unwrap();
        assert_eq!(
            key.as_bytes(),
            &[
                0x53, 0x99, 0x22, 0xcb, 0x3b, 0x1b, 0x5b, 0xc9, 0xe7, 0x64, 0x89, 0xb0, 0x19,
                0x13, 0xe3, 0xdd, 0xe9, 0xfc, 0xd3, 0x80, 0x9a, 0x9c, 0x4d, 0xc8, 0x6f, 0x8b,
                0xa2, 0x63, 0xec, 0x73, 0xf3, 0xdd,
            ]
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = EncryptionKey::derive_from_passphrase("pass").unwrap();
        let b = EncryptionKey::derive_from_passphrase("pass").unwrap();
        let c = EncryptionKey::derive_from_passphrase("Pass").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn seal_and_open() {
        let manager = CryptoManager::from_passphrase("pass").unwrap();
        let sealed = manager.encrypt(b"record bytes").unwrap();

        assert_eq!(sealed.len(), NONCE_SIZE + b"record bytes".len() + TAG_SIZE);
        assert_eq!(manager.decrypt(&sealed).unwrap(), b"record bytes");
    }

    #[test]
    fn nonces_differ() {
        let manager = CryptoManager::from_passphrase("pass").unwrap();
        let a = manager.encrypt(b"same").unwrap();
        let b = manager.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = CryptoManager::from_passphrase("right")
            .unwrap()
            .encrypt(b"secret")
            .unwrap();

        let err = CryptoManager::from_passphrase("wrong")
            .unwrap()
            .decrypt(&sealed)
            .unwrap_err();
        assert!(matches!(err, CoreError::DecryptionFailed { .. }));
    }

    #[test]
    fn tampering_is_detected() {
        let manager = CryptoManager::from_passphrase("pass").unwrap();
        let mut sealed = manager.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(
            manager.decrypt(&sealed),
            Err(CoreError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn short_input_is_rejected() {
        let manager = CryptoManager::from_passphrase("pass").unwrap();
        assert!(matches!(
            manager.decrypt(&[0u8; NONCE_SIZE]),
            Err(CoreError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncryptionKey::derive_from_passphrase("pass").unwrap();
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
