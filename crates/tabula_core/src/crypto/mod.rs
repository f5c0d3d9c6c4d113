//! Record encryption at rest.
//!
//! Records are sealed with AES-256-GCM. The key is derived from a
//! passphrase with HMAC-SHA-512/256, so the same passphrase always opens
//! the same directory. Every seal draws a fresh random nonce, which is
//! stored in front of the ciphertext:
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! Encryption is optional and must be enabled via the `encryption` feature.

#[cfg(feature = "encryption")]
mod cipher;

#[cfg(feature = "encryption")]
pub use cipher::*;

/// Module contents when encryption feature is disabled.
#[cfg(not(feature = "encryption"))]
mod stub {
    use crate::error::{CoreError, CoreResult};

    /// Encryption key (stub when encryption disabled).
    #[derive(Debug, Clone)]
    pub struct EncryptionKey {
        _private: (),
    }

    impl EncryptionKey {
        /// Always returns an error when encryption is disabled.
        pub fn derive_from_passphrase(_passphrase: &str) -> CoreResult<Self> {
            Err(CoreError::encryption_not_enabled())
        }
    }

    /// Crypto manager (stub when encryption disabled).
    #[derive(Debug)]
    pub struct CryptoManager {
        _private: (),
    }

    impl CryptoManager {
        /// Always returns an error when encryption is disabled.
        pub fn from_passphrase(_passphrase: &str) -> CoreResult<Self> {
            Err(CoreError::encryption_not_enabled())
        }

        /// Always returns an error when encryption is disabled.
        pub fn encrypt(&self, _data: &[u8]) -> CoreResult<Vec<u8>> {
            Err(CoreError::encryption_not_enabled())
        }

        /// Always returns an error when encryption is disabled.
        pub fn decrypt(&self, _data: &[u8]) -> CoreResult<Vec<u8>> {
            Err(CoreError::encryption_not_enabled())
        }
    }
}

#[cfg(not(feature = "encryption"))]
pub use stub::*;
