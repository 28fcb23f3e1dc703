//! Key material with secure memory handling.
//!
//! Keys and IVs are zeroized on drop so that a finished or abandoned stream
//! does not leave them behind in memory.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key and IV bytes ready to hand to a cipher context.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl KeyMaterial {
    /// Create key material from raw key and IV bytes.
    ///
    /// Lengths are not checked here; the cipher context rejects
    /// lengths its algorithm does not accept.
    pub fn new(key: &[u8], iv: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            iv: iv.to_vec(),
        }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Get the IV bytes (empty for modes without an IV).
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyMaterial(key: [REDACTED; {}], iv: [REDACTED; {}])",
            self.key.len(),
            self.iv.len()
        )
    }
}
