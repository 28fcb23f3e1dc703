//! Algorithm resolution by name.
//!
//! Maps the textual names callers use to static descriptors. Lookup is
//! case-insensitive; the table is fixed at compile time.

use std::fmt;

use cipherflow_common::{Error, Result};

/// Block-cipher chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Cbc,
    Ecb,
    /// True stream cipher, no block semantics.
    Stream,
}

/// Concrete cipher implementation selected by a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Ecb,
    Aes192Ecb,
    Aes256Ecb,
    Rc4,
}

/// Static description of a cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherInfo {
    /// Canonical lowercase name.
    pub name: &'static str,
    pub suite: CipherSuite,
    pub mode: CipherMode,
    /// Block size in bytes; 1 for stream ciphers.
    pub block_size: usize,
    /// Accepted key length in bytes.
    pub key_len: usize,
    /// Required IV length in bytes; 0 when the mode takes no IV.
    pub iv_len: usize,
}

impl CipherInfo {
    /// Whether the cipher processes whole blocks (and so pads).
    pub fn is_block_cipher(&self) -> bool {
        self.block_size > 1
    }
}

const fn aes(
    name: &'static str,
    suite: CipherSuite,
    mode: CipherMode,
    key_len: usize,
) -> CipherInfo {
    let iv_len = match mode {
        CipherMode::Cbc => 16,
        _ => 0,
    };
    CipherInfo {
        name,
        suite,
        mode,
        block_size: 16,
        key_len,
        iv_len,
    }
}

static CIPHERS: &[CipherInfo] = &[
    aes("aes-128-cbc", CipherSuite::Aes128Cbc, CipherMode::Cbc, 16),
    aes("aes-192-cbc", CipherSuite::Aes192Cbc, CipherMode::Cbc, 24),
    aes("aes-256-cbc", CipherSuite::Aes256Cbc, CipherMode::Cbc, 32),
    aes("aes-128-ecb", CipherSuite::Aes128Ecb, CipherMode::Ecb, 16),
    aes("aes-192-ecb", CipherSuite::Aes192Ecb, CipherMode::Ecb, 24),
    aes("aes-256-ecb", CipherSuite::Aes256Ecb, CipherMode::Ecb, 32),
    CipherInfo {
        name: "rc4",
        suite: CipherSuite::Rc4,
        mode: CipherMode::Stream,
        block_size: 1,
        key_len: 16,
        iv_len: 0,
    },
];

static CIPHER_ALIASES: &[(&str, &str)] = &[
    ("aes128", "aes-128-cbc"),
    ("aes192", "aes-192-cbc"),
    ("aes256", "aes-256-cbc"),
];

/// Resolve a cipher name to its descriptor.
///
/// # Errors
/// - `UnknownAlgorithm` if the name is not in the table
pub fn resolve_cipher(name: &str) -> Result<&'static CipherInfo> {
    let lowered = name.to_ascii_lowercase();
    let canonical = CIPHER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, target)| *target)
        .unwrap_or(lowered.as_str());

    CIPHERS
        .iter()
        .find(|info| info.name == canonical)
        .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
}

/// Message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve a digest name such as `sha256` or `SHA-256`.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if the name is not recognized
    pub fn resolve(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(Error::UnknownAlgorithm(name.to_string())),
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_cipher_case_insensitive() {
        let info = resolve_cipher("AES-256-CBC").unwrap();
        assert_eq!(info.name, "aes-256-cbc");
        assert_eq!(info.key_len, 32);
        assert_eq!(info.iv_len, 16);
        assert!(info.is_block_cipher());
    }

    #[test]
    fn test_resolve_cipher_alias() {
        assert_eq!(resolve_cipher("aes128").unwrap().suite, CipherSuite::Aes128Cbc);
    }

    #[test]
    fn test_ecb_has_no_iv() {
        assert_eq!(resolve_cipher("aes-192-ecb").unwrap().iv_len, 0);
    }

    #[test]
    fn test_rc4_is_stream_cipher() {
        let info = resolve_cipher("rc4").unwrap();
        assert_eq!(info.mode, CipherMode::Stream);
        assert!(!info.is_block_cipher());
    }

    #[test]
    fn test_resolve_unknown_cipher_fails() {
        assert_eq!(
            resolve_cipher("des-ede3-cbc"),
            Err(Error::UnknownAlgorithm("des-ede3-cbc".to_string()))
        );
    }

    #[test]
    fn test_resolve_digest_spellings() {
        assert_eq!(DigestAlgorithm::resolve("SHA-256").unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::resolve("md5").unwrap().output_len(), 16);
        assert!(DigestAlgorithm::resolve("whirlpool").is_err());
    }
}
