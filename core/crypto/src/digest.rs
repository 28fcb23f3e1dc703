//! Message digests and keyed digests.
//!
//! `Hash` and `Hmac` accumulate bytes and produce their output once, at
//! `finalize`. They share the cipher stream's lifecycle but need no carry
//! buffers: the single output is encoded in one step.

use std::fmt;

use digest::DynDigest;
use hmac::{Hmac as HmacCore, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

use cipherflow_common::{Encoding, Error, Result};

use crate::codec;
use crate::registry::DigestAlgorithm;

/// Unkeyed message digest.
pub struct Hash {
    algorithm: DigestAlgorithm,
    state: Option<Box<dyn DynDigest + Send>>,
}

impl Hash {
    /// Start a digest.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not a supported digest
    pub fn new(algorithm: &str) -> Result<Self> {
        DigestAlgorithm::resolve(algorithm).map(Self::with_algorithm)
    }

    pub(crate) fn with_algorithm(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            state: Some(hasher(algorithm)),
        }
    }

    /// Absorb more input.
    ///
    /// # Errors
    /// - `NotInitialized` after finalize
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;
        state.update(data);
        Ok(())
    }

    /// Produce the raw digest and close the state.
    ///
    /// # Errors
    /// - `NotInitialized` on a second call
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        let state = self.state.take().ok_or(Error::NotInitialized)?;
        let digest = state.finalize().into_vec();
        debug!(algorithm = %self.algorithm, "Digest finalized");
        Ok(digest)
    }

    /// `finalize`, re-encoded.
    ///
    /// # Errors
    /// - `BadEncoding` for `Utf8`; the state stays open in that case
    /// - `NotInitialized` on a second call
    pub fn finalize_encoded(&mut self, encoding: Encoding) -> Result<Vec<u8>> {
        check_digest_encoding(encoding)?;
        let digest = self.finalize()?;
        codec::encode_once(&digest, encoding)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hash")
            .field("algorithm", &self.algorithm)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Keyed digest (HMAC).
pub struct Hmac {
    algorithm: DigestAlgorithm,
    state: Option<Box<dyn MacEngine>>,
}

impl Hmac {
    /// Start an HMAC keyed with `key`. Any key length is accepted.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not a supported digest
    pub fn new(algorithm: &str, key: &[u8]) -> Result<Self> {
        let algorithm = DigestAlgorithm::resolve(algorithm)?;
        Ok(Self {
            algorithm,
            state: Some(mac(algorithm, key)?),
        })
    }

    /// Absorb more input.
    ///
    /// # Errors
    /// - `NotInitialized` after finalize
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;
        state.absorb(data);
        Ok(())
    }

    /// Produce the raw tag and close the state.
    ///
    /// # Errors
    /// - `NotInitialized` on a second call
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        let state = self.state.take().ok_or(Error::NotInitialized)?;
        let tag = state.tag();
        debug!(algorithm = %self.algorithm, "HMAC finalized");
        Ok(tag)
    }

    /// `finalize`, re-encoded.
    ///
    /// # Errors
    /// - `BadEncoding` for `Utf8`; the state stays open in that case
    /// - `NotInitialized` on a second call
    pub fn finalize_encoded(&mut self, encoding: Encoding) -> Result<Vec<u8>> {
        check_digest_encoding(encoding)?;
        let tag = self.finalize()?;
        codec::encode_once(&tag, encoding)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }
}

impl fmt::Debug for Hmac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hmac")
            .field("algorithm", &self.algorithm)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Digest output is binary; only `Utf8` is refused.
pub(crate) fn check_digest_encoding(encoding: Encoding) -> Result<()> {
    if encoding == Encoding::Utf8 {
        return Err(Error::BadEncoding(encoding.to_string()));
    }
    Ok(())
}

fn hasher(algorithm: DigestAlgorithm) -> Box<dyn DynDigest + Send> {
    match algorithm {
        DigestAlgorithm::Md5 => Box::new(Md5::default()),
        DigestAlgorithm::Sha1 => Box::new(Sha1::default()),
        DigestAlgorithm::Sha224 => Box::new(Sha224::default()),
        DigestAlgorithm::Sha256 => Box::new(Sha256::default()),
        DigestAlgorithm::Sha384 => Box::new(Sha384::default()),
        DigestAlgorithm::Sha512 => Box::new(Sha512::default()),
    }
}

/// Object-safe view of a keyed `Mac` so one `Hmac` type covers every digest.
trait MacEngine: Send {
    fn absorb(&mut self, data: &[u8]);

    fn tag(self: Box<Self>) -> Vec<u8>;
}

impl<M> MacEngine for M
where
    M: Mac + Send,
{
    fn absorb(&mut self, data: &[u8]) {
        Mac::update(self, data);
    }

    fn tag(self: Box<Self>) -> Vec<u8> {
        Mac::finalize(*self).into_bytes().to_vec()
    }
}

fn mac(algorithm: DigestAlgorithm, key: &[u8]) -> Result<Box<dyn MacEngine>> {
    fn keyed<M: Mac + hmac::digest::KeyInit + Send + 'static>(
        key: &[u8],
    ) -> Result<Box<dyn MacEngine>> {
        let mac = <M as hmac::digest::KeyInit>::new_from_slice(key)
            .map_err(|e| Error::InvalidKey(format!("hmac key: {}", e)))?;
        Ok(Box::new(mac))
    }

    match algorithm {
        DigestAlgorithm::Md5 => keyed::<HmacCore<Md5>>(key),
        DigestAlgorithm::Sha1 => keyed::<HmacCore<Sha1>>(key),
        DigestAlgorithm::Sha224 => keyed::<HmacCore<Sha224>>(key),
        DigestAlgorithm::Sha256 => keyed::<HmacCore<Sha256>>(key),
        DigestAlgorithm::Sha384 => keyed::<HmacCore<Sha384>>(key),
        DigestAlgorithm::Sha512 => keyed::<HmacCore<Sha512>>(key),
    }
}
