//! Signing and signature verification.
//!
//! Two schemes are supported. Ed25519 accumulates the message and signs it
//! whole. RSA PKCS#1 v1.5 hashes the message as it streams in, with the
//! digest named by the scheme (`RSA-SHA256`, or a bare `sha256`).
//!
//! Key material is only touched at the end: `Signer::sign` takes a PEM
//! private key (PKCS#8, or PKCS#1 for RSA), `Verifier::verify` takes a PEM
//! public key or certificate. Certificates are only unpacked for their
//! subject public key; no trust validation is done.

use std::fmt;

use ed25519_dalek::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use md5::Md5;
use rsa::pkcs1::{DecodeRsaPrivateKey as _, DecodeRsaPublicKey as _};
use rsa::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::debug;
use x509_parser::pem::{parse_x509_pem, Pem};
use zeroize::Zeroizing;

use cipherflow_common::{Encoding, Error, Result};

use crate::codec;
use crate::digest::{check_digest_encoding, Hash};
use crate::registry::DigestAlgorithm;

const PEM_PRIVATE_KEY: &str = "PRIVATE KEY";
const PEM_RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
const PEM_PUBLIC_KEY: &str = "PUBLIC KEY";
const PEM_RSA_PUBLIC_KEY: &str = "RSA PUBLIC KEY";
const PEM_CERTIFICATE: &str = "CERTIFICATE";

/// Supported signature schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Ed25519,
    /// RSASSA-PKCS1-v1_5 over the given digest.
    RsaPkcs1v15(DigestAlgorithm),
}

impl SignatureScheme {
    /// Resolve a scheme name, case-insensitively.
    ///
    /// `ed25519` selects Ed25519. A digest name, optionally prefixed with
    /// `RSA-` (`RSA-SHA256`, `sha1`), selects RSA PKCS#1 v1.5 with that
    /// digest.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if the name is not recognized
    pub fn resolve(name: &str) -> Result<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered == "ed25519" {
            return Ok(Self::Ed25519);
        }
        let digest = lowered.strip_prefix("rsa-").unwrap_or(&lowered);
        DigestAlgorithm::resolve(digest)
            .map(Self::RsaPkcs1v15)
            .map_err(|_| Error::UnknownAlgorithm(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::RsaPkcs1v15(DigestAlgorithm::Md5) => "rsa-md5",
            Self::RsaPkcs1v15(DigestAlgorithm::Sha1) => "rsa-sha1",
            Self::RsaPkcs1v15(DigestAlgorithm::Sha224) => "rsa-sha224",
            Self::RsaPkcs1v15(DigestAlgorithm::Sha256) => "rsa-sha256",
            Self::RsaPkcs1v15(DigestAlgorithm::Sha384) => "rsa-sha384",
            Self::RsaPkcs1v15(DigestAlgorithm::Sha512) => "rsa-sha512",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What has been absorbed so far.
enum Pending {
    /// Whole message, wiped when the operation ends.
    Message(Zeroizing<Vec<u8>>),
    /// Running digest of the message.
    Digest(Hash),
}

impl Pending {
    fn start(scheme: SignatureScheme) -> Self {
        match scheme {
            SignatureScheme::Ed25519 => Pending::Message(Zeroizing::new(Vec::new())),
            SignatureScheme::RsaPkcs1v15(digest) => Pending::Digest(Hash::with_algorithm(digest)),
        }
    }

    fn absorb(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Pending::Message(message) => {
                message.extend_from_slice(data);
                Ok(())
            }
            Pending::Digest(hash) => hash.update(data),
        }
    }
}

enum PrivateKey {
    Ed25519(SigningKey),
    Rsa(RsaPrivateKey),
}

impl PrivateKey {
    fn sign(&self, pending: Pending) -> Result<Vec<u8>> {
        match (self, pending) {
            (PrivateKey::Ed25519(key), Pending::Message(message)) => {
                Ok(key.sign(&message).to_bytes().to_vec())
            }
            (PrivateKey::Rsa(key), Pending::Digest(mut hash)) => {
                let padding = pkcs1v15(hash.algorithm());
                let hashed = hash.finalize()?;
                key.sign(padding, &hashed)
                    .map_err(|e| Error::InvalidKey(format!("RSA: {}", e)))
            }
            _ => Err(Error::InvalidKey(
                "key does not match the signature scheme".to_string(),
            )),
        }
    }
}

enum PublicKey {
    Ed25519(VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    fn verify(&self, pending: Pending, signature: &[u8]) -> Result<bool> {
        match (self, pending) {
            (PublicKey::Ed25519(key), Pending::Message(message)) => {
                Ok(match Signature::from_slice(signature) {
                    Ok(signature) => key.verify_strict(&message, &signature).is_ok(),
                    Err(_) => false,
                })
            }
            (PublicKey::Rsa(key), Pending::Digest(mut hash)) => {
                let padding = pkcs1v15(hash.algorithm());
                let hashed = hash.finalize()?;
                Ok(key.verify(padding, &hashed, signature).is_ok())
            }
            _ => Err(Error::InvalidKey(
                "key does not match the signature scheme".to_string(),
            )),
        }
    }
}

/// Streaming signer.
pub struct Signer {
    scheme: SignatureScheme,
    pending: Option<Pending>,
}

impl Signer {
    /// Start a signature.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `scheme` is not supported
    pub fn new(scheme: &str) -> Result<Self> {
        let scheme = SignatureScheme::resolve(scheme)?;
        Ok(Self {
            scheme,
            pending: Some(Pending::start(scheme)),
        })
    }

    /// Absorb more of the message.
    ///
    /// # Errors
    /// - `NotInitialized` after a successful `sign`
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        self.pending
            .as_mut()
            .ok_or(Error::NotInitialized)?
            .absorb(data)
    }

    /// Sign the accumulated message and close the state.
    ///
    /// # Errors
    /// - `NotInitialized` on a second call
    /// - `InvalidKey` if the PEM does not hold a private key for this
    ///   scheme; the state stays open so a corrected key can be supplied
    pub fn sign(&mut self, private_key_pem: &[u8]) -> Result<Vec<u8>> {
        if self.pending.is_none() {
            return Err(Error::NotInitialized);
        }
        let key = load_private_key(self.scheme, private_key_pem)?;
        let pending = self.pending.take().ok_or(Error::NotInitialized)?;

        let signature = key.sign(pending)?;
        debug!(scheme = %self.scheme, "Message signed");
        Ok(signature)
    }

    /// `sign`, re-encoded.
    ///
    /// # Errors
    /// - `BadEncoding` for `Utf8`; the state stays open in that case
    /// - Everything `sign` returns
    pub fn sign_encoded(&mut self, private_key_pem: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
        check_digest_encoding(encoding)?;
        let signature = self.sign(private_key_pem)?;
        codec::encode_once(&signature, encoding)
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn is_initialized(&self) -> bool {
        self.pending.is_some()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("scheme", &self.scheme)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Streaming signature verifier.
pub struct Verifier {
    scheme: SignatureScheme,
    pending: Option<Pending>,
}

impl Verifier {
    /// Start a verification.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `scheme` is not supported
    pub fn new(scheme: &str) -> Result<Self> {
        let scheme = SignatureScheme::resolve(scheme)?;
        Ok(Self {
            scheme,
            pending: Some(Pending::start(scheme)),
        })
    }

    /// Absorb more of the message.
    ///
    /// # Errors
    /// - `NotInitialized` after a completed `verify`
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        self.pending
            .as_mut()
            .ok_or(Error::NotInitialized)?
            .absorb(data)
    }

    /// Check `signature` over the accumulated message and close the state.
    ///
    /// `key_pem` may be a `PUBLIC KEY`, an `RSA PUBLIC KEY` (RSA schemes
    /// only) or a `CERTIFICATE`. `signature` is first decoded according to
    /// `signature_encoding`. A signature that is the wrong size or does not
    /// verify yields `Ok(false)`.
    ///
    /// # Errors
    /// - `NotInitialized` on a second call
    /// - `MalformedInput` if the signature text cannot be decoded
    /// - `InvalidKey` if the PEM does not hold a public key for this scheme
    ///
    /// The state stays open on any of these errors except `NotInitialized`.
    pub fn verify(
        &mut self,
        key_pem: &[u8],
        signature: &[u8],
        signature_encoding: Encoding,
    ) -> Result<bool> {
        if self.pending.is_none() {
            return Err(Error::NotInitialized);
        }
        let signature = codec::decode_once(signature, signature_encoding)?;
        let key = load_public_key(self.scheme, key_pem)?;
        let pending = self.pending.take().ok_or(Error::NotInitialized)?;

        let valid = key.verify(pending, &signature)?;
        debug!(scheme = %self.scheme, valid, "Signature checked");
        Ok(valid)
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn is_initialized(&self) -> bool {
        self.pending.is_some()
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("scheme", &self.scheme)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

fn pkcs1v15(digest: DigestAlgorithm) -> Pkcs1v15Sign {
    match digest {
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<Md5>(),
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn read_pem(data: &[u8]) -> Result<Pem> {
    let (_, pem) =
        parse_x509_pem(data).map_err(|e| Error::InvalidKey(format!("PEM: {}", e)))?;
    Ok(pem)
}

fn load_private_key(scheme: SignatureScheme, pem_data: &[u8]) -> Result<PrivateKey> {
    let pem = read_pem(pem_data)?;
    let der = Zeroizing::new(pem.contents);
    match (scheme, pem.label.as_str()) {
        (SignatureScheme::Ed25519, PEM_PRIVATE_KEY) => SigningKey::from_pkcs8_der(&der)
            .map(PrivateKey::Ed25519)
            .map_err(|e| Error::InvalidKey(format!("PKCS#8: {}", e))),
        (SignatureScheme::RsaPkcs1v15(_), PEM_PRIVATE_KEY) => RsaPrivateKey::from_pkcs8_der(&der)
            .map(PrivateKey::Rsa)
            .map_err(|e| Error::InvalidKey(format!("PKCS#8: {}", e))),
        (SignatureScheme::RsaPkcs1v15(_), PEM_RSA_PRIVATE_KEY) => {
            RsaPrivateKey::from_pkcs1_der(&der)
                .map(PrivateKey::Rsa)
                .map_err(|e| Error::InvalidKey(format!("PKCS#1: {}", e)))
        }
        (_, other) => Err(Error::InvalidKey(format!(
            "{} cannot sign with a {} PEM",
            scheme, other
        ))),
    }
}

fn load_public_key(scheme: SignatureScheme, pem_data: &[u8]) -> Result<PublicKey> {
    let pem = read_pem(pem_data)?;
    let spki = match pem.label.as_str() {
        PEM_PUBLIC_KEY => pem.contents.clone(),
        PEM_CERTIFICATE => {
            let cert = pem
                .parse_x509()
                .map_err(|e| Error::InvalidKey(format!("certificate: {}", e)))?;
            cert.public_key().raw.to_vec()
        }
        PEM_RSA_PUBLIC_KEY if matches!(scheme, SignatureScheme::RsaPkcs1v15(_)) => {
            return RsaPublicKey::from_pkcs1_der(&pem.contents)
                .map(PublicKey::Rsa)
                .map_err(|e| Error::InvalidKey(format!("PKCS#1: {}", e)));
        }
        other => {
            return Err(Error::InvalidKey(format!(
                "{} cannot verify with a {} PEM",
                scheme, other
            )))
        }
    };

    match scheme {
        SignatureScheme::Ed25519 => VerifyingKey::from_public_key_der(&spki)
            .map(PublicKey::Ed25519)
            .map_err(|e| Error::InvalidKey(format!("SPKI: {}", e))),
        SignatureScheme::RsaPkcs1v15(_) => RsaPublicKey::from_public_key_der(&spki)
            .map(PublicKey::Rsa)
            .map_err(|e| Error::InvalidKey(format!("SPKI: {}", e))),
    }
}
