//! Streaming cryptographic transforms for CipherFlow.
//!
//! This module provides:
//! - Block and stream ciphers fed chunk by chunk, with hex/base64/UTF-8
//!   input and output that stay correct across arbitrary chunk boundaries
//! - Strict and tolerant PKCS#7 unpadding
//! - Message digests, HMAC, and Ed25519 or RSA sign/verify sharing the
//!   same streaming lifecycle
//! - Legacy password-based key derivation for interoperability
//!
//! # Security Notes
//! - Key material and carried plaintext are zeroized on drop
//! - No plaintext or key material is ever logged
//! - Strict padding checks run in constant time
//! - The password KDF is a single unsalted MD5 round, kept only to read and
//!   write ciphertexts produced by older peers

pub mod adapter;
pub mod carry;
pub mod codec;
pub mod config;
pub mod digest;
mod engine;
pub mod kdf;
pub mod keys;
pub mod padding;
pub mod registry;
pub mod sign;
pub mod stream;
pub mod transform;

pub use adapter::CipherStream;
pub use carry::CarryBuffer;
pub use config::CipherSpec;
pub use digest::{Hash, Hmac};
pub use kdf::bytes_to_key;
pub use keys::KeyMaterial;
pub use padding::PaddingMode;
pub use registry::{resolve_cipher, CipherInfo, CipherMode, DigestAlgorithm};
pub use sign::{SignatureScheme, Signer, Verifier};
pub use stream::StreamCipher;
pub use transform::{Finish, Outcome, Transform, TransformKind};
