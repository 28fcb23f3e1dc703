//! Legacy password-to-key derivation.
//!
//! Compatible with OpenSSL's `EVP_BytesToKey` using MD5, no salt and a
//! single iteration. This is kept for interoperability with existing
//! ciphertexts only; it is not a password hashing function.

use md5::{Digest, Md5};
use zeroize::Zeroize;

use crate::keys::KeyMaterial;
use crate::registry::CipherInfo;

/// Derive `key_len` bytes of key and `iv_len` bytes of IV from `password`.
///
/// # Postconditions
/// - Deterministic for a given password and lengths
/// - `D_1 = MD5(password)`, `D_i = MD5(D_{i-1} || password)`; the
///   concatenation is split into key then IV
pub fn bytes_to_key(password: &[u8], key_len: usize, iv_len: usize) -> KeyMaterial {
    let needed = key_len + iv_len;
    let mut stream: Vec<u8> = Vec::with_capacity(needed + 16);
    let mut previous: Vec<u8> = Vec::new();

    while stream.len() < needed {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(password);
        let block = hasher.finalize().to_vec();
        stream.extend_from_slice(&block);
        previous = block;
    }

    let material = KeyMaterial::new(&stream[..key_len], &stream[key_len..needed]);
    stream.zeroize();
    previous.zeroize();

    material
}

/// Derive key material sized for `info`.
pub fn derive_for_cipher(password: &[u8], info: &CipherInfo) -> KeyMaterial {
    bytes_to_key(password, info.key_len, info.iv_len)
}
