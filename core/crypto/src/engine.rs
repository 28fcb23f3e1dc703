//! Live cipher contexts behind a single object-safe seam.

use aes::{Aes128, Aes192, Aes256};
use cipher::{
    generic_array::GenericArray, BlockCipher, BlockDecryptMut, BlockEncryptMut, BlockSizeUser,
    KeyInit, KeyIvInit,
};
use rc4::{consts::U16, Rc4, StreamCipher as _};

use cipherflow_common::{Direction, Error, Result};

use crate::keys::KeyMaterial;
use crate::registry::{CipherInfo, CipherSuite};

/// A keyed cipher context that transforms bytes in place.
pub(crate) trait CipherEngine: Send {
    /// Transform `data` in place.
    ///
    /// Block engines require `data.len()` to be a multiple of the block size.
    fn apply(&mut self, data: &mut [u8]);
}

struct Encrypting<M>(M);

struct Decrypting<M>(M);

struct Keystream(Rc4<U16>);

impl<M> CipherEngine for Encrypting<M>
where
    M: BlockEncryptMut + Send,
{
    fn apply(&mut self, data: &mut [u8]) {
        debug_assert_eq!(data.len() % M::block_size(), 0);
        for block in data.chunks_exact_mut(M::block_size()) {
            self.0.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

impl<M> CipherEngine for Decrypting<M>
where
    M: BlockDecryptMut + Send,
{
    fn apply(&mut self, data: &mut [u8]) {
        debug_assert_eq!(data.len() % M::block_size(), 0);
        for block in data.chunks_exact_mut(M::block_size()) {
            self.0.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

impl CipherEngine for Keystream {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.apply_keystream(data);
    }
}

/// Build a cipher context for `info` keyed with `material`.
///
/// # Errors
/// - `InvalidKeyLength` if the key does not match `info.key_len`
/// - `InvalidIvLength` if the IV does not match `info.iv_len`
pub(crate) fn build(
    info: &CipherInfo,
    direction: Direction,
    material: &KeyMaterial,
) -> Result<Box<dyn CipherEngine>> {
    let key = material.key();
    let iv = material.iv();

    if key.len() != info.key_len {
        return Err(Error::InvalidKeyLength {
            expected: info.key_len,
            actual: key.len(),
        });
    }
    if iv.len() != info.iv_len {
        return Err(Error::InvalidIvLength {
            expected: info.iv_len,
            actual: iv.len(),
        });
    }

    match info.suite {
        CipherSuite::Aes128Cbc => cbc_engine::<Aes128>(direction, key, iv),
        CipherSuite::Aes192Cbc => cbc_engine::<Aes192>(direction, key, iv),
        CipherSuite::Aes256Cbc => cbc_engine::<Aes256>(direction, key, iv),
        CipherSuite::Aes128Ecb => ecb_engine::<Aes128>(direction, key),
        CipherSuite::Aes192Ecb => ecb_engine::<Aes192>(direction, key),
        CipherSuite::Aes256Ecb => ecb_engine::<Aes256>(direction, key),
        CipherSuite::Rc4 => {
            let rc4 = Rc4::<U16>::new_from_slice(key).map_err(|_| key_length_error(info, key))?;
            Ok(Box::new(Keystream(rc4)))
        }
    }
}

fn cbc_engine<C>(direction: Direction, key: &[u8], iv: &[u8]) -> Result<Box<dyn CipherEngine>>
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit + Send + 'static,
{
    let invalid = |_| Error::InvalidKeyLength {
        expected: C::key_size(),
        actual: key.len(),
    };
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(Encrypting(
            cbc::Encryptor::<C>::new_from_slices(key, iv).map_err(invalid)?,
        )),
        Direction::Decrypt => Box::new(Decrypting(
            cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(invalid)?,
        )),
    };
    Ok(engine)
}

fn ecb_engine<C>(direction: Direction, key: &[u8]) -> Result<Box<dyn CipherEngine>>
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit + Send + 'static,
{
    let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeyLength {
        expected: C::key_size(),
        actual: key.len(),
    })?;
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(Encrypting(cipher)),
        Direction::Decrypt => Box::new(Decrypting(cipher)),
    };
    Ok(engine)
}

fn key_length_error(info: &CipherInfo, key: &[u8]) -> Error {
    Error::InvalidKeyLength {
        expected: info.key_len,
        actual: key.len(),
    }
}
