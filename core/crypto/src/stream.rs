//! Raw-byte streaming cipher.
//!
//! `StreamCipher` owns a live cipher context and does the block
//! bookkeeping: buffering partial blocks across `update` calls, padding on
//! encrypt, and holding back the last complete block on decrypt so that
//! padding can be removed at `finalize`. It knows nothing about textual
//! encodings.

use std::fmt;

use tracing::debug;
use zeroize::Zeroize;

use cipherflow_common::{Direction, Error, Result};

use crate::engine::{self, CipherEngine};
use crate::kdf::derive_for_cipher;
use crate::keys::KeyMaterial;
use crate::padding::{self, PaddingMode};
use crate::registry::{resolve_cipher, CipherInfo};

/// Streaming cipher over raw bytes.
///
/// Lifecycle: uninitialized → `init`/`init_with_iv` → `update`* →
/// `finalize` → uninitialized. Any call outside the initialized state fails
/// with `NotInitialized`.
pub struct StreamCipher {
    direction: Direction,
    active: Option<ActiveCipher>,
}

struct ActiveCipher {
    info: &'static CipherInfo,
    engine: Box<dyn CipherEngine>,
    /// Input not yet processed: a partial block, or on padded decrypt the
    /// held-back final block.
    pending: Vec<u8>,
    padding: bool,
}

impl Drop for ActiveCipher {
    fn drop(&mut self) {
        self.pending.zeroize();
    }
}

impl StreamCipher {
    /// Create an uninitialized stream for `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            active: None,
        }
    }

    /// Initialize with a password; key and IV come from the legacy KDF.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not recognized
    /// - `InvalidKeyLength` if the derived key is rejected
    ///
    /// On error the stream is left uninitialized.
    pub fn init(&mut self, algorithm: &str, password: &[u8]) -> Result<()> {
        self.active = None;
        let info = resolve_cipher(algorithm)?;
        let material = derive_for_cipher(password, info);
        self.activate(info, &material)
    }

    /// Initialize with an explicit key and IV.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not recognized
    /// - `InvalidIvLength` if `iv.len()` differs from the algorithm's IV length
    /// - `InvalidKeyLength` if the key length is rejected
    ///
    /// On error the stream is left uninitialized.
    pub fn init_with_iv(&mut self, algorithm: &str, key: &[u8], iv: &[u8]) -> Result<()> {
        self.active = None;
        let info = resolve_cipher(algorithm)?;
        if iv.len() != info.iv_len {
            return Err(Error::InvalidIvLength {
                expected: info.iv_len,
                actual: iv.len(),
            });
        }
        let material = KeyMaterial::new(key, iv);
        self.activate(info, &material)
    }

    fn activate(&mut self, info: &'static CipherInfo, material: &KeyMaterial) -> Result<()> {
        let engine = engine::build(info, self.direction, material)?;
        debug!(
            algorithm = info.name,
            direction = %self.direction,
            "Cipher stream initialized"
        );
        self.active = Some(ActiveCipher {
            info,
            engine,
            pending: Vec::with_capacity(info.block_size),
            padding: true,
        });
        Ok(())
    }

    /// Enable or disable PKCS#7 padding. Enabled by default.
    ///
    /// # Errors
    /// - `NotInitialized` outside the initialized state
    pub fn set_auto_padding(&mut self, enabled: bool) -> Result<()> {
        let active = self.active.as_mut().ok_or(Error::NotInitialized)?;
        active.padding = enabled;
        Ok(())
    }

    /// Feed bytes through the cipher.
    ///
    /// # Postconditions
    /// - Output length is at most `input.len() + block_size`
    /// - Incomplete blocks stay buffered for the next call
    ///
    /// # Errors
    /// - `NotInitialized` before init or after finalize
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let direction = self.direction;
        let active = self.active.as_mut().ok_or(Error::NotInitialized)?;
        active.pending.extend_from_slice(input);

        let block_size = active.info.block_size;
        let total = active.pending.len();
        let mut keep = total % block_size;
        if direction == Direction::Decrypt
            && active.padding
            && active.info.is_block_cipher()
            && keep == 0
            && total > 0
        {
            keep = block_size;
        }

        let mut output: Vec<u8> = active.pending.drain(..total - keep).collect();
        active.engine.apply(&mut output);
        Ok(output)
    }

    /// Flush the cipher and return to the uninitialized state.
    ///
    /// `mode` selects the unpadding policy on decrypt; it is ignored on
    /// encrypt and for stream ciphers. The context is released even when
    /// this returns an error.
    ///
    /// # Errors
    /// - `NotInitialized` before init or on a second call
    /// - `InvalidBlockLength` for a misaligned final block
    /// - `BadPadding` on decrypt under `PaddingMode::Strict`
    pub fn finalize(&mut self, mode: PaddingMode) -> Result<Vec<u8>> {
        let mut active = self.active.take().ok_or(Error::NotInitialized)?;
        let result = active.finish(self.direction, mode);
        debug!(
            algorithm = active.info.name,
            direction = %self.direction,
            ok = result.is_ok(),
            "Cipher stream finalized"
        );
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Descriptor of the active algorithm, if initialized.
    pub fn algorithm(&self) -> Option<&'static CipherInfo> {
        self.active.as_ref().map(|active| active.info)
    }

    /// Block size of the active algorithm, if initialized.
    pub fn block_size(&self) -> Option<usize> {
        self.algorithm().map(|info| info.block_size)
    }
}

impl fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCipher")
            .field("direction", &self.direction)
            .field("algorithm", &self.algorithm().map(|info| info.name))
            .finish()
    }
}

impl ActiveCipher {
    fn finish(&mut self, direction: Direction, mode: PaddingMode) -> Result<Vec<u8>> {
        if !self.info.is_block_cipher() {
            return Ok(Vec::new());
        }
        if !self.padding {
            padding::check_unpadded(self.pending.len())?;
            return Ok(Vec::new());
        }

        let block_size = self.info.block_size;
        let mut block = std::mem::take(&mut self.pending);

        match direction {
            Direction::Encrypt => {
                padding::pad(&mut block, block_size);
                self.engine.apply(&mut block);
                Ok(block)
            }
            Direction::Decrypt => {
                if block.len() != block_size {
                    let pending = block.len();
                    block.zeroize();
                    return Err(Error::InvalidBlockLength(pending));
                }
                self.engine.apply(&mut block);
                match padding::unpadded_len(&block, mode) {
                    Ok(len) => {
                        block.truncate(len);
                        Ok(block)
                    }
                    Err(e) => {
                        block.zeroize();
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_CIPHERS: &[&str] = &[
        "aes-128-cbc",
        "aes-192-cbc",
        "aes-256-cbc",
        "aes-128-ecb",
        "aes-192-ecb",
        "aes-256-ecb",
    ];

    fn run(direction: Direction, algorithm: &str, password: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut stream = StreamCipher::new(direction);
        stream.init(algorithm, password)?;
        let mut out = stream.update(data)?;
        out.extend(stream.finalize(PaddingMode::Strict)?);
        Ok(out)
    }

    #[test]
    fn test_known_answer_password_cbc() {
        // printf 'The quick brown fox' | openssl enc -aes-128-cbc -md md5 -nosalt -pass pass:0123456789abcdef
        let ciphertext = run(
            Direction::Encrypt,
            "aes-128-cbc",
            b"0123456789abcdef",
            b"The quick brown fox",
        )
        .unwrap();
        assert_eq!(
            hex::encode(&ciphertext),
            "bac9e9072d976a0f904a51eb8b84af23f0d556e501fc6c0c76704ecfe8d6baaa"
        );
    }

    #[test]
    fn test_known_answer_explicit_iv() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
            .unwrap();
        let iv = hex::decode("0f0e0d0c0b0a09080706050403020100").unwrap();
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init_with_iv("aes-256-cbc", &key, &iv).unwrap();
        let mut out = stream.update(b"hello world").unwrap();
        out.extend(stream.finalize(PaddingMode::Strict).unwrap());
        assert_eq!(hex::encode(&out), "7e9a97128ef0b4a45935313b08430fda");
    }

    #[test]
    fn test_known_answer_ecb() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init_with_iv("aes-128-ecb", &key, &[]).unwrap();
        let mut out = stream.update(b"hello world").unwrap();
        out.extend(stream.finalize(PaddingMode::Strict).unwrap());
        assert_eq!(hex::encode(&out), "9276fdf384f38518fa6c8310f191678d");
    }

    #[test]
    fn test_known_answer_rc4() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init_with_iv("rc4", &key, &[]).unwrap();
        let out = stream.update(b"hello world").unwrap();
        assert_eq!(hex::encode(&out), "81f92c9528c26ea374b7f3");
        assert!(stream.finalize(PaddingMode::Strict).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_boundary_lengths() {
        for algorithm in BLOCK_CIPHERS.iter().chain(["rc4"].iter()) {
            for len in [0usize, 1, 15, 16, 17] {
                let plaintext: Vec<u8> = (0..len as u8).collect();
                let ciphertext =
                    run(Direction::Encrypt, algorithm, b"password", &plaintext).unwrap();
                let decrypted =
                    run(Direction::Decrypt, algorithm, b"password", &ciphertext).unwrap();
                assert_eq!(decrypted, plaintext, "{} len {}", algorithm, len);
            }
        }
    }

    #[test]
    fn test_ciphertext_is_block_aligned() {
        for len in [0usize, 1, 15, 16, 17] {
            let ciphertext =
                run(Direction::Encrypt, "aes-128-cbc", b"pw", &vec![0u8; len]).unwrap();
            assert_eq!(ciphertext.len(), (len / 16 + 1) * 16);
        }
    }

    #[test]
    fn test_update_output_bounded() {
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        assert!(stream.update(&[1u8; 15]).unwrap().is_empty());
        let out = stream.update(&[1u8; 20]).unwrap();
        assert_eq!(out.len(), 32);
        assert!(out.len() <= 20 + 16);
    }

    #[test]
    fn test_decrypt_holds_back_final_block() {
        let ciphertext = run(Direction::Encrypt, "aes-128-cbc", b"pw", &[9u8; 20]).unwrap();
        assert_eq!(ciphertext.len(), 32);

        let mut stream = StreamCipher::new(Direction::Decrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        let first = stream.update(&ciphertext).unwrap();
        assert_eq!(first.len(), 16);
        let last = stream.finalize(PaddingMode::Strict).unwrap();
        assert_eq!(last.len(), 4);
    }

    #[test]
    fn test_no_padding_misaligned_fails() {
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        stream.set_auto_padding(false).unwrap();
        stream.update(&[0u8; 20]).unwrap();
        assert_eq!(
            stream.finalize(PaddingMode::Strict),
            Err(Error::InvalidBlockLength(4))
        );
        assert!(!stream.is_initialized());
    }

    #[test]
    fn test_no_padding_aligned_roundtrip() {
        let key = [3u8; 16];
        let iv = [4u8; 16];
        let plaintext = [5u8; 32];

        let mut enc = StreamCipher::new(Direction::Encrypt);
        enc.init_with_iv("aes-128-cbc", &key, &iv).unwrap();
        enc.set_auto_padding(false).unwrap();
        let mut ciphertext = enc.update(&plaintext).unwrap();
        ciphertext.extend(enc.finalize(PaddingMode::Strict).unwrap());
        assert_eq!(ciphertext.len(), 32);

        let mut dec = StreamCipher::new(Direction::Decrypt);
        dec.init_with_iv("aes-128-cbc", &key, &iv).unwrap();
        dec.set_auto_padding(false).unwrap();
        let mut decrypted = dec.update(&ciphertext).unwrap();
        assert_eq!(decrypted.len(), 32);
        decrypted.extend(dec.finalize(PaddingMode::Strict).unwrap());
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_strict_and_tolerant_on_corrupted_padding() {
        let key = [1u8; 16];
        let iv = [2u8; 16];
        // Last block ends in 01 02 03: not valid PKCS#7.
        let plaintext = b"0123456789abc\x01\x02\x03";

        let mut enc = StreamCipher::new(Direction::Encrypt);
        enc.init_with_iv("aes-128-cbc", &key, &iv).unwrap();
        enc.set_auto_padding(false).unwrap();
        let ciphertext = enc.update(plaintext).unwrap();
        enc.finalize(PaddingMode::Strict).unwrap();

        let mut strict = StreamCipher::new(Direction::Decrypt);
        strict.init_with_iv("aes-128-cbc", &key, &iv).unwrap();
        assert!(strict.update(&ciphertext).unwrap().is_empty());
        assert_eq!(strict.finalize(PaddingMode::Strict), Err(Error::BadPadding));

        let mut tolerant = StreamCipher::new(Direction::Decrypt);
        tolerant.init_with_iv("aes-128-cbc", &key, &iv).unwrap();
        tolerant.update(&ciphertext).unwrap();
        let recovered = tolerant.finalize(PaddingMode::Tolerant).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_tolerant_strips_valid_padding() {
        let ciphertext = run(Direction::Encrypt, "aes-256-cbc", b"pw", b"interop").unwrap();
        let mut stream = StreamCipher::new(Direction::Decrypt);
        stream.init("aes-256-cbc", b"pw").unwrap();
        let mut out = stream.update(&ciphertext).unwrap();
        out.extend(stream.finalize(PaddingMode::Tolerant).unwrap());
        assert_eq!(out, b"interop");
    }

    #[test]
    fn test_decrypt_truncated_ciphertext_fails() {
        let ciphertext = run(Direction::Encrypt, "aes-128-cbc", b"pw", b"some data").unwrap();
        let mut stream = StreamCipher::new(Direction::Decrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        stream.update(&ciphertext[..10]).unwrap();
        assert_eq!(
            stream.finalize(PaddingMode::Tolerant),
            Err(Error::InvalidBlockLength(10))
        );
    }

    #[test]
    fn test_update_before_init_fails() {
        let mut stream = StreamCipher::new(Direction::Encrypt);
        assert_eq!(stream.update(b"data"), Err(Error::NotInitialized));
        assert_eq!(stream.set_auto_padding(false), Err(Error::NotInitialized));
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        stream.finalize(PaddingMode::Strict).unwrap();
        assert_eq!(stream.finalize(PaddingMode::Strict), Err(Error::NotInitialized));
        assert_eq!(stream.update(b"more"), Err(Error::NotInitialized));
    }

    #[test]
    fn test_unknown_algorithm_leaves_uninitialized() {
        let mut stream = StreamCipher::new(Direction::Decrypt);
        stream.init("aes-128-cbc", b"pw").unwrap();
        assert_eq!(
            stream.init("bogus", b"pw"),
            Err(Error::UnknownAlgorithm("bogus".to_string()))
        );
        assert!(!stream.is_initialized());
        assert!(stream.algorithm().is_none());
        assert_eq!(
            stream.init_with_iv("bogus", &[0u8; 16], &[0u8; 16]),
            Err(Error::UnknownAlgorithm("bogus".to_string()))
        );
        assert!(!stream.is_initialized());
    }

    #[test]
    fn test_invalid_iv_and_key_lengths() {
        let mut stream = StreamCipher::new(Direction::Encrypt);
        assert_eq!(
            stream.init_with_iv("aes-128-cbc", &[0u8; 16], &[0u8; 12]),
            Err(Error::InvalidIvLength {
                expected: 16,
                actual: 12
            })
        );
        assert_eq!(
            stream.init_with_iv("aes-128-cbc", &[0u8; 10], &[0u8; 16]),
            Err(Error::InvalidKeyLength {
                expected: 16,
                actual: 10
            })
        );
        assert!(!stream.is_initialized());
    }

    #[test]
    fn test_chunked_update_matches_single_shot() {
        let plaintext: Vec<u8> = (0..100u8).collect();
        let whole = run(Direction::Encrypt, "aes-192-cbc", b"pw", &plaintext).unwrap();

        let mut stream = StreamCipher::new(Direction::Encrypt);
        stream.init("aes-192-cbc", b"pw").unwrap();
        let mut chunked = Vec::new();
        for chunk in plaintext.chunks(7) {
            chunked.extend(stream.update(chunk).unwrap());
        }
        chunked.extend(stream.finalize(PaddingMode::Strict).unwrap());
        assert_eq!(chunked, whole);
    }
}
