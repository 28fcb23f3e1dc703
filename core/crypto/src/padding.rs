//! PKCS#7 padding and the two unpadding policies.
//!
//! `Strict` is standard PKCS#7 validation. `Tolerant` removes well-formed
//! padding the same way but does not reject final blocks produced by peers
//! that pad with zeros or with inconsistent bytes; such blocks are returned
//! whole.
//!
//! This is deliberately looser than OpenSSL-style lenient decryption, which
//! only accepts a zero last byte and still fails when the last byte exceeds
//! the block size or the padding bytes differ. `Tolerant` keeps the block in
//! both of those cases too, so a decrypt never fails on padding alone.

use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};
use tracing::warn;

use cipherflow_common::{Error, Result};

/// Unpadding policy applied to the final decrypted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    #[default]
    Strict,
    Tolerant,
}

/// Pad `pending` (shorter than one block) up to a full block.
///
/// An empty `pending` gains a whole block of padding.
pub fn pad(pending: &mut Vec<u8>, block_size: usize) {
    debug_assert!(pending.len() < block_size);
    let n = block_size - pending.len();
    pending.resize(block_size, n as u8);
}

/// Number of plaintext bytes to keep from the decrypted final `block`.
///
/// # Errors
/// - `InvalidBlockLength` if `block` is empty
/// - `BadPadding` under `Strict` when the padding is not well formed
pub fn unpadded_len(block: &[u8], mode: PaddingMode) -> Result<usize> {
    let block_size = block.len();
    let last = *block.last().ok_or(Error::InvalidBlockLength(0))?;

    match (strict_len(block, last), mode) {
        (Some(len), _) => Ok(len),
        (None, PaddingMode::Strict) => Err(Error::BadPadding),
        (None, PaddingMode::Tolerant) => {
            if last != 0 {
                warn!(
                    block_size,
                    last_byte = last,
                    "Inconsistent padding tolerated, keeping full final block"
                );
            }
            Ok(block_size)
        }
    }
}

/// Check that no unaligned bytes remain when padding is disabled.
///
/// # Errors
/// - `InvalidBlockLength` if `pending` bytes are still buffered
pub fn check_unpadded(pending: usize) -> Result<()> {
    if pending != 0 {
        return Err(Error::InvalidBlockLength(pending));
    }
    Ok(())
}

/// Plaintext length for well-formed PKCS#7 padding, `None` otherwise.
///
/// The padding bytes are compared in constant time.
fn strict_len(block: &[u8], last: u8) -> Option<usize> {
    let n = last as usize;
    let mut valid = Choice::from((n >= 1 && n <= block.len()) as u8);
    for (i, byte) in block.iter().rev().enumerate() {
        let in_padding = Choice::from((i < n) as u8);
        valid &= !in_padding | byte.ct_eq(&last);
    }

    if bool::from(valid) {
        Some(block.len() - n)
    } else {
        None
    }
}
