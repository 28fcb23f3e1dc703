//! Encoding-aware cipher stream.
//!
//! `CipherStream` layers textual input/output on top of [`StreamCipher`].
//! Chunk boundaries rarely line up with encoding units, so three carry
//! buffers hold the incomplete tail of each kind until the next call:
//!
//! - `input_carry`: hex digits or base64 characters that do not yet form a
//!   whole unit (2 digits, 4 characters)
//! - `output_carry`: ciphertext/plaintext bytes beyond the last multiple of 3,
//!   waiting to be base64 encoded
//! - `utf8_carry`: the start of a multi-byte UTF-8 sequence cut off by the
//!   chunk boundary
//!
//! # Lifecycle
//! Same as `StreamCipher`: `init`/`init_with_iv`, any number of `update`
//! calls, one `finalize`. Carry buffers start empty at init and are flushed
//! or discarded at finalize.

use tracing::{debug, trace, warn};

use cipherflow_common::{Direction, Encoding, Error, Result};

use crate::carry::CarryBuffer;
use crate::codec::{self, BASE64_RAW_UNIT, BASE64_TEXT_UNIT, HEX_TEXT_UNIT};
use crate::padding::PaddingMode;
use crate::registry::CipherInfo;
use crate::stream::StreamCipher;

/// Cipher stream with encoded input and output.
#[derive(Debug)]
pub struct CipherStream {
    cipher: StreamCipher,
    input_carry: CarryBuffer,
    output_carry: CarryBuffer,
    utf8_carry: CarryBuffer,
}

impl CipherStream {
    /// Create an uninitialized stream for `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            cipher: StreamCipher::new(direction),
            input_carry: CarryBuffer::new(),
            output_carry: CarryBuffer::new(),
            utf8_carry: CarryBuffer::new(),
        }
    }

    /// Create an encrypting stream keyed from `password`.
    ///
    /// # Errors
    /// - `UnknownAlgorithm`, `InvalidKeyLength` as for [`StreamCipher::init`]
    pub fn encrypt(algorithm: &str, password: &[u8]) -> Result<Self> {
        let mut stream = Self::new(Direction::Encrypt);
        stream.init(algorithm, password)?;
        Ok(stream)
    }

    /// Create a decrypting stream keyed from `password`.
    ///
    /// # Errors
    /// - `UnknownAlgorithm`, `InvalidKeyLength` as for [`StreamCipher::init`]
    pub fn decrypt(algorithm: &str, password: &[u8]) -> Result<Self> {
        let mut stream = Self::new(Direction::Decrypt);
        stream.init(algorithm, password)?;
        Ok(stream)
    }

    /// Initialize with a password; key and IV come from the legacy KDF.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not recognized
    /// - `InvalidKeyLength` if the derived key is rejected
    pub fn init(&mut self, algorithm: &str, password: &[u8]) -> Result<()> {
        self.reset_carries();
        self.cipher.init(algorithm, password)
    }

    /// Initialize with an explicit key and IV.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if `algorithm` is not recognized
    /// - `InvalidIvLength` if the IV length does not match the algorithm
    /// - `InvalidKeyLength` if the key length is rejected
    pub fn init_with_iv(&mut self, algorithm: &str, key: &[u8], iv: &[u8]) -> Result<()> {
        self.reset_carries();
        self.cipher.init_with_iv(algorithm, key, iv)
    }

    /// Enable or disable PKCS#7 padding. Enabled by default.
    ///
    /// # Errors
    /// - `NotInitialized` outside the initialized state
    pub fn set_auto_padding(&mut self, enabled: bool) -> Result<()> {
        self.cipher.set_auto_padding(enabled)
    }

    /// Transform one chunk.
    ///
    /// `input` is decoded according to `input_encoding`, run through the
    /// cipher, and the result is encoded according to `output_encoding`.
    /// Incomplete encoding units on either side are carried to the next
    /// call. For textual output encodings the returned bytes are valid UTF-8.
    ///
    /// # Errors
    /// - `NotInitialized` before init or after finalize
    /// - `BadEncoding` if an encoding is not valid for this direction
    /// - `MalformedInput` if hex/base64 input cannot be decoded; the input
    ///   carry is left as it was before the call
    pub fn update(
        &mut self,
        input: &[u8],
        input_encoding: Encoding,
        output_encoding: Encoding,
    ) -> Result<Vec<u8>> {
        self.check_encodings(Some(input_encoding), output_encoding)?;
        if !self.cipher.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let decoded = decode_chunk(&mut self.input_carry, input, input_encoding)?;
        let raw = self.cipher.update(&decoded)?;
        let output = self.encode_output(raw, output_encoding);

        trace!(
            input_len = input.len(),
            output_len = output.len(),
            input_carry = self.input_carry.len(),
            output_carry = self.output_carry.len(),
            utf8_carry = self.utf8_carry.len(),
            "Cipher stream update"
        );

        Ok(output)
    }

    /// `update` over string input, returning textual output.
    ///
    /// # Errors
    /// - `BadEncoding` if `output_encoding` is `Binary`
    /// - Everything `update` returns
    pub fn update_str(
        &mut self,
        input: &str,
        input_encoding: Encoding,
        output_encoding: Encoding,
    ) -> Result<String> {
        require_textual(output_encoding)?;
        let output = self.update(input.as_bytes(), input_encoding, output_encoding)?;
        into_string(output)
    }

    /// Flush the cipher and close the stream.
    ///
    /// Pending output carry is emitted as terminal output: base64 gets its
    /// padding, an incomplete UTF-8 tail is replaced with U+FFFD. Input
    /// carry left over from a truncated hex/base64 input is discarded.
    ///
    /// # Errors
    /// - `BadEncoding` if `output_encoding` is not valid for this direction;
    ///   the stream stays open in that case
    /// - `NotInitialized` before init or on a second call
    /// - `InvalidBlockLength`, `BadPadding` as for [`StreamCipher::finalize`]
    pub fn finalize(&mut self, output_encoding: Encoding, mode: PaddingMode) -> Result<Vec<u8>> {
        self.check_encodings(None, output_encoding)?;

        let raw = match self.cipher.finalize(mode) {
            Ok(raw) => raw,
            Err(e) => {
                self.reset_carries();
                return Err(e);
            }
        };

        if !self.input_carry.is_empty() {
            warn!(
                pending = self.input_carry.len(),
                "Discarding incomplete encoded input at finalize"
            );
            self.input_carry.clear();
        }

        let data = self.take_output_carries(raw);
        let output = encode_terminal(&data, output_encoding);
        debug!(output_len = output.len(), encoding = %output_encoding, "Cipher stream closed");
        Ok(output)
    }

    /// `finalize` returning textual output.
    ///
    /// # Errors
    /// - `BadEncoding` if `output_encoding` is `Binary`
    /// - Everything `finalize` returns
    pub fn finalize_str(&mut self, output_encoding: Encoding, mode: PaddingMode) -> Result<String> {
        require_textual(output_encoding)?;
        let output = self.finalize(output_encoding, mode)?;
        into_string(output)
    }

    pub fn is_initialized(&self) -> bool {
        self.cipher.is_initialized()
    }

    pub fn direction(&self) -> Direction {
        self.cipher.direction()
    }

    /// Descriptor of the active algorithm, if initialized.
    pub fn algorithm(&self) -> Option<&'static CipherInfo> {
        self.cipher.algorithm()
    }

    /// Reject encodings that make no sense for this direction.
    ///
    /// Plaintext may be UTF-8 text; ciphertext never is.
    fn check_encodings(&self, input: Option<Encoding>, output: Encoding) -> Result<()> {
        let (bad_input, bad_output) = match self.direction() {
            Direction::Encrypt => (false, output == Encoding::Utf8),
            Direction::Decrypt => (input == Some(Encoding::Utf8), false),
        };
        if bad_input {
            return Err(Error::BadEncoding(Encoding::Utf8.to_string()));
        }
        if bad_output {
            return Err(Error::BadEncoding(output.to_string()));
        }
        Ok(())
    }

    /// Encode one update's raw output, deferring incomplete units.
    fn encode_output(&mut self, raw: Vec<u8>, encoding: Encoding) -> Vec<u8> {
        let data = self.take_output_carries(raw);

        match encoding {
            Encoding::Binary => data,
            Encoding::Hex => codec::hex_encode(&data).into_bytes(),
            Encoding::Base64 => {
                let aligned = data.len() - data.len() % BASE64_RAW_UNIT;
                self.output_carry.set(&data[aligned..]);
                codec::base64_encode(&data[..aligned]).into_bytes()
            }
            Encoding::Utf8 => {
                let complete = codec::utf8_valid_prefix_len(&data);
                self.utf8_carry.set(&data[complete..]);
                String::from_utf8_lossy(&data[..complete])
                    .into_owned()
                    .into_bytes()
            }
        }
    }

    /// Prepend whatever output carry is pending, of either kind.
    ///
    /// At most one of the two is non-empty, but both are drained so that a
    /// change of output encoding between calls never drops bytes.
    fn take_output_carries(&mut self, raw: Vec<u8>) -> Vec<u8> {
        if self.output_carry.is_empty() && self.utf8_carry.is_empty() {
            return raw;
        }
        let tail = self.utf8_carry.prepend_to(&raw);
        self.output_carry.prepend_to(&tail)
    }

    fn reset_carries(&mut self) {
        self.input_carry.clear();
        self.output_carry.clear();
        self.utf8_carry.clear();
    }
}

/// Decode one chunk of encoded input.
///
/// Pending characters in `carry` are prepended, and a trailing partial unit
/// (an odd hex digit, fewer than 4 base64 characters) is held back in
/// `carry` for the next call. ASCII whitespace, such as the line breaks of
/// copied hex or base64 text, is skipped. On error `carry` keeps its content
/// from before the call.
///
/// # Errors
/// - `MalformedInput` if the aligned text cannot be decoded
pub(crate) fn decode_chunk(
    carry: &mut CarryBuffer,
    input: &[u8],
    encoding: Encoding,
) -> Result<Vec<u8>> {
    if !encoding.is_unit_coded() {
        return Ok(input.to_vec());
    }

    let carried = carry.len();
    let text = carry.prepend_to(&codec::strip_whitespace(input));
    let unit = match encoding {
        Encoding::Hex => HEX_TEXT_UNIT,
        _ => BASE64_TEXT_UNIT,
    };
    let aligned = text.len() - text.len() % unit;
    let decoded = match encoding {
        Encoding::Hex => codec::hex_decode(&text[..aligned]),
        _ => codec::base64_decode(&text[..aligned]),
    };

    match decoded {
        Ok(bytes) => {
            carry.set(&text[aligned..]);
            Ok(bytes)
        }
        Err(e) => {
            carry.set(&text[..carried]);
            Err(e)
        }
    }
}

/// Encode the last fragment of a stream; nothing is held back.
fn encode_terminal(data: &[u8], encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Binary => data.to_vec(),
        Encoding::Hex => codec::hex_encode(data).into_bytes(),
        Encoding::Base64 => codec::base64_encode(data).into_bytes(),
        Encoding::Utf8 => String::from_utf8_lossy(data).into_owned().into_bytes(),
    }
}

fn require_textual(encoding: Encoding) -> Result<()> {
    if encoding == Encoding::Binary {
        return Err(Error::BadEncoding(encoding.to_string()));
    }
    Ok(())
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::MalformedInput(format!("utf8: {}", e)))
}
