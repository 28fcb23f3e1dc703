//! Common error types for CipherFlow.

use thiserror::Error;

/// Top-level error type for CipherFlow operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Algorithm name did not resolve to a known cipher, digest or signature scheme.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Key length rejected by the algorithm.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// IV length does not match the algorithm's declared IV length.
    #[error("Invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    /// Final block is not aligned to the cipher's block size.
    #[error("Invalid final block length: {0} bytes pending")]
    InvalidBlockLength(usize),

    /// Strict PKCS#7 padding check failed.
    #[error("Bad padding")]
    BadPadding,

    /// Operation invoked before init or after final.
    #[error("Stream is not initialized")]
    NotInitialized,

    /// Unrecognized or unsupported encoding token.
    #[error("Bad encoding: {0}")]
    BadEncoding(String),

    /// Hex or base64 input could not be decoded.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Key or certificate material could not be parsed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
