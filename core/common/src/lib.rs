//! Common utilities and types shared across CipherFlow crates.
//!
//! This module provides the error type used by every transform and the
//! small value types (encodings, directions, sensitive buffers) passed
//! between the engine and its callers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Direction, Encoding, SensitiveBytes};
