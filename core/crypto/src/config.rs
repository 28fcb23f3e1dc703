//! Cipher stream configuration.
//!
//! A `CipherSpec` names everything needed to open a stream: the algorithm,
//! the direction, and either a password (key and IV derived with the legacy
//! KDF) or an explicit key and IV. Specs round-trip through JSON with the
//! key material hex encoded.

use serde::{Deserialize, Serialize};

use cipherflow_common::{Direction, Error, Result, SensitiveBytes};

use crate::adapter::CipherStream;

/// Parameters for opening a [`CipherStream`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherSpec {
    /// Algorithm name, e.g. `aes-256-cbc`.
    pub algorithm: String,
    pub direction: Direction,
    /// Raw key, or the password when `iv` is absent.
    #[serde(with = "hex_secret")]
    pub key: SensitiveBytes,
    /// Explicit IV. `None` selects password-based derivation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    pub iv: Option<Vec<u8>>,
    /// PKCS#7 padding on block ciphers.
    #[serde(default = "default_padding")]
    pub padding: bool,
}

fn default_padding() -> bool {
    true
}

impl CipherSpec {
    /// Spec keyed from a password.
    pub fn with_password(
        algorithm: impl Into<String>,
        direction: Direction,
        password: &[u8],
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            direction,
            key: SensitiveBytes::from(password),
            iv: None,
            padding: true,
        }
    }

    /// Spec with an explicit key and IV. Pass an empty IV for modes that
    /// take none.
    pub fn with_key_iv(
        algorithm: impl Into<String>,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            direction,
            key: SensitiveBytes::from(key),
            iv: Some(iv.to_vec()),
            padding: true,
        }
    }

    /// Open an initialized stream.
    ///
    /// # Errors
    /// - `UnknownAlgorithm`, `InvalidKeyLength`, `InvalidIvLength` from init
    pub fn open(&self) -> Result<CipherStream> {
        let mut stream = CipherStream::new(self.direction);
        match &self.iv {
            Some(iv) => stream.init_with_iv(&self.algorithm, self.key.as_bytes(), iv)?,
            None => stream.init(&self.algorithm, self.key.as_bytes())?,
        }
        if !self.padding {
            stream.set_auto_padding(false)?;
        }
        Ok(stream)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

mod hex_secret {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    use cipherflow_common::SensitiveBytes;

    pub fn serialize<S: Serializer>(value: &SensitiveBytes, serializer: S) -> Result<S::Ok, S::Error> {
        let text = Zeroizing::new(hex::encode(value.as_bytes()));
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SensitiveBytes, D::Error> {
        let text = Zeroizing::new(String::deserialize(deserializer)?);
        hex::decode(text.as_bytes())
            .map(SensitiveBytes::new)
            .map_err(D::Error::custom)
    }
}

mod hex_opt {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| hex::decode(text).map_err(D::Error::custom))
            .transpose()
    }
}
