//! Content identities
//!
//! An `Identity` names one piece of content for its whole lifetime. It pairs
//! the creation time (seconds since the Unix epoch) with a random 64-bit value
//! drawn from the operating system's secure random source. Collisions are
//! treated as impossible and never checked.
//!
//! ## Text form
//!
//! `base64url("convind_id_" || epoch (LE, 8 bytes) || random (LE, 8 bytes))`
//!
//! The text form doubles as the content's directory name on disk and as the
//! remainder of `convind://` link destinations, so it must stay stable.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fixed prefix mixed into every encoded identity
const ID_PREFIX: &str = "convind_id_";

/// Minimum decoded length: prefix plus two 64-bit integers
const DECODED_LEN: usize = ID_PREFIX.len() + 8 + 8;

/// Errors returned when decoding the text form of an identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid base64 in identity: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Identity too short: decoded {len} bytes, expected at least {expected}")]
    TooShort { len: usize, expected: usize },

    #[error("Identity prefix does not match expected {expected:?}")]
    PrefixMismatch { expected: &'static str },

    #[error("Identity epoch {0} too large")]
    EpochOverflow(u64),
}

/// Globally unique identifier of one piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    /// Seconds after 1970-01-01 UTC
    pub epoch: i64,
    /// Random component
    pub random: u64,
}

impl Identity {
    /// Generate a fresh identity stamped with the current time
    pub fn generate() -> Self {
        Self {
            epoch: Utc::now().timestamp(),
            random: random_u64(),
        }
    }

    /// Encode to the textual form
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(DECODED_LEN);
        raw.extend_from_slice(ID_PREFIX.as_bytes());
        raw.extend_from_slice(&(self.epoch as u64).to_le_bytes());
        raw.extend_from_slice(&self.random.to_le_bytes());
        URL_SAFE.encode(raw)
    }

    /// Decode the textual form
    ///
    /// Trailing bytes after the two integers are ignored.
    pub fn decode(text: &str) -> Result<Self, IdError> {
        let raw = URL_SAFE.decode(text)?;

        if raw.len() < DECODED_LEN {
            return Err(IdError::TooShort {
                len: raw.len(),
                expected: DECODED_LEN,
            });
        }

        let (prefix, rest) = raw.split_at(ID_PREFIX.len());
        if prefix != ID_PREFIX.as_bytes() {
            return Err(IdError::PrefixMismatch {
                expected: ID_PREFIX,
            });
        }

        let epoch = read_u64_le(&rest[..8]);
        if epoch > i64::MAX as u64 {
            return Err(IdError::EpochOverflow(epoch));
        }
        let random = read_u64_le(&rest[8..16]);

        Ok(Self {
            epoch: epoch as i64,
            random,
        })
    }
}

/// Uniformly random 64-bit value from the OS secure random source
pub(crate) fn random_u64() -> u64 {
    OsRng.next_u64()
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Identity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_raw(prefix: &[u8], epoch: u64, random: u64) -> String {
        let mut raw = prefix.to_vec();
        raw.extend_from_slice(&epoch.to_le_bytes());
        raw.extend_from_slice(&random.to_le_bytes());
        URL_SAFE.encode(raw)
    }

    #[test]
    fn test_generated_round_trip() {
        for _ in 0..64 {
            let id = Identity::generate();
            let decoded = Identity::decode(&id.encode()).unwrap();
            assert_eq!(decoded, id);
        }
    }

    #[test]
    fn test_extreme_values_round_trip() {
        let ids = [
            Identity { epoch: 0, random: 0 },
            Identity {
                epoch: i64::MAX,
                random: u64::MAX,
            },
            Identity {
                epoch: 1_700_000_000,
                random: 42,
            },
        ];
        for id in ids {
            assert_eq!(id.to_string().parse::<Identity>().unwrap(), id);
        }
    }

    #[test]
    fn test_generate_uses_current_time() {
        let before = Utc::now().timestamp();
        let id = Identity::generate();
        let after = Utc::now().timestamp();
        assert!(id.epoch >= before && id.epoch <= after);
    }

    #[test]
    fn test_text_form_is_path_safe() {
        let text = Identity::generate().encode();
        assert!(!text.contains('/'));
        assert!(!text.contains('+'));
        assert!(!text.starts_with('.'));
    }

    #[test]
    fn test_rejects_truncated() {
        let text = Identity::generate().encode();
        let err = Identity::decode(&text[..20]).unwrap_err();
        assert!(matches!(err, IdError::TooShort { len: 15, .. }));
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        let text = encode_raw(b"notvind_id_", 1, 2);
        let err = Identity::decode(&text).unwrap_err();
        assert!(matches!(err, IdError::PrefixMismatch { .. }));
    }

    #[test]
    fn test_rejects_non_base64() {
        let err = Identity::decode("definitely not base64!").unwrap_err();
        assert!(matches!(err, IdError::Base64(_)));
    }

    #[test]
    fn test_rejects_overflowing_epoch() {
        let text = encode_raw(ID_PREFIX.as_bytes(), u64::MAX, 7);
        let err = Identity::decode(&text).unwrap_err();
        assert_eq!(err, IdError::EpochOverflow(u64::MAX));
    }

    #[test]
    fn test_ignores_trailing_bytes() {
        let mut raw = ID_PREFIX.as_bytes().to_vec();
        raw.extend_from_slice(&5u64.to_le_bytes());
        raw.extend_from_slice(&9u64.to_le_bytes());
        raw.extend_from_slice(b"xyz");
        let id = Identity::decode(&URL_SAFE.encode(raw)).unwrap();
        assert_eq!(id, Identity { epoch: 5, random: 9 });
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = Identity::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let parsed: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<Identity>("\"bogus\"").is_err());
    }
}
