use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::CipherError;

pub const TAG_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const MAC_LEN: usize = 16;

/// Opaque reference to one encrypted element.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CiphertextHandle(Vec<u8>);

impl CiphertextHandle {
    /// Wraps raw handle bytes after a length check.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CipherError> {
        if bytes.len() < TAG_LEN + NONCE_LEN + MAC_LEN {
            return Err(CipherError::MalformedHandle(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub(crate) fn assemble(tag: [u8; TAG_LEN], nonce: [u8; NONCE_LEN], body: Vec<u8>) -> Self {
        let mut bytes = Vec::with_capacity(TAG_LEN + NONCE_LEN + body.len());
        bytes.extend_from_slice(&tag);
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&body);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Equality tag. Two handles encrypt the same element under the same
    /// domain key iff their tags are equal.
    pub fn match_tag(&self) -> [u8; TAG_LEN] {
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&self.0[..TAG_LEN]);
        tag
    }

    pub(crate) fn nonce(&self) -> &[u8] {
        &self.0[TAG_LEN..TAG_LEN + NONCE_LEN]
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.0[TAG_LEN + NONCE_LEN..]
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CiphertextHandle(tag={}, {} bytes)",
            hex::encode(&self.0[..4]),
            self.0.len()
        )
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex::serde::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = hex::serde::deserialize(deserializer)?;
        Self::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}
