use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity of a party that owns datasets and requests computations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(#[serde(with = "hex::serde")] pub [u8; 32]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartyIdError {
    #[error("party id must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("party id is not valid hex")]
    InvalidHex,
}

impl PartyId {
    /// Deterministically derives an identity from a public label.
    /// Formula: SHA256( "arcpsi-party-v1" || label )
    pub fn derive(label: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"arcpsi-party-v1");
        hasher.update(label);
        PartyId(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.short())
    }
}

impl FromStr for PartyId {
    type Err = PartyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(PartyIdError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| PartyIdError::InvalidHex)?;
        Ok(PartyId(bytes))
    }
}

impl From<[u8; 32]> for PartyId {
    fn from(bytes: [u8; 32]) -> Self {
        PartyId(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(PartyId::derive(b"alice"), PartyId::derive(b"alice"));
        assert_ne!(PartyId::derive(b"alice"), PartyId::derive(b"bob"));
    }

    #[test]
    fn hex_parse_accepts_display_output() {
        let id = PartyId::derive(b"carol");
        let parsed: PartyId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let prefixed: PartyId = format!("0x{}", id).parse().unwrap();
        assert_eq!(prefixed, id);
    }

    #[test]
    fn hex_parse_rejects_bad_input() {
        assert_eq!(
            "abcd".parse::<PartyId>(),
            Err(PartyIdError::InvalidLength(4))
        );
        let bad = "zz".repeat(32);
        assert_eq!(bad.parse::<PartyId>(), Err(PartyIdError::InvalidHex));
    }
}
