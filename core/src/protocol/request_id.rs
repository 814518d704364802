use std::fmt;
use std::str::FromStr;

use arcpsi_party::PartyId;
use serde::{Deserialize, Serialize};

const REQUEST_ID_DOMAIN: &[u8] = b"arcpsi-request-id-v1";

/// Correlation key between a computation request and its engine callback.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(#[serde(with = "hex::serde")] pub [u8; 32]);

impl RequestId {
    /// BLAKE3( domain ‖ requester ‖ timestamp_ns ‖ n ‖ participant_1 ‖ … ‖ participant_n )
    ///
    /// The participant count is hashed so no two participant lists share an
    /// encoding.
    pub fn derive(requester: &PartyId, timestamp_ns: u128, participants: &[PartyId]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(REQUEST_ID_DOMAIN);
        hasher.update(requester.as_bytes());
        hasher.update(&timestamp_ns.to_le_bytes());
        hasher.update(&(participants.len() as u64).to_le_bytes());
        for p in participants {
            hasher.update(p.as_bytes());
        }
        RequestId(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", hex::encode(&self.0[..6]))
    }
}

impl FromStr for RequestId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(RequestId(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(label: &str) -> PartyId {
        PartyId::derive(label.as_bytes())
    }

    #[test]
    fn test_derive_covers_every_input() {
        let (a, b, c) = (party("a"), party("b"), party("c"));
        let base = RequestId::derive(&a, 1000, &[a, b]);

        assert_eq!(base, RequestId::derive(&a, 1000, &[a, b]));
        assert_ne!(base, RequestId::derive(&b, 1000, &[a, b]));
        assert_ne!(base, RequestId::derive(&a, 1001, &[a, b]));
        assert_ne!(base, RequestId::derive(&a, 1000, &[b, a]));
        assert_ne!(base, RequestId::derive(&a, 1000, &[a, b, c]));
    }

    #[test]
    fn test_hex_roundtrip() {
        let id = RequestId::derive(&party("a"), 7, &[party("a"), party("b")]);
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
