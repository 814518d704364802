//! Payload encoding.
//!
//! Every stored value is the 32-byte writer id followed by the payload.
//! Records are JSON envelopes tagged with a schema name so a reader can
//! reject a payload written for another record type or version. Index
//! lists are wincode-encoded `Vec<String>`.

use arcpsi_party::PartyId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{LedgerEntry, LedgerError};

const WRITER_LEN: usize = 32;

/// A typed ledger record.
pub trait Record: Serialize + DeserializeOwned {
    /// Schema tag written into every envelope, e.g. `"psi_request/v1"`.
    const SCHEMA: &'static str;
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    schema: &'a str,
    body: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    schema: String,
    body: serde_json::Value,
}

fn codec_err(key: &str, reason: impl ToString) -> LedgerError {
    LedgerError::Codec {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn encode_record<T: Record>(key: &str, record: &T) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(&EnvelopeOut {
        schema: T::SCHEMA,
        body: record,
    })
    .map_err(|e| codec_err(key, e))
}

pub fn decode_record<T: Record>(key: &str, bytes: &[u8]) -> Result<T, LedgerError> {
    let envelope: EnvelopeIn = serde_json::from_slice(bytes).map_err(|e| codec_err(key, e))?;
    if envelope.schema != T::SCHEMA {
        return Err(codec_err(
            key,
            format!("expected schema {}, found {}", T::SCHEMA, envelope.schema),
        ));
    }
    serde_json::from_value(envelope.body).map_err(|e| codec_err(key, e))
}

pub fn encode_index(key: &str, members: &Vec<String>) -> Result<Vec<u8>, LedgerError> {
    wincode::serialize(members).map_err(|e| codec_err(key, e))
}

pub fn decode_index(key: &str, bytes: &[u8]) -> Result<Vec<String>, LedgerError> {
    wincode::deserialize::<Vec<String>>(bytes).map_err(|e| codec_err(key, e))
}

pub(crate) fn encode_entry(writer: &PartyId, payload: &[u8]) -> Vec<u8> {
    let mut stored = Vec::with_capacity(WRITER_LEN + payload.len());
    stored.extend_from_slice(writer.as_bytes());
    stored.extend_from_slice(payload);
    stored
}

pub(crate) fn decode_entry(key: &str, mut stored: Vec<u8>) -> Result<LedgerEntry, LedgerError> {
    if stored.len() < WRITER_LEN {
        return Err(codec_err(
            key,
            format!("entry is {} bytes, shorter than its writer id", stored.len()),
        ));
    }
    let payload = stored.split_off(WRITER_LEN);
    let writer: [u8; WRITER_LEN] = stored
        .try_into()
        .map_err(|_| codec_err(key, "writer id truncated"))?;

    Ok(LedgerEntry {
        key: key.to_string(),
        payload,
        writer: PartyId::from(writer),
    })
}
