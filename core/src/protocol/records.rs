//! Ledger records and the keys they live under.

use arcpsi_cipher::CiphertextHandle;
use arcpsi_party::PartyId;
use serde::{Deserialize, Serialize};

use super::RequestId;
use crate::ledger::Record;

pub type SetId = String;

pub const SET_INDEX: &str = "set_keys";
pub const REQUEST_INDEX: &str = "request_keys";
pub const RESULT_INDEX: &str = "result_keys";

pub fn set_key(id: &str) -> String {
    format!("set_{id}")
}

pub fn owner_key(owner: &PartyId) -> String {
    format!("owner_{}", owner.to_hex())
}

pub fn request_key(id: &RequestId) -> String {
    format!("req_{}", id.to_hex())
}

pub fn result_key(id: &RequestId) -> String {
    format!("result_{}", id.to_hex())
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// A party's encrypted dataset. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSet {
    pub id: SetId,
    pub owner: PartyId,
    pub encrypted_payload: Vec<CiphertextHandle>,
    pub size: u64,
    pub created_at: u64,
}

impl Record for EncryptedSet {
    const SCHEMA: &'static str = "encrypted_set/v1";
}

/// Lifecycle of a computation request. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsiRequest {
    pub id: RequestId,
    pub requester: PartyId,
    pub participants: Vec<PartyId>,
    pub size_only: bool,
    pub created_at: u64,
    pub status: RequestStatus,
    /// Handle count per participant, in participant order.
    pub segments: Vec<u64>,
    /// Set when the request fails.
    #[serde(default)]
    pub failure: Option<String>,
    pub updated_at: u64,
}

impl Record for PsiRequest {
    const SCHEMA: &'static str = "psi_request/v1";
}

impl PsiRequest {
    pub(crate) fn into_failed(mut self, reason: &str) -> Self {
        self.status = RequestStatus::Failed;
        self.failure = Some(reason.to_string());
        self.updated_at = now_millis();
        self
    }

    pub(crate) fn into_completed(mut self) -> Self {
        self.status = RequestStatus::Completed;
        self.updated_at = now_millis();
        self
    }
}

/// Result payload: an intersection size, or the engine's opaque result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultPayload {
    Size(u64),
    Ciphertext(#[serde(with = "hex::serde")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsiResult {
    pub request_id: RequestId,
    pub payload: ResultPayload,
    pub committed_at: u64,
}

impl Record for PsiResult {
    const SCHEMA: &'static str = "psi_result/v1";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{decode_record, encode_record};

    #[test]
    fn test_record_rejects_foreign_schema() {
        let result = PsiResult {
            request_id: RequestId([1u8; 32]),
            payload: ResultPayload::Size(2),
            committed_at: 10,
        };
        let bytes = encode_record("result_x", &result).unwrap();

        let back: PsiResult = decode_record("result_x", &bytes).unwrap();
        assert_eq!(back, result);

        let err = decode_record::<PsiRequest>("result_x", &bytes).unwrap_err();
        assert!(err.to_string().contains("psi_request/v1"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
    }
}
