use arcpsi_cipher::CipherError;
use arcpsi_party::PartyId;
use thiserror::Error;

use crate::engine::EngineError;
use crate::ledger::LedgerError;
use crate::protocol::{RequestId, RequestStatus};

/// Errors surfaced by the caller-facing protocol operations.
#[derive(Debug, Error)]
pub enum PsiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("participant {0} has no submitted set")]
    ParticipantMissingSet(PartyId),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("verification failed for request {request_id}: {reason}")]
    Verification { request_id: RequestId, reason: String },

    #[error("duplicate callback for request {request_id} (status {status:?})")]
    DuplicateCallback {
        request_id: RequestId,
        status: RequestStatus,
    },

    /// A stored record failed to decode or carries the wrong schema.
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Ledger failure, propagated unmodified.
    #[error(transparent)]
    BackingStore(LedgerError),

    #[error("compute engine: {0}")]
    Engine(#[from] EngineError),

    #[error("cipher: {0}")]
    Cipher(#[from] CipherError),
}

impl From<LedgerError> for PsiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Codec { key, reason } => PsiError::CorruptRecord { key, reason },
            other => PsiError::BackingStore(other),
        }
    }
}

impl PsiError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        PsiError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for rejections that happen before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PsiError::Validation(_) | PsiError::ParticipantMissingSet(_)
        )
    }
}
