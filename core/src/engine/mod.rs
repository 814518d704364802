//! Compute Engine Boundary
//!
//! The engine is a black box: it takes positional ciphertext handles, runs the
//! intersection, and later calls back with an encrypted result and a proof.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Coordinator ──dispatch(ComputeJob)──▶ Engine                    │
//! │                                          │                       │
//! │                                          ▼ (async, unordered)    │
//! │  Acceptor ◀──EngineCallback{request_id, result, proof}──         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine echoes the caller's `RequestId`; it never mints its own token.

pub mod local;

pub use local::{EngineKey, LocalEngine, LocalEngineConfig, compute};

use std::sync::Arc;

use arcpsi_cipher::CiphertextHandle;
use thiserror::Error;

use crate::protocol::RequestId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("compute engine unavailable")]
    Unavailable,

    #[error("job rejected: {0}")]
    Rejected(String),

    #[error("result codec: {0}")]
    Codec(String),
}

/// One dispatched computation.
#[derive(Debug, Clone)]
pub struct ComputeJob {
    pub request_id: RequestId,
    /// Participant handles concatenated in participant order.
    pub handles: Vec<CiphertextHandle>,
    /// Handle count of each participant's segment.
    pub segments: Vec<usize>,
    pub size_only: bool,
}

/// What the engine eventually reports for a job.
#[derive(Debug, Clone)]
pub enum EngineCallback {
    Completed {
        request_id: RequestId,
        encrypted_result: Vec<u8>,
        proof: Vec<u8>,
    },
    Aborted {
        request_id: RequestId,
        reason: String,
    },
}

impl EngineCallback {
    pub fn request_id(&self) -> &RequestId {
        match self {
            EngineCallback::Completed { request_id, .. } => request_id,
            EngineCallback::Aborted { request_id, .. } => request_id,
        }
    }
}

/// Fire-and-forget dispatch.
pub trait ComputeEngine: Send + Sync {
    fn dispatch(&self, job: ComputeJob) -> Result<(), EngineError>;
}

pub type SharedEngine = Arc<dyn ComputeEngine>;

/// The engine's verification contract.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, request_id: &RequestId, result: &[u8], proof: &[u8]) -> bool;
}

/// Encode intersection handles as a full (non size-only) result.
pub fn encode_intersection(handles: &[CiphertextHandle]) -> Result<Vec<u8>, EngineError> {
    let raw: Vec<Vec<u8>> = handles.iter().map(|h| h.as_bytes().to_vec()).collect();
    wincode::serialize(&raw).map_err(|e| EngineError::Codec(e.to_string()))
}

pub fn decode_intersection(bytes: &[u8]) -> Result<Vec<CiphertextHandle>, EngineError> {
    let raw = wincode::deserialize::<Vec<Vec<u8>>>(bytes)
        .map_err(|e| EngineError::Codec(e.to_string()))?;
    raw.into_iter()
        .map(|b| CiphertextHandle::from_bytes(b).map_err(|e| EngineError::Codec(e.to_string())))
        .collect()
}
