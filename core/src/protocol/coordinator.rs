//! Request Coordinator
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  request_computation                            │
//! │                                                                  │
//! │  validate ─▶ resolve sets ─▶ derive id ─▶ persist ─▶ dispatch   │
//! │  (no side     (owner         (BLAKE3,      (Pending   (engine    │
//! │   effects)     pointers)      unique)       record)    echoes id)│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The request is created before dispatch, so a callback can never arrive
//! for a request the ledger does not know.

use std::collections::HashSet;

use arcpsi_party::PartyId;
use log::{debug, info, warn};

use super::records::{
    PsiRequest, REQUEST_INDEX, RequestStatus, now_millis, request_key,
};
use super::registry::SetRegistry;
use super::RequestId;
use crate::engine::{ComputeJob, SharedEngine};
use crate::error::PsiError;
use crate::ledger::{LedgerBatch, LedgerError, SharedLedger, encode_record};

pub struct RequestCoordinator {
    ledger: SharedLedger,
    registry: SetRegistry,
    engine: SharedEngine,
}

impl RequestCoordinator {
    pub fn new(ledger: SharedLedger, registry: SetRegistry, engine: SharedEngine) -> Self {
        Self {
            ledger,
            registry,
            engine,
        }
    }

    pub fn request_computation(
        &self,
        requester: PartyId,
        participants: &[PartyId],
        size_only: bool,
    ) -> Result<RequestId, PsiError> {
        validate_participants(participants)?;

        // Participant order, then intra-set order
        let mut handles = Vec::new();
        let mut segments = Vec::with_capacity(participants.len());
        for party in participants {
            let set = self
                .registry
                .current_set(party)?
                .ok_or(PsiError::ParticipantMissingSet(*party))?;
            segments.push(set.encrypted_payload.len());
            handles.extend(set.encrypted_payload);
        }

        let (request_id, request) =
            self.persist_pending(requester, participants, size_only, &segments)?;
        let key = request_key(&request_id);

        let handle_count = handles.len();
        let job = ComputeJob {
            request_id,
            handles,
            segments,
            size_only,
        };

        if let Err(e) = self.engine.dispatch(job) {
            warn!("Dispatch of request {} refused: {}", request_id, e);
            let failed = request.into_failed(&format!("dispatch refused: {e}"));
            self.ledger.put(&key, requester, encode_record(&key, &failed)?)?;
            return Err(e.into());
        }

        info!(
            "Request {} dispatched: {} participants, {} handles, size_only={}",
            request_id,
            participants.len(),
            handle_count,
            size_only
        );
        Ok(request_id)
    }

    /// Record the request as Pending under a fresh id. A taken id fails the
    /// create inside the ledger's write lock, so the timestamp is bumped and
    /// the id derived again.
    fn persist_pending(
        &self,
        requester: PartyId,
        participants: &[PartyId],
        size_only: bool,
        segments: &[usize],
    ) -> Result<(RequestId, PsiRequest), PsiError> {
        let mut timestamp_ns = now_nanos();
        loop {
            let request_id = RequestId::derive(&requester, timestamp_ns, participants);
            let key = request_key(&request_id);
            let now = now_millis();
            let request = PsiRequest {
                id: request_id,
                requester,
                participants: participants.to_vec(),
                size_only,
                created_at: now,
                status: RequestStatus::Pending,
                segments: segments.iter().map(|s| *s as u64).collect(),
                failure: None,
                updated_at: now,
            };

            let batch = LedgerBatch::new(requester)
                .create(key.as_str(), encode_record(&key, &request)?)
                .append(REQUEST_INDEX, request_id.to_hex());
            match self.ledger.apply(batch) {
                Ok(()) => return Ok((request_id, request)),
                Err(LedgerError::Conflict(_)) => {
                    debug!("Request id {} taken, bumping timestamp", request_id);
                    timestamp_ns += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn validate_participants(participants: &[PartyId]) -> Result<(), PsiError> {
    if participants.len() < 2 {
        return Err(PsiError::Validation(format!(
            "at least 2 participants required, got {}",
            participants.len()
        )));
    }

    let mut seen = HashSet::with_capacity(participants.len());
    for p in participants {
        if !seen.insert(p) {
            return Err(PsiError::Validation(format!(
                "participant {} listed more than once",
                p.short()
            )));
        }
    }
    Ok(())
}

fn now_nanos() -> u128 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0) as u128
}
