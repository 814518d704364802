//! PSI Node
//!
//! Wires the ledger, registry, coordinator and acceptor together and exposes
//! the caller-facing operations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PsiNode                                │
//! │                                                                  │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌────────────────────┐  │
//! │  │ SetRegistry │  │RequestCoordinator│─▶│  ComputeEngine     │  │
//! │  └──────┬──────┘  └────────┬─────────┘  └─────────┬──────────┘  │
//! │         │                  │                      │ callback    │
//! │         │                  │            ┌─────────▼──────────┐  │
//! │         │                  │            │  ResultAcceptor    │  │
//! │         │                  │            └─────────┬──────────┘  │
//! │         ▼                  ▼                      ▼             │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                        Ledger                            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use arcpsi_cipher::CiphertextHandle;
use arcpsi_party::PartyId;
use log::warn;

use crate::engine::{ProofVerifier, SharedEngine};
use crate::error::PsiError;
use crate::ledger::{Record, SharedLedger, decode_record};
use crate::protocol::records::{REQUEST_INDEX, RESULT_INDEX, request_key, result_key};
use crate::protocol::{
    CompletionHub, EncryptedSet, PsiRequest, PsiResult, RequestCoordinator, RequestId,
    RequestOutcome, RequestStatus, ResultAcceptor, SetId, SetRegistry,
};

pub struct PsiNode {
    ledger: SharedLedger,
    registry: SetRegistry,
    coordinator: RequestCoordinator,
    acceptor: Arc<ResultAcceptor>,
    hub: CompletionHub,
}

impl PsiNode {
    pub fn new(
        ledger: SharedLedger,
        engine: SharedEngine,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        let hub = CompletionHub::new();
        let registry = SetRegistry::new(ledger.clone());
        let coordinator = RequestCoordinator::new(ledger.clone(), registry.clone(), engine);
        let acceptor = Arc::new(ResultAcceptor::new(ledger.clone(), verifier, hub.clone()));

        Self {
            ledger,
            registry,
            coordinator,
            acceptor,
            hub,
        }
    }

    pub fn acceptor(&self) -> Arc<ResultAcceptor> {
        self.acceptor.clone()
    }

    pub fn registry(&self) -> &SetRegistry {
        &self.registry
    }

    pub fn completion_hub(&self) -> &CompletionHub {
        &self.hub
    }

    /// Party that last wrote the ledger entry at `key`.
    pub fn writer_of(&self, key: &str) -> Result<Option<PartyId>, PsiError> {
        Ok(self.ledger.writer_of(key)?)
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    pub fn submit_set(
        &self,
        owner: PartyId,
        handles: Vec<CiphertextHandle>,
    ) -> Result<SetId, PsiError> {
        self.registry.submit_set(owner, handles)
    }

    pub fn list_sets(&self) -> Result<Vec<EncryptedSet>, PsiError> {
        self.registry.list_sets()
    }

    pub fn get_set(&self, id: &str) -> Result<EncryptedSet, PsiError> {
        self.registry.get_set(id)
    }

    pub fn current_set_id(&self, owner: &PartyId) -> Result<Option<SetId>, PsiError> {
        self.registry.get_current_set_id(owner)
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub fn request_computation(
        &self,
        requester: PartyId,
        participants: &[PartyId],
        size_only: bool,
    ) -> Result<RequestId, PsiError> {
        self.coordinator
            .request_computation(requester, participants, size_only)
    }

    pub fn get_request(&self, id: &RequestId) -> Result<PsiRequest, PsiError> {
        self.read_record(&request_key(id))?
            .ok_or_else(|| PsiError::not_found("request", id))
    }

    pub fn list_requests(&self) -> Result<Vec<PsiRequest>, PsiError> {
        self.read_indexed(REQUEST_INDEX, request_key)
    }

    /// Requests still waiting for a callback. Nothing times them out; this
    /// is the hook for an external liveness check.
    pub fn pending_requests(&self) -> Result<Vec<PsiRequest>, PsiError> {
        Ok(self
            .list_requests()?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect())
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    pub fn get_result(&self, id: &RequestId) -> Result<PsiResult, PsiError> {
        self.read_record(&result_key(id))?
            .ok_or_else(|| PsiError::not_found("result", id))
    }

    pub fn list_results(&self) -> Result<Vec<PsiResult>, PsiError> {
        self.read_indexed(RESULT_INDEX, result_key)
    }

    /// Resolves once the request reaches a terminal state.
    pub async fn wait_for_outcome(&self, id: &RequestId) -> Result<RequestOutcome, PsiError> {
        // Subscribe before reading so a commit in between still wakes us.
        let rx = self.hub.subscribe(*id);

        // Already terminal or unknown: nothing will resolve this waiter.
        if let Some(settled) = self.terminal_outcome(id).transpose() {
            drop(rx);
            self.hub.prune(id);
            return settled;
        }

        match rx.await {
            Ok(outcome) => Ok(outcome),
            // Sender dropped without an outcome; fall back to the ledger.
            Err(_) => self
                .terminal_outcome(id)?
                .ok_or_else(|| PsiError::not_found("outcome", id)),
        }
    }

    fn terminal_outcome(&self, id: &RequestId) -> Result<Option<RequestOutcome>, PsiError> {
        let request = self.get_request(id)?;
        Ok(match request.status {
            RequestStatus::Pending => None,
            RequestStatus::Completed => Some(RequestOutcome::Completed(self.get_result(id)?)),
            RequestStatus::Failed => Some(RequestOutcome::Failed {
                reason: request.failure.unwrap_or_default(),
            }),
        })
    }

    fn read_record<T: Record>(&self, key: &str) -> Result<Option<T>, PsiError> {
        match self.ledger.get(key)? {
            Some(bytes) => Ok(Some(decode_record(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Resolve every member of an index, skipping unreadable records.
    fn read_indexed<T: Record>(
        &self,
        index: &str,
        key_for: fn(&RequestId) -> String,
    ) -> Result<Vec<T>, PsiError> {
        let members = self.ledger.index(index)?;
        let mut records = Vec::with_capacity(members.len());

        for member in members {
            let Ok(id) = member.parse::<RequestId>() else {
                warn!("Skipping malformed id {:?} in {}", member, index);
                continue;
            };
            let key = key_for(&id);
            match self.ledger.get(&key)? {
                Some(bytes) => match decode_record::<T>(&key, &bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping unreadable record {}: {}", key, e),
                },
                None => warn!("Skipping indexed {} with no record", key),
            }
        }
        Ok(records)
    }
}
