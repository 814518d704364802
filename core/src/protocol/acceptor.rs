//! Result Acceptor
//!
//! Commits engine callbacks exactly once per request.
//!
//! ```text
//! callback(id, result, proof)
//!   1. load request ............ absent      ─▶ NotFound
//!   2. status == Pending? ...... terminal    ─▶ DuplicateCallback
//!   3. verify proof ............ bad proof   ─▶ Failed + Verification
//!   4. commit result + Completed (one batch) ─▶ wake waiters
//! ```

use std::sync::{Arc, Mutex};

use arcpsi_party::PartyId;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use super::RequestId;
use super::completion::{CompletionHub, RequestOutcome};
use super::records::{
    PsiRequest, PsiResult, RESULT_INDEX, ResultPayload, now_millis, request_key,
    result_key,
};
use crate::engine::{EngineCallback, ProofVerifier};
use crate::error::PsiError;
use crate::ledger::{LedgerBatch, SharedLedger, decode_record, encode_record};

/// Label the acceptor's ledger identity is derived from.
const ACCEPTOR_LABEL: &[u8] = b"arcpsi-result-acceptor";

pub struct ResultAcceptor {
    /// Writer recorded on every entry the acceptor commits.
    identity: PartyId,
    ledger: SharedLedger,
    verifier: Arc<dyn ProofVerifier>,
    hub: CompletionHub,
    /// Serializes the status check with the commit that follows it.
    commit_lock: Mutex<()>,
}

impl ResultAcceptor {
    pub fn new(ledger: SharedLedger, verifier: Arc<dyn ProofVerifier>, hub: CompletionHub) -> Self {
        Self {
            identity: PartyId::derive(ACCEPTOR_LABEL),
            ledger,
            verifier,
            hub,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn identity(&self) -> PartyId {
        self.identity
    }

    pub fn on_computation_callback(
        &self,
        request_id: &RequestId,
        encrypted_result: &[u8],
        proof: &[u8],
    ) -> Result<PsiResult, PsiError> {
        let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());

        let request = self.load_pending(request_id)?;

        if !self.verifier.verify(request_id, encrypted_result, proof) {
            return Err(self.fail(request, "proof verification failed")?);
        }

        let payload = if request.size_only {
            match <[u8; 8]>::try_from(encrypted_result) {
                Ok(raw) => ResultPayload::Size(u64::from_le_bytes(raw)),
                Err(_) => {
                    let reason = format!(
                        "size-only result must be 8 bytes, got {}",
                        encrypted_result.len()
                    );
                    return Err(self.fail(request, &reason)?);
                }
            }
        } else {
            ResultPayload::Ciphertext(encrypted_result.to_vec())
        };

        let result = PsiResult {
            request_id: *request_id,
            payload,
            committed_at: now_millis(),
        };
        let completed = request.into_completed();

        let res_key = result_key(request_id);
        let req_key = request_key(request_id);
        self.ledger.apply(
            LedgerBatch::new(self.identity)
                .put(res_key.as_str(), encode_record(&res_key, &result)?)
                .put(req_key.as_str(), encode_record(&req_key, &completed)?)
                .append(RESULT_INDEX, request_id.to_hex()),
        )?;

        info!("Result committed for request {}", request_id);
        self.hub
            .resolve(request_id, RequestOutcome::Completed(result.clone()));
        Ok(result)
    }

    /// The engine reported that it could not finish the computation.
    pub fn on_computation_aborted(&self, request_id: &RequestId, reason: &str) -> Result<(), PsiError> {
        let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());

        let request = self.load_pending(request_id)?;
        let key = request_key(request_id);
        let failed = request.into_failed(&format!("engine aborted: {reason}"));
        self.ledger
            .put(&key, self.identity, encode_record(&key, &failed)?)?;

        warn!("Request {} aborted by engine: {}", request_id, reason);
        self.hub.resolve(
            request_id,
            RequestOutcome::Failed {
                reason: failed.failure.unwrap_or_default(),
            },
        );
        Ok(())
    }

    pub fn handle(&self, callback: EngineCallback) -> Result<(), PsiError> {
        match callback {
            EngineCallback::Completed {
                request_id,
                encrypted_result,
                proof,
            } => self
                .on_computation_callback(&request_id, &encrypted_result, &proof)
                .map(|_| ()),
            EngineCallback::Aborted { request_id, reason } => {
                self.on_computation_aborted(&request_id, &reason)
            }
        }
    }

    /// Drain engine callbacks until the channel closes. Callbacks are handled
    /// one at a time on the blocking pool. A bad callback is logged and never
    /// stops the loop.
    pub async fn run(self: Arc<Self>, mut callbacks: mpsc::Receiver<EngineCallback>) {
        while let Some(callback) = callbacks.recv().await {
            let request_id = *callback.request_id();
            let acceptor = self.clone();
            let handled = tokio::task::spawn_blocking(move || acceptor.handle(callback)).await;
            match handled {
                Ok(Ok(())) => debug!("Callback for {} handled", request_id),
                Ok(Err(e @ PsiError::DuplicateCallback { .. })) => debug!("{}", e),
                Ok(Err(e)) => warn!("Callback for {} rejected: {}", request_id, e),
                Err(e) => error!("Callback task for {} failed: {}", request_id, e),
            }
        }
        info!("Engine callback channel closed; acceptor stopped");
    }

    /// Steps 1 and 2: the request must exist and still be pending.
    fn load_pending(&self, request_id: &RequestId) -> Result<PsiRequest, PsiError> {
        let key = request_key(request_id);
        let request: PsiRequest = match self.ledger.get(&key)? {
            Some(bytes) => decode_record(&key, &bytes)?,
            None => {
                warn!("Callback for unknown request {}", request_id);
                return Err(PsiError::not_found("request", request_id));
            }
        };

        if request.status.is_terminal() {
            warn!(
                "Duplicate callback for request {} ({:?})",
                request_id, request.status
            );
            return Err(PsiError::DuplicateCallback {
                request_id: *request_id,
                status: request.status,
            });
        }
        Ok(request)
    }

    /// Mark the request failed and build the verification error to return.
    fn fail(&self, request: PsiRequest, reason: &str) -> Result<PsiError, PsiError> {
        let request_id = request.id;
        let key = request_key(&request_id);
        let failed = request.into_failed(reason);
        self.ledger
            .put(&key, self.identity, encode_record(&key, &failed)?)?;

        warn!("Request {} failed verification: {}", request_id, reason);
        self.hub.resolve(
            &request_id,
            RequestOutcome::Failed {
                reason: reason.to_string(),
            },
        );
        Ok(PsiError::Verification {
            request_id,
            reason: reason.to_string(),
        })
    }
}
