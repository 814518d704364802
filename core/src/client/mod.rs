//! Client Orchestrator
//!
//! Drives the node from a user's point of view: encrypt elements, submit
//! sets, request computations, poll for results. Holds no protocol state;
//! a Success status is only shown after the write reads back from the node.

pub mod status;

pub use status::{StatusTracker, TxStatus};

use std::sync::Arc;
use std::time::Duration;

use arcpsi_cipher::ElementCipher;
use arcpsi_party::PartyId;
use log::{debug, info};

use crate::engine::decode_intersection;
use crate::error::PsiError;
use crate::node::PsiNode;
use crate::protocol::{
    EncryptedSet, PsiRequest, PsiResult, RequestId, RequestOutcome, RequestStatus, ResultPayload,
    SetId,
};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long Success/Error stays visible before returning to Idle
    pub status_window: Duration,
    /// Delay between result polls
    pub poll_interval: Duration,
    /// Polls before `wait_for_result` gives up and reports still pending
    pub max_polls: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            status_window: Duration::from_millis(3000),
            poll_interval: Duration::from_millis(100),
            max_polls: 600,
        }
    }
}

/// Snapshot of the ledger for display.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    pub sets: Vec<EncryptedSet>,
    pub requests: Vec<PsiRequest>,
    pub results: Vec<PsiResult>,
}

/// A committed result in displayable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealedResult {
    Size(u64),
    Elements(Vec<String>),
}

pub struct ClientOrchestrator<C: ElementCipher> {
    node: Arc<PsiNode>,
    cipher: C,
    status: StatusTracker,
    config: ClientConfig,
}

impl<C: ElementCipher> ClientOrchestrator<C> {
    pub fn new(node: Arc<PsiNode>, cipher: C, config: ClientConfig) -> Self {
        Self {
            node,
            status: StatusTracker::new(config.status_window),
            cipher,
            config,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status.current()
    }

    /// Encrypt `elements` and submit them as `owner`'s current set.
    pub async fn submit_elements(
        &self,
        owner: PartyId,
        elements: &[String],
    ) -> Result<SetId, PsiError> {
        let generation = self.status.begin("submit set");

        let outcome = self
            .cipher
            .encrypt(elements)
            .map_err(PsiError::from)
            .and_then(|handles| self.node.submit_set(owner, handles))
            .and_then(|id| self.node.get_set(&id).map(|_| id));

        match &outcome {
            Ok(id) => self.status.succeed(generation, format!("set {id} recorded")),
            Err(e) => self.status.fail(generation, e.to_string()),
        }
        outcome
    }

    pub async fn request_intersection(
        &self,
        requester: PartyId,
        participants: &[PartyId],
        size_only: bool,
    ) -> Result<RequestId, PsiError> {
        let generation = self.status.begin("request computation");

        let outcome = self
            .node
            .request_computation(requester, participants, size_only)
            .and_then(|id| self.node.get_request(&id).map(|_| id));

        match &outcome {
            Ok(id) => self
                .status
                .succeed(generation, format!("request {id} dispatched")),
            Err(e) => self.status.fail(generation, e.to_string()),
        }
        outcome
    }

    pub async fn refresh(&self) -> Result<ClientView, PsiError> {
        Ok(ClientView {
            sets: self.node.list_sets()?,
            requests: self.node.list_requests()?,
            results: self.node.list_results()?,
        })
    }

    /// Poll until the request is terminal. `None` means still pending after
    /// `max_polls`; the request itself is left untouched.
    pub async fn wait_for_result(
        &self,
        id: &RequestId,
    ) -> Result<Option<RequestOutcome>, PsiError> {
        for attempt in 0..self.config.max_polls {
            let request = self.node.get_request(id)?;
            match request.status {
                RequestStatus::Completed => {
                    info!("Request {} completed after {} polls", id, attempt);
                    return Ok(Some(RequestOutcome::Completed(self.node.get_result(id)?)));
                }
                RequestStatus::Failed => {
                    return Ok(Some(RequestOutcome::Failed {
                        reason: request.failure.unwrap_or_default(),
                    }));
                }
                RequestStatus::Pending => {
                    debug!("Request {} pending (poll {})", id, attempt);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
        Ok(None)
    }

    /// Decrypt a committed result for display.
    pub fn reveal(&self, result: &PsiResult) -> Result<RevealedResult, PsiError> {
        match &result.payload {
            ResultPayload::Size(n) => Ok(RevealedResult::Size(*n)),
            ResultPayload::Ciphertext(bytes) => {
                let handles = decode_intersection(bytes)?;
                let elements = handles
                    .iter()
                    .map(|h| self.cipher.decrypt(h))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RevealedResult::Elements(elements))
            }
        }
    }
}
