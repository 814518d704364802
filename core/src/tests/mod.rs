mod registry;

use std::sync::{Arc, Mutex};

use arcpsi_cipher::{CiphertextHandle, ElementCipher, LocalCipher};
use arcpsi_party::PartyId;

use crate::engine::{ComputeEngine, ComputeJob, EngineError, EngineKey};
use crate::ledger::{MemoryLedger, SharedLedger};
use crate::node::PsiNode;

/// Engine that records jobs instead of running them.
#[derive(Default)]
pub(crate) struct RecordingEngine {
    jobs: Mutex<Vec<ComputeJob>>,
    refuse: bool,
}

impl RecordingEngine {
    pub(crate) fn refusing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            refuse: true,
        }
    }

    pub(crate) fn jobs(&self) -> Vec<ComputeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl ComputeEngine for RecordingEngine {
    fn dispatch(&self, job: ComputeJob) -> Result<(), EngineError> {
        if self.refuse {
            return Err(EngineError::Unavailable);
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub(crate) struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub engine: Arc<RecordingEngine>,
    pub key: EngineKey,
    pub node: Arc<PsiNode>,
    pub cipher: LocalCipher,
}

pub(crate) fn harness() -> Harness {
    harness_with(RecordingEngine::default())
}

pub(crate) fn harness_with(engine: RecordingEngine) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Arc::new(engine);
    let key = EngineKey::new([42u8; 32]);
    let shared: SharedLedger = ledger.clone();
    let node = Arc::new(PsiNode::new(shared, engine.clone(), Arc::new(key.clone())));

    Harness {
        ledger,
        engine,
        key,
        node,
        cipher: LocalCipher::new(&[5u8; 32]),
    }
}

pub(crate) fn party(label: &str) -> PartyId {
    PartyId::derive(label.as_bytes())
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Harness {
    pub(crate) fn handles(&self, items: &[&str]) -> Vec<CiphertextHandle> {
        self.cipher.encrypt(&strings(items)).unwrap()
    }

    /// A submits {x,y,z}, B submits {y,z,w,v}.
    pub(crate) fn seed_two_parties(&self) -> (PartyId, PartyId) {
        let (a, b) = (party("A"), party("B"));
        self.node
            .submit_set(a, self.handles(&["x", "y", "z"]))
            .unwrap();
        self.node
            .submit_set(b, self.handles(&["y", "z", "w", "v"]))
            .unwrap();
        (a, b)
    }
}
