//! Request lifecycle across a node restart on a RocksDB ledger.

use std::sync::{Arc, Mutex};

use arcpsi_cipher::{ElementCipher, LocalCipher};
use arcpsi_core::PsiNode;
use arcpsi_core::engine::{ComputeEngine, ComputeJob, EngineError, EngineKey, compute};
use arcpsi_core::ledger::RocksLedger;
use arcpsi_core::protocol::{RequestStatus, ResultPayload};
use arcpsi_party::PartyId;
use tempfile::TempDir;

#[derive(Default)]
struct Parked {
    jobs: Mutex<Vec<ComputeJob>>,
}

impl ComputeEngine for Parked {
    fn dispatch(&self, job: ComputeJob) -> Result<(), EngineError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

fn open_node(dir: &TempDir, key: &EngineKey, engine: Arc<Parked>) -> PsiNode {
    let ledger = RocksLedger::open(dir.path()).unwrap();
    PsiNode::new(Arc::new(ledger), engine, Arc::new(key.clone()))
}

fn elements(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn pending_request_survives_restart_and_completes() {
    let dir = TempDir::new().unwrap();
    let key = EngineKey::new([3u8; 32]);
    let cipher = LocalCipher::new(&[8u8; 32]);
    let (alice, bob) = (PartyId::derive(b"alice"), PartyId::derive(b"bob"));

    let engine = Arc::new(Parked::default());
    let id = {
        let node = open_node(&dir, &key, engine.clone());
        node.submit_set(alice, cipher.encrypt(&elements(&["x", "y", "z"])).unwrap())
            .unwrap();
        node.submit_set(bob, cipher.encrypt(&elements(&["y", "z", "w", "v"])).unwrap())
            .unwrap();
        node.request_computation(alice, &[alice, bob], true).unwrap()
    };

    let node = open_node(&dir, &key, Arc::new(Parked::default()));
    let pending = node.pending_requests().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(node.list_sets().unwrap().len(), 2);

    let job = engine.jobs.lock().unwrap().remove(0);
    node.acceptor().handle(compute(&key, &job)).unwrap();

    assert_eq!(node.get_request(&id).unwrap().status, RequestStatus::Completed);
    assert_eq!(node.get_result(&id).unwrap().payload, ResultPayload::Size(2));
    assert!(node.pending_requests().unwrap().is_empty());
}

#[test]
fn callback_signed_with_another_key_is_rejected_after_restart() {
    let dir = TempDir::new().unwrap();
    let key = EngineKey::new([3u8; 32]);
    let cipher = LocalCipher::new(&[8u8; 32]);
    let (alice, bob) = (PartyId::derive(b"alice"), PartyId::derive(b"bob"));

    let id = {
        let node = open_node(&dir, &key, Arc::new(Parked::default()));
        node.submit_set(alice, cipher.encrypt(&elements(&["x"])).unwrap())
            .unwrap();
        node.submit_set(bob, cipher.encrypt(&elements(&["x"])).unwrap())
            .unwrap();
        node.request_computation(bob, &[alice, bob], true).unwrap()
    };

    let node = open_node(&dir, &key, Arc::new(Parked::default()));
    let result = 1u64.to_le_bytes();
    let forged = EngineKey::new([4u8; 32]).prove(&id, &result);

    assert!(
        node.acceptor()
            .on_computation_callback(&id, &result, &forged)
            .is_err()
    );
    assert_eq!(node.get_request(&id).unwrap().status, RequestStatus::Failed);
}
