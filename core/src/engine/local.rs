//! Local compute engine.
//!
//! Runs intersections on a dedicated thread by comparing handle match tags,
//! and signs every result with a keyed BLAKE3 proof.

use std::collections::HashSet;
use std::time::Duration;

use arcpsi_cipher::TAG_LEN;
use log::{debug, warn};
use rand::RngCore;
use tokio::sync::mpsc;

use super::{
    ComputeEngine, ComputeJob, EngineCallback, EngineError, ProofVerifier, encode_intersection,
};
use crate::protocol::RequestId;

const PROOF_DOMAIN: &[u8] = b"arcpsi-engine-proof-v1";

/// Secret shared by the engine and the verifier.
#[derive(Clone)]
pub struct EngineKey([u8; 32]);

impl EngineKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self(key)
    }

    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut key = [0u8; 32];
        hex::decode_to_slice(s, &mut key)?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Proof binding a result to its request.
    pub fn prove(&self, request_id: &RequestId, result: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.0);
        hasher.update(PROOF_DOMAIN);
        hasher.update(request_id.as_bytes());
        hasher.update(&(result.len() as u64).to_le_bytes());
        hasher.update(result);
        *hasher.finalize().as_bytes()
    }
}

impl ProofVerifier for EngineKey {
    fn verify(&self, request_id: &RequestId, result: &[u8], proof: &[u8]) -> bool {
        let Ok(proof): Result<[u8; 32], _> = proof.try_into() else {
            return false;
        };
        // blake3::Hash equality is constant time
        blake3::Hash::from(self.prove(request_id, result)) == blake3::Hash::from(proof)
    }
}

/// Run one job to completion.
pub fn compute(key: &EngineKey, job: &ComputeJob) -> EngineCallback {
    let request_id = job.request_id;

    if job.segments.len() < 2 {
        return EngineCallback::Aborted {
            request_id,
            reason: format!("need at least 2 segments, got {}", job.segments.len()),
        };
    }
    let total: usize = job.segments.iter().sum();
    if total != job.handles.len() {
        return EngineCallback::Aborted {
            request_id,
            reason: format!(
                "segments cover {} handles but {} were sent",
                total,
                job.handles.len()
            ),
        };
    }

    let mut segments = Vec::with_capacity(job.segments.len());
    let mut offset = 0;
    for len in &job.segments {
        segments.push(&job.handles[offset..offset + len]);
        offset += len;
    }

    let others: Vec<HashSet<[u8; TAG_LEN]>> = segments[1..]
        .iter()
        .map(|seg| seg.iter().map(|h| h.match_tag()).collect())
        .collect();

    let mut seen = HashSet::new();
    let matches: Vec<_> = segments[0]
        .iter()
        .filter(|h| {
            let tag = h.match_tag();
            others.iter().all(|set| set.contains(&tag)) && seen.insert(tag)
        })
        .cloned()
        .collect();

    let encrypted_result = if job.size_only {
        (matches.len() as u64).to_le_bytes().to_vec()
    } else {
        match encode_intersection(&matches) {
            Ok(bytes) => bytes,
            Err(e) => {
                return EngineCallback::Aborted {
                    request_id,
                    reason: e.to_string(),
                };
            }
        }
    };

    let proof = key.prove(&request_id, &encrypted_result).to_vec();
    EngineCallback::Completed {
        request_id,
        encrypted_result,
        proof,
    }
}

#[derive(Debug, Clone)]
pub struct LocalEngineConfig {
    /// Maximum queued jobs before dispatch is refused
    pub queue_depth: usize,
    /// Artificial latency per job (ms)
    pub compute_delay_ms: u64,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            compute_delay_ms: 0,
        }
    }
}

/// Engine handle. Jobs run on a background thread and callbacks are sent to
/// the channel given at start.
pub struct LocalEngine {
    job_tx: mpsc::Sender<ComputeJob>,
}

impl LocalEngine {
    pub fn start(
        key: EngineKey,
        config: LocalEngineConfig,
        callbacks: mpsc::Sender<EngineCallback>,
    ) -> Self {
        let (job_tx, mut job_rx) = mpsc::channel::<ComputeJob>(config.queue_depth.max(1));

        // Separate thread, off the tokio runtime
        std::thread::spawn(move || {
            while let Some(job) = job_rx.blocking_recv() {
                if config.compute_delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(config.compute_delay_ms));
                }
                let callback = compute(&key, &job);
                debug!("Engine finished job {}", job.request_id);
                if callbacks.blocking_send(callback).is_err() {
                    warn!("Callback receiver dropped; engine stopping");
                    break;
                }
            }
        });

        Self { job_tx }
    }
}

impl ComputeEngine for LocalEngine {
    fn dispatch(&self, job: ComputeJob) -> Result<(), EngineError> {
        self.job_tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                EngineError::Rejected("engine queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => EngineError::Unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decode_intersection;
    use arcpsi_cipher::{ElementCipher, LocalCipher};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn job(size_only: bool) -> (LocalCipher, ComputeJob) {
        let cipher = LocalCipher::new(&[3u8; 32]);
        let a = cipher.encrypt(&strings(&["x", "y", "z"])).unwrap();
        let b = cipher.encrypt(&strings(&["y", "z", "w", "v"])).unwrap();
        let mut handles = a;
        handles.extend(b);
        let job = ComputeJob {
            request_id: RequestId([9u8; 32]),
            handles,
            segments: vec![3, 4],
            size_only,
        };
        (cipher, job)
    }

    #[test]
    fn test_size_only_counts_common_elements() {
        let key = EngineKey::generate();
        let (_, job) = job(true);

        match compute(&key, &job) {
            EngineCallback::Completed {
                request_id,
                encrypted_result,
                proof,
            } => {
                assert_eq!(encrypted_result, 2u64.to_le_bytes().to_vec());
                assert!(key.verify(&request_id, &encrypted_result, &proof));
            }
            other => panic!("unexpected callback: {:?}", other),
        }
    }

    #[test]
    fn test_full_result_returns_first_party_handles() {
        let key = EngineKey::generate();
        let (cipher, job) = job(false);

        let EngineCallback::Completed {
            encrypted_result, ..
        } = compute(&key, &job)
        else {
            panic!("expected completion");
        };

        let handles = decode_intersection(&encrypted_result).unwrap();
        let revealed: Vec<String> = handles.iter().map(|h| cipher.decrypt(h).unwrap()).collect();
        assert_eq!(revealed, vec!["y".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_bad_segments_abort() {
        let key = EngineKey::generate();
        let (_, mut job) = job(true);
        job.segments = vec![3, 3];

        assert!(matches!(
            compute(&key, &job),
            EngineCallback::Aborted { .. }
        ));
    }

    #[test]
    fn test_proof_is_bound_to_request_and_result() {
        let key = EngineKey::generate();
        let id = RequestId([1u8; 32]);
        let proof = key.prove(&id, b"result");

        assert!(key.verify(&id, b"result", &proof));
        assert!(!key.verify(&RequestId([2u8; 32]), b"result", &proof));
        assert!(!key.verify(&id, b"tampered", &proof));
        assert!(!key.verify(&id, b"result", &proof[..16]));
        assert!(!EngineKey::generate().verify(&id, b"result", &proof));
    }

    #[tokio::test]
    async fn test_engine_delivers_callback() {
        let key = EngineKey::generate();
        let (cb_tx, mut cb_rx) = mpsc::channel(4);
        let engine = LocalEngine::start(key.clone(), LocalEngineConfig::default(), cb_tx);

        let (_, job) = job(true);
        let id = job.request_id;
        engine.dispatch(job).unwrap();

        let callback = cb_rx.recv().await.expect("engine callback");
        assert_eq!(callback.request_id(), &id);
    }
}
