//! Set Registry
//!
//! Records each party's encrypted dataset and keeps a pointer from owner to
//! the most recently submitted set. Older sets stay readable by id.

use arcpsi_cipher::CiphertextHandle;
use arcpsi_party::PartyId;
use log::{debug, info, warn};
use rand::RngCore;

use super::records::{EncryptedSet, SET_INDEX, SetId, now_millis, owner_key, set_key};
use crate::error::PsiError;
use crate::ledger::{LedgerBatch, LedgerError, SharedLedger, decode_record, encode_record};

#[derive(Clone)]
pub struct SetRegistry {
    ledger: SharedLedger,
}

impl SetRegistry {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }

    /// Record a new set for `owner` and point the owner at it.
    ///
    /// The record, the `set_keys` append and the owner pointer commit in one
    /// batch. Two concurrent submissions by one owner race on the pointer;
    /// the last write wins.
    pub fn submit_set(
        &self,
        owner: PartyId,
        handles: Vec<CiphertextHandle>,
    ) -> Result<SetId, PsiError> {
        if handles.is_empty() {
            return Err(PsiError::Validation(
                "a set needs at least one ciphertext handle".to_string(),
            ));
        }

        let size = handles.len() as u64;
        let created_at = now_millis();
        let mut set = EncryptedSet {
            id: String::new(),
            owner,
            size,
            encrypted_payload: handles,
            created_at,
        };

        // Random ids; a taken id fails the create and is drawn again.
        let id = loop {
            set.id = random_set_id();
            let key = set_key(&set.id);
            let batch = LedgerBatch::new(owner)
                .create(key.as_str(), encode_record(&key, &set)?)
                .append(SET_INDEX, set.id.as_str())
                .put(owner_key(&owner), set.id.as_bytes().to_vec());
            match self.ledger.apply(batch) {
                Ok(()) => break set.id,
                Err(LedgerError::Conflict(taken)) => debug!("Set key {} taken, redrawing", taken),
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            "Set {} submitted by {} ({} handles)",
            id,
            owner.short(),
            size
        );
        Ok(id)
    }

    /// Every recorded set in submission order. Missing or unreadable records
    /// are logged and skipped.
    pub fn list_sets(&self) -> Result<Vec<EncryptedSet>, PsiError> {
        let ids = self.ledger.index(SET_INDEX)?;
        let mut sets = Vec::with_capacity(ids.len());

        for id in ids {
            let key = set_key(&id);
            match self.ledger.get(&key)? {
                Some(bytes) => match decode_record::<EncryptedSet>(&key, &bytes) {
                    Ok(set) => sets.push(set),
                    Err(e) => warn!("Skipping unreadable set {}: {}", id, e),
                },
                None => warn!("Skipping indexed set {} with no record", id),
            }
        }

        Ok(sets)
    }

    pub fn get_set(&self, id: &str) -> Result<EncryptedSet, PsiError> {
        let key = set_key(id);
        match self.ledger.get(&key)? {
            Some(bytes) => Ok(decode_record(&key, &bytes)?),
            None => Err(PsiError::not_found("set", id)),
        }
    }

    pub fn get_current_set_id(&self, owner: &PartyId) -> Result<Option<SetId>, PsiError> {
        let key = owner_key(owner);
        match self.ledger.get(&key)? {
            Some(bytes) => {
                let id = String::from_utf8(bytes).map_err(|e| LedgerError::Codec {
                    key,
                    reason: e.to_string(),
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// The set the owner pointer currently resolves to.
    pub fn current_set(&self, owner: &PartyId) -> Result<Option<EncryptedSet>, PsiError> {
        match self.get_current_set_id(owner)? {
            Some(id) => self.get_set(&id).map(Some),
            None => Ok(None),
        }
    }
}

fn random_set_id() -> SetId {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    hex::encode(raw)
}
