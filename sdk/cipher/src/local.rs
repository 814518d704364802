//! Local symmetric implementation of [`ElementCipher`].

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::handle::{CiphertextHandle, NONCE_LEN};
use crate::{CipherError, ElementCipher};

const ENCRYPTION_CONTEXT: &str = "arcpsi cipher v1 element encryption";
const MATCH_CONTEXT: &str = "arcpsi cipher v1 match tag";

/// Encrypts elements under keys derived from a domain secret shared by the
/// parties of one deployment. Parties with the same secret produce matching
/// tags for equal elements.
#[derive(Clone)]
pub struct LocalCipher {
    encryption_key: [u8; 32],
    match_key: [u8; 32],
}

impl LocalCipher {
    pub fn new(domain_secret: &[u8; 32]) -> Self {
        Self {
            encryption_key: blake3::derive_key(ENCRYPTION_CONTEXT, domain_secret),
            match_key: blake3::derive_key(MATCH_CONTEXT, domain_secret),
        }
    }

    /// Generate a cipher with a fresh random domain secret.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret)
    }

    fn seal(&self, element: &str) -> Result<CiphertextHandle, CipherError> {
        let tag = *blake3::keyed_hash(&self.match_key, element.as_bytes()).as_bytes();

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.encryption_key)
            .map_err(|_| CipherError::EncryptionFailed)?;
        let body = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: element.as_bytes(),
                    aad: &tag,
                },
            )
            .map_err(|_| CipherError::EncryptionFailed)?;

        Ok(CiphertextHandle::assemble(tag, nonce_bytes, body))
    }
}

impl ElementCipher for LocalCipher {
    fn encrypt(&self, elements: &[String]) -> Result<Vec<CiphertextHandle>, CipherError> {
        elements.iter().map(|e| self.seal(e)).collect()
    }

    fn decrypt(&self, handle: &CiphertextHandle) -> Result<String, CipherError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.encryption_key)
            .map_err(|_| CipherError::DecryptionFailed)?;
        let tag = handle.match_tag();
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(handle.nonce()),
                Payload {
                    msg: handle.body(),
                    aad: &tag,
                },
            )
            .map_err(|_| CipherError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}
