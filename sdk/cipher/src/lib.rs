//! ArcPSI Element Cipher
//!
//! Turns a party's plaintext elements into opaque ciphertext handles that a
//! compute engine can match without decrypting.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Ciphertext Handle                           │
//! │                                                                  │
//! │  ┌──────────────┬──────────────┬──────────────────────────────┐ │
//! │  │  match tag   │    nonce     │   ChaCha20-Poly1305 body     │ │
//! │  │  (32 bytes)  │  (12 bytes)  │   (element ‖ 16 byte MAC)    │ │
//! │  └──────────────┴──────────────┴──────────────────────────────┘ │
//! │                                                                  │
//! │  • match tag = keyed BLAKE3 of the element under the domain key │
//! │  • the tag is bound to the body as associated data              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handle;
pub mod local;

pub use handle::{CiphertextHandle, NONCE_LEN, TAG_LEN};
pub use local::LocalCipher;

use thiserror::Error;

/// Cipher errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("malformed ciphertext handle: {0} bytes")]
    MalformedHandle(usize),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("decrypted element is not valid utf-8")]
    InvalidUtf8,
}

/// Encryption collaborator used by clients to prepare datasets.
///
/// Handles are only meaningful to the compute engine. `decrypt` exists for
/// display and must never drive protocol decisions.
pub trait ElementCipher: Send + Sync {
    fn encrypt(&self, elements: &[String]) -> Result<Vec<CiphertextHandle>, CipherError>;

    fn decrypt(&self, handle: &CiphertextHandle) -> Result<String, CipherError>;
}
