//! ArcPSI Core
//!
//! Ledger-backed coordination of private set intersection requests between
//! two or more parties.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ 1. Each party encrypts its elements and submits a set           │
//! │ 2. A requester names ≥2 participants; their handles are         │
//! │    gathered in order and dispatched to the compute engine       │
//! │ 3. The engine calls back with (request id, result, proof)       │
//! │ 4. The acceptor verifies the proof and commits the result once  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod node;
pub mod protocol;

pub use error::PsiError;
pub use node::PsiNode;

#[cfg(test)]
mod tests;
