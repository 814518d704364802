//! ArcPSI Node
//!
//! Opens the ledger, starts the local compute engine and the result
//! acceptor, then runs a two-party intersection end to end.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arcpsi_cipher::LocalCipher;
use arcpsi_core::PsiNode;
use arcpsi_core::client::{ClientOrchestrator, RevealedResult};
use arcpsi_core::config::{ArcPsiConfig, LedgerBackend};
use arcpsi_core::engine::LocalEngine;
use arcpsi_core::ledger::{MemoryLedger, RocksLedger, SharedLedger};
use arcpsi_core::protocol::{RequestId, RequestOutcome};
use arcpsi_party::PartyId;
use log::{info, warn};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = ArcPsiConfig::load()?;

    info!("============================================");
    info!("            ARCPSI NODE v{}", env!("CARGO_PKG_VERSION"));
    info!("============================================");
    info!("Ledger backend    : {:?}", config.ledger.backend);
    info!("Ledger path       : {}", config.ledger.path);
    info!("Engine queue      : {}", config.engine.queue_depth);
    info!("Poll interval     : {}ms", config.client.poll_interval_ms);
    info!("============================================");

    let ledger: SharedLedger = match config.ledger.backend {
        LedgerBackend::Rocksdb => Arc::new(
            RocksLedger::open(&config.ledger.path).context("failed to open ledger")?,
        ),
        LedgerBackend::Memory => Arc::new(MemoryLedger::new()),
    };

    let key = config.engine_key()?;
    let (callback_tx, callback_rx) = mpsc::channel(config.engine.queue_depth.max(1));
    let engine = LocalEngine::start(key.clone(), config.to_engine_config(), callback_tx);

    let node = Arc::new(PsiNode::new(ledger, Arc::new(engine), Arc::new(key)));

    let pending = node.pending_requests()?;
    if !pending.is_empty() {
        warn!("{} request(s) still pending from a previous run", pending.len());
        for request in &pending {
            warn!(
                "  {} created_at={} participants={}",
                request.id,
                request.created_at,
                request.participants.len()
            );
        }
    }

    tokio::spawn(node.acceptor().run(callback_rx));

    let client = ClientOrchestrator::new(
        node.clone(),
        LocalCipher::generate(),
        config.to_client_config(),
    );

    let alice = PartyId::derive(b"alice");
    let bob = PartyId::derive(b"bob");

    client
        .submit_elements(alice, &strings(&["x", "y", "z"]))
        .await?;
    client
        .submit_elements(bob, &strings(&["y", "z", "w", "v"]))
        .await?;
    info!("Status: {:?}", client.status());

    let size_request = client
        .request_intersection(alice, &[alice, bob], true)
        .await?;
    report(&client, &size_request).await?;

    let full_request = client
        .request_intersection(alice, &[alice, bob], false)
        .await?;
    report(&client, &full_request).await?;

    let view = client.refresh().await?;
    info!(
        "Ledger: {} sets, {} requests, {} results",
        view.sets.len(),
        view.requests.len(),
        view.results.len()
    );

    Ok(())
}

async fn report(client: &ClientOrchestrator<LocalCipher>, id: &RequestId) -> Result<()> {
    match client.wait_for_result(id).await? {
        Some(RequestOutcome::Completed(result)) => match client.reveal(&result)? {
            RevealedResult::Size(n) => info!("Request {}: intersection size {}", id, n),
            RevealedResult::Elements(elements) => {
                info!("Request {}: intersection {:?}", id, elements)
            }
        },
        Some(RequestOutcome::Failed { reason }) => bail!("request {} failed: {}", id, reason),
        None => warn!("Request {} still pending", id),
    }
    Ok(())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
