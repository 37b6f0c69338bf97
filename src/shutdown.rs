// ABOUTME: SIGINT-driven process shutdown (spec.md §6 "Process lifecycle").
// ABOUTME: Stops the RP listener, then CP.Stop(), then the process exits.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::controlplane::ControlPlane;

/// Wait for SIGINT, then drive shutdown: stop accepting RP connections and
/// destroy every registered function's fleet.
pub async fn wait_and_shut_down(cp: Arc<ControlPlane>, rp_shutdown: oneshot::Sender<()>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install SIGINT handler: {}", e);
        return;
    }
    tracing::info!("received SIGINT, shutting down");

    let _ = rp_shutdown.send(());
    if let Err(e) = cp.stop().await {
        tracing::warn!("control plane stop reported an error: {}", e);
    }
}
