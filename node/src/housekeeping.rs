//! Periodic maintenance: expired-entry purge and counter reconciliation.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::EndorsementService;

/// Purge expired sessions and cache entries every `period`.
pub fn spawn_purge_task(
    service: EndorsementService,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("purge task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match service.purge_expired().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "purged expired entries"),
                        Err(e) => warn!(error = %e, "purge failed"),
                    }
                }
            }
        }
    })
}

/// Recount counters from the endorsement records every `period`.
pub fn spawn_reconcile_task(
    service: EndorsementService,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("reconcile task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match service.reconcile().await {
                        Ok(drifts) if drifts.is_empty() => debug!("counters consistent"),
                        Ok(drifts) => info!(repaired = drifts.len(), "counters reconciled"),
                        Err(e) => warn!(error = %e, "reconciliation failed"),
                    }
                }
            }
        }
    })
}
