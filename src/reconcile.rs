//! Background reconciliation of registry counters.
//!
//! Bodies and indexes expire silently in the ephemeral store while the
//! registry keeps counting them. The reconciler walks the registry, drops
//! index entries whose body is gone, and resets each counter to the number of
//! messages that are still readable.
//!
//! A counter is only rewritten if it still holds the value read at the start
//! of its page. One that moved in between is left for the next pass.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ReconcileConfig;
use crate::registry::AddressRepository;
use crate::storage::StorageEngine;
use crate::store::keys::{email_key, inbox_key};
use crate::store::{EphemeralStore, Order};
use crate::Result;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Registry records visited.
    pub addresses: usize,
    /// Index entries removed because their body had expired.
    pub pruned: usize,
    /// Counters that were corrected.
    pub adjusted: usize,
}

/// Periodic counter reconciler.
pub struct Reconciler<S> {
    engine: Arc<StorageEngine<S>>,
    interval: Duration,
    batch_size: i64,
}

impl<S: EphemeralStore> Reconciler<S> {
    /// Create a reconciler from configuration.
    pub fn new(engine: Arc<StorageEngine<S>>, config: &ReconcileConfig) -> Self {
        Self {
            engine,
            interval: Duration::from_secs(config.interval_secs),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Run passes forever at the configured interval.
    ///
    /// A failed pass is logged and retried on the next tick.
    pub async fn run(&self) {
        info!(
            "Reconciler started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.reconcile_once().await {
                Ok(report) if report.pruned > 0 || report.adjusted > 0 => info!(
                    "Reconciled {} address(es): pruned {} index entr(ies), adjusted {} counter(s)",
                    report.addresses, report.pruned, report.adjusted
                ),
                Ok(report) => debug!("Reconciled {} address(es), nothing to fix", report.addresses),
                Err(e) => error!("Reconciliation failed: {}", e),
            }
        }
    }

    /// Run a single pass over every registered address.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport> {
        let registry = AddressRepository::new(self.engine.database().pool());
        let mut report = ReconcileReport::default();
        let mut offset = 0;

        loop {
            let page = registry.list(self.batch_size, offset).await?;
            if page.is_empty() {
                break;
            }

            for record in &page {
                let (pruned, live) = self.prune_inbox(&record.address).await?;
                report.pruned += pruned;
                if live == record.email_count {
                    continue;
                }
                if registry
                    .set_count(&record.address, record.email_count, live)
                    .await?
                {
                    debug!(
                        "Counter for {} corrected from {} to {}",
                        record.address, record.email_count, live
                    );
                    report.adjusted += 1;
                } else {
                    debug!("Counter for {} changed during the pass, skipped", record.address);
                }
            }

            report.addresses += page.len();
            if (page.len() as i64) < self.batch_size {
                break;
            }
            offset += self.batch_size;
        }

        Ok(report)
    }

    /// Remove dangling ids from an address's index.
    ///
    /// Returns the number of ids removed and the number still readable.
    async fn prune_inbox(&self, address: &str) -> Result<(usize, i64)> {
        let store = self.engine.store();
        let key = inbox_key(address);
        let ids = store.zrange(&key, Order::Ascending).await?;

        let mut pruned = 0;
        let mut live = 0;
        for id in &ids {
            if store.get(&email_key(id)).await?.is_some() {
                live += 1;
            } else if store.zrem(&key, id).await? {
                pruned += 1;
            }
        }
        Ok((pruned, live))
    }
}

/// Spawn the reconciler as a background task.
pub fn start_reconciler<S: EphemeralStore>(
    engine: Arc<StorageEngine<S>>,
    config: &ReconcileConfig,
) -> JoinHandle<()> {
    let reconciler = Reconciler::new(engine, config);
    tokio::spawn(async move {
        reconciler.run().await;
    })
}
