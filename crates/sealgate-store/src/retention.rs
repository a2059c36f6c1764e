//! Epoch clock driving blob retention.
//!
//! A running gateway advances its store's epoch once per period so that
//! blobs past their retention horizon stop being readable.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::traits::BlobStore;

/// Advance `store` by one epoch every `period`, starting one period from now.
///
/// The task runs until aborted. A failed advance is logged and retried on
/// the next tick.
pub fn spawn_epoch_clock(store: Arc<dyn BlobStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            match store.advance_epoch().await {
                Ok(epoch) => info!(epoch, "storage epoch advanced"),
                Err(e) => warn!(error = %e, "failed to advance storage epoch"),
            }
        }
    })
}
