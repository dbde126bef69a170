//! Background removal of PGTs nobody came back for.

use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::store::PgtStore;

/// Purge entries older than `max_age` every `every`, starting one period
/// from now. Store failures are logged and retried on the next tick.
///
/// `every` must be non-zero.
pub fn spawn_purger(store: Arc<dyn PgtStore>, max_age: Duration, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + every, every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.purge_older_than(max_age)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(purged)) => tracing::info!(purged, "purged stale proxy-granting tickets"),
                Ok(Err(err)) => tracing::warn!(error = %err, "periodic pgt purge failed"),
                Err(err) => tracing::warn!(error = %err, "periodic pgt purge task failed"),
            }
        }
    })
}
