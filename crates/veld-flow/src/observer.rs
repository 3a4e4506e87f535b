//! The periodic scheduler seeding index discovery.
//!
//! A tick seeds one `IndexDiscovery` event only when none is outstanding
//! (unsettled with attempts left), which makes repeated ticks idempotent.
//! The seeded event is deferred a week so discovery runs are staggered
//! rather than bunching up behind deploy restarts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use veld_core::error::Result;
use veld_store::{Datastore, Event, EventFilter};

use crate::tasks::INDEX_DISCOVERY;

/// Default tick interval.
const TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default eligibility deferral for seeded events.
const SEED_DEFER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Periodic seeder for the discovery stage.
pub struct Observer {
    store: Arc<dyn Datastore>,
    interval: Duration,
    defer: Duration,
}

impl Observer {
    /// Creates an observer with the default 24 h interval and 7 d deferral.
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self {
            store,
            interval: TICK_INTERVAL,
            defer: SEED_DEFER,
        }
    }

    /// Overrides the tick interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs ticks until the shutdown signal flips to true. The first tick
    /// fires immediately, which gets discovery going on fresh deployments.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(interval = ?self.interval, "observer started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!(error = %err, "observer tick failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        tracing::info!("observer stopped");
    }

    /// Seeds one deferred discovery event when none is outstanding.
    ///
    /// # Errors
    ///
    /// Returns store errors from the outstanding-count query or the save.
    pub async fn tick(&self) -> Result<()> {
        let outstanding = self
            .store
            .count_events(
                &EventFilter::for_type(INDEX_DISCOVERY)
                    .unsettled()
                    .with_attempts_left(),
            )
            .await?;
        if outstanding > 0 {
            tracing::debug!(outstanding, "discovery event already outstanding");
            return Ok(());
        }

        let start_after = bson::DateTime::from_millis(
            bson::DateTime::now().timestamp_millis()
                + i64::try_from(self.defer.as_millis()).unwrap_or(i64::MAX),
        );
        let mut event = Event::new(INDEX_DISCOVERY).with_start_after(start_after);
        self.store.save_event(&mut event).await?;
        tracing::info!(event_id = %event.id, "seeded index discovery event");
        Ok(())
    }
}
