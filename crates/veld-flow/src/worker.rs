//! The event worker loop.
//!
//! A single cooperative loop per process: claim the next runnable event,
//! dispatch it to the registered handler under that handler's time budget,
//! and settle. On success the loop continues almost immediately; an empty
//! queue or a claim error backs off for five seconds so idle workers do not
//! hammer the store.
//!
//! Settlement always increments the attempt counter and clears the claim.
//! A failed run records its error (truncated) and, once the attempt budget
//! is spent, marks the event failed terminally. An event type with no
//! registered handler is failed immediately — a poison message retried
//! forever would wedge the queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::Instrument;

use veld_core::error::{Error, Result};
use veld_store::Event;

use crate::context::TaskContext;
use crate::metrics::FlowMetrics;
use crate::registry::TaskRegistry;

/// Delay after settling an event.
const SETTLE_DELAY: Duration = Duration::from_millis(1);
/// Delay after an empty claim or a claim error.
const IDLE_DELAY: Duration = Duration::from_secs(5);

/// One worker loop over the shared queue.
pub struct Worker {
    ctx: Arc<TaskContext>,
    registry: TaskRegistry,
    metrics: FlowMetrics,
}

impl Worker {
    /// Creates a worker over the given context and registry.
    #[must_use]
    pub fn new(ctx: Arc<TaskContext>, registry: TaskRegistry) -> Self {
        Self {
            ctx,
            registry,
            metrics: FlowMetrics::new(),
        }
    }

    /// Runs the loop until the shutdown signal flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.process_next_event().await {
                Ok(true) => SETTLE_DELAY,
                Ok(false) => {
                    tracing::debug!("no runnable events");
                    IDLE_DELAY
                }
                Err(err) => {
                    tracing::error!(error = %err, "worker iteration failed");
                    IDLE_DELAY
                }
            };

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("worker stopped");
    }

    /// Claims and settles one event. Returns false when the queue had
    /// nothing runnable.
    ///
    /// # Errors
    ///
    /// Returns an error only for claim or settlement store failures;
    /// handler errors are settled into the event itself.
    pub async fn process_next_event(&self) -> Result<bool> {
        let Some(mut event) = self.ctx.store.claim_next_event().await? else {
            return Ok(false);
        };

        let span = veld_core::observability::task_span(&event.event_type, &event.id.to_hex());
        self.dispatch_and_settle(&mut event).instrument(span).await?;
        Ok(true)
    }

    async fn dispatch_and_settle(&self, event: &mut Event) -> Result<()> {
        tracing::info!(priority = event.priority, attempts = event.attempts, "claimed event");

        let Some(definition) = self.registry.get(&event.event_type).cloned() else {
            tracing::warn!(event_type = %event.event_type, "no handler registered; failing event");
            event.started = false;
            event.failed = true;
            self.ctx.store.save_event(event).await?;
            self.metrics.record_settlement(&event.event_type, "poisoned");
            return Ok(());
        };

        let started_at = Instant::now();
        let outcome = tokio::time::timeout(
            definition.max_duration,
            definition.handler.run(&self.ctx, event),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::timeout(format!(
                "{} handler after {:?}",
                event.event_type, definition.max_duration
            )))
        });
        self.metrics
            .observe_task_duration(&event.event_type, started_at.elapsed().as_secs_f64());

        event.attempts += 1;
        event.started = false;
        match outcome {
            Ok(()) => {
                event.passed = true;
                self.metrics.record_settlement(&event.event_type, "passed");
                tracing::info!("event passed");
            }
            Err(err) => {
                event.push_error(&err.to_string());
                if event.attempts >= event.max_attempts {
                    event.failed = true;
                    self.metrics.record_settlement(&event.event_type, "failed");
                } else {
                    self.metrics.record_settlement(&event.event_type, "released");
                }
                tracing::warn!(
                    error = %err,
                    attempts = event.attempts,
                    max_attempts = event.max_attempts,
                    failed = event.failed,
                    "event handler failed"
                );
            }
        }
        self.ctx.store.save_event(event).await
    }
}
