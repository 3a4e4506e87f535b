//! Task registration.
//!
//! Tasks are the variant point of the pipeline: a mapping from the event
//! type tag to a handler plus its time budget, assembled once at boot. The
//! queue itself never interprets event types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use veld_core::error::Result;
use veld_store::Event;

use crate::context::TaskContext;
use crate::tasks::{BoundaryMapBuildTask, FileIngestTask, IndexDiscoveryTask};
use crate::tasks::{BOUNDARY_MAP_BUILD, FILE_INGEST, INDEX_DISCOVERY};

/// A pipeline task handler.
///
/// Handlers must be idempotent: the queue delivers at least once, and a
/// timed-out run may have completed any prefix of its effects.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Processes one claimed event.
    async fn run(&self, ctx: &TaskContext, event: &Event) -> Result<()>;
}

/// A registered handler and its time budget.
#[derive(Clone)]
pub struct TaskDefinition {
    /// The handler invoked for this event type.
    pub handler: Arc<dyn TaskHandler>,
    /// The handler run is cancelled after this long and the event released.
    pub max_duration: Duration,
}

/// The event-type to handler mapping.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    definitions: HashMap<String, TaskDefinition>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the registry with the three pipeline tasks.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            INDEX_DISCOVERY,
            Arc::new(IndexDiscoveryTask),
            Duration::from_secs(60 * 60),
        );
        registry.register(
            FILE_INGEST,
            Arc::new(FileIngestTask),
            Duration::from_secs(5 * 60),
        );
        registry.register(
            BOUNDARY_MAP_BUILD,
            Arc::new(BoundaryMapBuildTask),
            Duration::from_secs(5 * 60),
        );
        registry
    }

    /// Registers a handler for an event type, replacing any previous one.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        max_duration: Duration,
    ) {
        self.definitions
            .insert(event_type.into(), TaskDefinition {
                handler,
                max_duration,
            });
    }

    /// Looks up the definition for an event type.
    #[must_use]
    pub fn get(&self, event_type: &str) -> Option<&TaskDefinition> {
        self.definitions.get(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_budgets() {
        let registry = TaskRegistry::standard();
        assert_eq!(
            registry.get(INDEX_DISCOVERY).expect("registered").max_duration,
            Duration::from_secs(3600)
        );
        assert_eq!(
            registry.get(FILE_INGEST).expect("registered").max_duration,
            Duration::from_secs(300)
        );
        assert_eq!(
            registry
                .get(BOUNDARY_MAP_BUILD)
                .expect("registered")
                .max_duration,
            Duration::from_secs(300)
        );
        assert!(registry.get("SomethingElse").is_none());
    }
}
