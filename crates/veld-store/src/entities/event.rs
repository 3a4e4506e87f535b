//! The queued unit of work.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use veld_core::EventId;

/// Maximum length of one recorded error string.
pub const MAX_ERROR_LEN: usize = 250;

/// A unit of work in the durable queue.
///
/// Lifecycle: created (not started) → claimed (`started`) → settled
/// (`passed`), released for retry (`started` cleared, `attempts`
/// incremented), or settled failed (`failed`, once attempts are exhausted).
/// Events are never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier; nil until first saved.
    #[serde(rename = "_id")]
    pub id: EventId,
    /// Last mutation time.
    pub updated_date: bson::DateTime,
    /// Handler tag; opaque to the queue.
    pub event_type: String,
    /// Earliest claim time; the epoch means immediately eligible.
    pub start_after_date: bson::DateTime,
    /// Time of the most recent claim.
    pub started_date: bson::DateTime,
    /// True while a worker holds the event.
    pub started: bool,
    /// Completed handler runs (successful or not).
    pub attempts: i32,
    /// Attempt budget.
    pub max_attempts: i32,
    /// Higher claims first.
    pub priority: i32,
    /// Opaque handler arguments.
    pub data: HashMap<String, String>,
    /// One entry per failed attempt, each at most [`MAX_ERROR_LEN`] chars.
    pub errors: Vec<String>,
    /// Terminal success flag.
    pub passed: bool,
    /// Terminal failure flag.
    pub failed: bool,
}

impl Event {
    /// Creates an unsaved event of the given type, immediately eligible,
    /// with a single attempt allowed.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        let epoch = bson::DateTime::from_millis(0);
        Self {
            id: EventId::nil(),
            updated_date: epoch,
            event_type: event_type.into(),
            start_after_date: epoch,
            started_date: epoch,
            started: false,
            attempts: 0,
            max_attempts: 1,
            priority: 0,
            data: HashMap::new(),
            errors: Vec::new(),
            passed: false,
            failed: false,
        }
    }

    /// Sets the claim priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Adds one handler argument.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Defers eligibility until the given time.
    #[must_use]
    pub fn with_start_after(mut self, start_after: bson::DateTime) -> Self {
        self.start_after_date = start_after;
        self
    }

    /// Returns a handler argument by key.
    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// True when the event is neither held nor settled and still has
    /// attempts left.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.started && !self.passed && !self.failed && self.attempts < self.max_attempts
    }

    /// Records a failed attempt's error, truncated to [`MAX_ERROR_LEN`]
    /// characters.
    pub fn push_error(&mut self, message: &str) {
        let truncated: String = message.chars().take(MAX_ERROR_LEN).collect();
        self.errors.push(truncated);
    }
}
