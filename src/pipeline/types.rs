//! Shared types for the query-processing pipeline.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::channels::email_types::MessageHandle;
use crate::llm::ReplySource;

/// What happened to one unread message during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Reply delivered, message flagged read.
    Replied { source: ReplySource },
    /// A reply was already delivered earlier in this run; only the read flag
    /// was applied.
    AlreadyReplied,
    /// Fetch or parse failed. Left unread.
    FetchFailed { reason: String },
    /// Delivery failed. Left unread, retried next cycle.
    DeliveryFailed { reason: String },
    /// Reply delivered but the read flag could not be set.
    MarkFailed { reason: String },
}

impl MessageOutcome {
    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replied { .. } => "replied",
            Self::AlreadyReplied => "already_replied",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::MarkFailed { .. } => "mark_failed",
        }
    }

    /// True if the message ended the cycle flagged read.
    pub fn is_marked_read(&self) -> bool {
        matches!(self, Self::Replied { .. } | Self::AlreadyReplied)
    }
}

/// Summary of one polling cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Number of unread messages listed at cycle start.
    pub unread: usize,
    /// Per-message outcomes, in processing order.
    pub outcomes: Vec<(MessageHandle, MessageOutcome)>,
}

impl CycleReport {
    pub fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            started_at: Utc::now(),
            unread: 0,
            outcomes: Vec::new(),
        }
    }

    /// Wall-clock time since the cycle started.
    pub fn elapsed(&self) -> TimeDelta {
        Utc::now() - self.started_at
    }

    pub fn marked_read(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_marked_read())
            .count()
    }

    pub fn left_unread(&self) -> usize {
        self.outcomes.len() - self.marked_read()
    }

    pub fn outcome(&self, handle: &MessageHandle) -> Option<&MessageOutcome> {
        self.outcomes
            .iter()
            .find(|(h, _)| h == handle)
            .map(|(_, o)| o)
    }
}
