//! Tracker events
//!
//! Tracking runs on its own poll cycle, so its outcomes are delivered to
//! observers over a broadcast channel instead of a return value.

use crate::types::Status;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// Id added to the poll set
    TrackingStarted { tx_id: String },

    /// Record moved to a new state
    StatusChanged {
        tx_id: String,
        from: Status,
        to: Status,
        provider_status: String,
    },

    /// Status fetch failed; state unchanged, retried next cycle
    PollFailed {
        tx_id: String,
        message: String,
        /// Transport, rate-limit or server-side failure
        retryable: bool,
    },

    /// Terminal state reached; no further polling
    TrackingFinished { tx_id: String, status: Status },

    /// Tracking stopped before a terminal state
    TrackingStopped { tx_id: String, reason: String },
}

impl TrackerEvent {
    pub fn tx_id(&self) -> &str {
        match self {
            TrackerEvent::TrackingStarted { tx_id } => tx_id,
            TrackerEvent::StatusChanged { tx_id, .. } => tx_id,
            TrackerEvent::PollFailed { tx_id, .. } => tx_id,
            TrackerEvent::TrackingFinished { tx_id, .. } => tx_id,
            TrackerEvent::TrackingStopped { tx_id, .. } => tx_id,
        }
    }

    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::TrackingStarted { .. } => "tracking_started",
            TrackerEvent::StatusChanged { .. } => "status_changed",
            TrackerEvent::PollFailed { .. } => "poll_failed",
            TrackerEvent::TrackingFinished { .. } => "tracking_finished",
            TrackerEvent::TrackingStopped { .. } => "tracking_stopped",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TrackerEvent::PollFailed { .. }
                | TrackerEvent::TrackingFinished {
                    status: Status::Failed,
                    ..
                }
        )
    }
}
