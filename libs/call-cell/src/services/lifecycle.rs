use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Call, CallError, CallStatus};

/// How long a call may ring before it counts as missed.
pub const RING_TIMEOUT_SECONDS: i64 = 60;

pub struct CallLifecycle {
    ring_timeout: Duration,
}

impl CallLifecycle {
    pub fn new() -> Self {
        Self {
            ring_timeout: Duration::seconds(RING_TIMEOUT_SECONDS),
        }
    }

    pub fn ring_timeout(&self) -> Duration {
        self.ring_timeout
    }

    pub fn valid_transitions(&self, current: CallStatus) -> Vec<CallStatus> {
        match current {
            CallStatus::Initiated => vec![
                CallStatus::Active,
                CallStatus::Rejected,
                CallStatus::Ended,
                CallStatus::Missed,
            ],
            CallStatus::Active => vec![CallStatus::Ended],
            CallStatus::Ended | CallStatus::Rejected | CallStatus::Missed => vec![],
        }
    }

    pub fn validate_transition(&self, current: CallStatus, next: CallStatus, action: &str) -> Result<(), CallError> {
        debug!("Validating call transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid call transition attempted: {} -> {}", current, next);
            return Err(CallError::InvalidCallState {
                status: current,
                action: action.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_terminal(&self, status: CallStatus) -> bool {
        self.valid_transitions(status).is_empty()
    }

    pub fn is_open(&self, status: CallStatus) -> bool {
        matches!(status, CallStatus::Initiated | CallStatus::Active)
    }

    /// A ringing call past the timeout can only become `missed`.
    pub fn ring_expired(&self, call: &Call, now: DateTime<Utc>) -> bool {
        call.status == CallStatus::Initiated && now - call.initiated_at > self.ring_timeout
    }

    /// Initiated calls started before this instant have rung out.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.ring_timeout
    }

    /// Talk time in whole seconds; zero when the call was never answered.
    pub fn duration_seconds(&self, call: &Call, ended_at: DateTime<Utc>) -> i64 {
        call.answered_at
            .map(|answered| (ended_at - answered).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn default_end_reason(&self, status: CallStatus) -> &'static str {
        match status {
            CallStatus::Active => "hangup",
            _ => "cancelled",
        }
    }
}

impl Default for CallLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
