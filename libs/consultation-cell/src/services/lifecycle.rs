use tracing::{debug, warn};

use crate::models::{ConsultationError, ConsultationStatus, Participant};

pub struct ConsultationLifecycle;

impl ConsultationLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_transition(
        &self,
        current: ConsultationStatus,
        next: ConsultationStatus,
    ) -> Result<(), ConsultationError> {
        debug!("Validating consultation transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid consultation transition attempted: {} -> {}", current, next);
            return Err(ConsultationError::InvalidStatusTransition { from: current, to: next });
        }

        Ok(())
    }

    pub fn valid_transitions(&self, current: ConsultationStatus) -> Vec<ConsultationStatus> {
        match current {
            ConsultationStatus::Pending => vec![
                ConsultationStatus::Scheduled,
                ConsultationStatus::Cancelled,
            ],
            ConsultationStatus::Scheduled => vec![
                ConsultationStatus::Active,
                ConsultationStatus::Cancelled,
            ],
            ConsultationStatus::Active => vec![
                ConsultationStatus::Completed,
                ConsultationStatus::Cancelled,
            ],
            // Terminal states
            ConsultationStatus::Completed => vec![],
            ConsultationStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self, status: ConsultationStatus) -> bool {
        self.valid_transitions(status).is_empty()
    }

    /// Messages and calls are only exchanged once the doctor has accepted.
    pub fn allows_communication(&self, status: ConsultationStatus) -> bool {
        matches!(status, ConsultationStatus::Scheduled | ConsultationStatus::Active)
    }

    /// Accepting and completing belong to the doctor; the rest to either side.
    pub fn can_transition_by(&self, next: ConsultationStatus, actor: Participant) -> bool {
        match next {
            ConsultationStatus::Scheduled | ConsultationStatus::Completed => actor == Participant::Doctor,
            ConsultationStatus::Active | ConsultationStatus::Cancelled => true,
            ConsultationStatus::Pending => false,
        }
    }
}

impl Default for ConsultationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
