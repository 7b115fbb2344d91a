use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Only outstanding appointments can move to another slot.
    pub fn ensure_reschedulable(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if current_status.is_pending() {
            Ok(())
        } else {
            Err(AppointmentError::ValidationError(format!(
                "A {} appointment cannot be rescheduled",
                current_status
            )))
        }
    }

    /// Statuses a new booking may start in.
    pub fn ensure_initial(&self, status: AppointmentStatus) -> Result<(), AppointmentError> {
        if status.is_pending() {
            Ok(())
        } else {
            Err(AppointmentError::ValidationError(
                "New appointments must be scheduled or confirmed".to_string(),
            ))
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_can_move_anywhere_but_back() {
        let lifecycle = AppointmentLifecycleService::new();
        for next in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
            AppointmentStatus::Cancelled,
        ] {
            assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, next).is_ok());
        }
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Scheduled)
            .is_err());
    }

    #[test]
    fn terminal_statuses_are_final() {
        let lifecycle = AppointmentLifecycleService::new();
        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(lifecycle.get_valid_transitions(terminal).is_empty());
            assert!(lifecycle.ensure_reschedulable(terminal).is_err());
        }
    }

    #[test]
    fn bookings_start_outstanding() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.ensure_initial(AppointmentStatus::Scheduled).is_ok());
        assert!(lifecycle.ensure_initial(AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.ensure_initial(AppointmentStatus::Completed).is_err());
    }
}
