use std::sync::Arc;

use tracing::{info, warn};

use doctor_cell::models::Doctor;
use patient_cell::models::Patient;
use shared_mailer::Mailer;

use crate::models::{Appointment, DeliveryStatus, NotificationReport};

/// Booking emails. Delivery problems are reported, never raised.
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    async fn deliver(&self, to: Option<&str>, subject: &str, text: &str) -> DeliveryStatus {
        let Some(to) = to else {
            return DeliveryStatus::Skipped;
        };

        match self.mailer.send_mail(to, subject, text, None).await {
            Ok(()) => DeliveryStatus::Sent,
            Err(e) => {
                warn!(subject, "Booking notification failed: {}", e);
                DeliveryStatus::Failed
            }
        }
    }

    pub async fn notify_booking(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
        patient: &Patient,
    ) -> NotificationReport {
        let when = appointment.date_time.format("%d/%m/%Y %H:%M");

        let patient_text = format!(
            "Hello {},\n\nYour appointment with Dr. {} ({}) is booked for {}.",
            patient.full_name(),
            doctor.full_name(),
            doctor.specialty,
            when
        );
        let patient_status = self
            .deliver(patient.email(), "Appointment confirmed", &patient_text)
            .await;

        let urgency = appointment
            .urgency_level
            .map(|u| u.as_str())
            .unwrap_or("not classified");
        let doctor_text = format!(
            "Hello Dr. {},\n\n{} booked an appointment with you for {}.\nUrgency: {}\nNotes: {}",
            doctor.full_name(),
            patient.full_name(),
            when,
            urgency,
            appointment.notes.as_deref().unwrap_or("-")
        );
        let doctor_status = self
            .deliver(doctor.email(), "New appointment", &doctor_text)
            .await;

        info!(
            appointment_id = %appointment.id,
            patient = ?patient_status,
            doctor = ?doctor_status,
            "Booking notifications processed"
        );

        NotificationReport {
            patient: patient_status,
            doctor: doctor_status,
        }
    }
}
