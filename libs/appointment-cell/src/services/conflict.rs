// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, ConflictCode};
use crate::services::interval::overlaps;
use crate::services::repository::{AppointmentRepository, RangeFilter};

/// Point-in-time double-booking check. Callers that write afterwards must
/// hold the provider's lock for the whole check-then-write sequence.
pub struct ConflictDetectionService {
    repository: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Rejects empty and inverted ranges before any store access.
    pub fn validate_time_range(
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        if start_time >= end_time {
            debug!("Rejecting inverted range {} - {}", start_time, end_time);
            return Err(AppointmentError::conflict(ConflictCode::InvalidTimeRange));
        }
        Ok(())
    }

    /// Active appointments of `provider_id` that intersect `[start_time, end_time)`.
    pub async fn find_conflicts(
        &self,
        provider_id: i64,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_appointment_id: Option<i64>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Checking conflicts for provider {} from {} to {}",
               provider_id, start_time, end_time);

        let filter = RangeFilter::for_provider(provider_id, start_time, end_time)
            .excluding(exclude_appointment_id);
        let existing = self.repository.find_active_in_range(&filter).await?;

        let conflicting: Vec<Appointment> = existing
            .into_iter()
            .filter(|appointment| {
                appointment.is_active()
                    && Some(appointment.id) != exclude_appointment_id
                    && overlaps(
                        (start_time, end_time),
                        (appointment.start_time, appointment.end_time),
                    )
            })
            .collect();

        if !conflicting.is_empty() {
            warn!("Conflict detected for provider {} - {} conflicting appointments",
                  provider_id, conflicting.len());
        }

        Ok(conflicting)
    }

    pub async fn has_overlap(
        &self,
        provider_id: i64,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_appointment_id: Option<i64>,
    ) -> Result<bool, AppointmentError> {
        let conflicts = self
            .find_conflicts(provider_id, start_time, end_time, exclude_appointment_id)
            .await?;
        Ok(!conflicts.is_empty())
    }

    /// Range validation followed by the overlap check, as create and update need it.
    pub async fn ensure_slot_free(
        &self,
        provider_id: i64,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_appointment_id: Option<i64>,
    ) -> Result<(), AppointmentError> {
        Self::validate_time_range(start_time, end_time)?;

        if self
            .has_overlap(provider_id, start_time, end_time, exclude_appointment_id)
            .await?
        {
            return Err(AppointmentError::conflict(ConflictCode::ProviderOverlap));
        }
        Ok(())
    }
}
