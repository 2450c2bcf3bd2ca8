// libs/appointment-cell/src/services/lifecycle.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use shared_config::SchedulingConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{
    Actor, Appointment, AppointmentAvailability, AppointmentChanges, AppointmentDetails,
    AppointmentError, AppointmentSearchQuery, AppointmentStatus, AppointmentSummary,
    AvailabilityQuery, AvailabilityRequest, AvailabilitySlot, CancelAppointmentRequest,
    ConflictCode, CreateAppointmentRequest, HistoryDraft, HistoryStatus, NewAppointment, Page,
    Patch, RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::audit::{actions, AuditEvent, AuditLogger, AuditMetadata};
use crate::services::availability::AvailabilityPlanner;
use crate::services::conflict::ConflictDetectionService;
use crate::services::locks::{ProviderGuard, ProviderLocks};
use crate::services::notifications::{
    NotificationDispatcher, NotificationEvent, Notifier, PatientDirectory,
};
use crate::services::outbox::{EventOutbox, OutboxEvent};
use crate::services::repository::{AppointmentRepository, RangeFilter};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn iso(timestamp: NaiveDateTime) -> String {
    timestamp.format(ISO_FORMAT).to_string()
}

/// History note recorded when an appointment is moved, e.g.
/// `from=2024-01-02T09:00:00;to=2024-01-02T09:30:00;location=Room 1;reason=Sick`.
pub fn reschedule_note(
    previous_start: NaiveDateTime,
    previous_end: NaiveDateTime,
    location: Option<&str>,
    reason: Option<&str>,
) -> String {
    let mut parts = vec![
        format!("from={}", iso(previous_start)),
        format!("to={}", iso(previous_end)),
    ];
    if let Some(location) = location {
        parts.push(format!("location={}", location));
    }
    if let Some(reason) = reason {
        parts.push(format!("reason={}", reason));
    }
    parts.join(";")
}

/// Orchestrates every appointment mutation.
///
/// Time-changing mutations hold the affected providers' locks across the
/// conflict check and the store write. Audit and notification side effects
/// go through the outbox after the write and never fail the operation.
pub struct AppointmentLifecycleService {
    repository: Arc<dyn AppointmentRepository>,
    conflicts: ConflictDetectionService,
    planner: AvailabilityPlanner,
    locks: ProviderLocks,
    outbox: EventOutbox,
    config: SchedulingConfig,
}

impl AppointmentLifecycleService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        audit: Arc<dyn AuditLogger>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn PatientDirectory>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            conflicts: ConflictDetectionService::new(Arc::clone(&repository)),
            planner: AvailabilityPlanner::new(Arc::clone(&repository)),
            locks: ProviderLocks::new(),
            outbox: EventOutbox::new(audit, NotificationDispatcher::new(notifier, directory)),
            repository,
            config,
        }
    }

    pub fn outbox(&self) -> &EventOutbox {
        &self.outbox
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    // ==============================================================================
    // MUTATIONS
    // ==============================================================================

    #[instrument(skip(self, request, actor), fields(provider_id = request.provider_id))]
    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Creating appointment for patient {} with provider {} from {} to {}",
               request.patient_id, request.provider_id, request.start_time, request.end_time);

        ConflictDetectionService::validate_time_range(request.start_time, request.end_time)?;

        let guard = self.locks.acquire(&[request.provider_id]).await;
        self.conflicts
            .ensure_slot_free(request.provider_id, request.start_time, request.end_time, None)
            .await?;

        let now = Self::now();
        let new_appointment = NewAppointment {
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            location: request.location,
            service_type: request.service_type,
            start_time: request.start_time,
            end_time: request.end_time,
            status: AppointmentStatus::Scheduled,
            notes: request.notes,
            created_by: actor.id,
            created_at: now,
        };
        let history = HistoryDraft {
            status: HistoryStatus::Scheduled,
            changed_by: actor.id,
            changed_at: now,
            note: None,
        };

        let appointment = self
            .repository
            .insert(new_appointment, history)
            .await
            .map_err(|e| log_store_failure("create", e))?;
        drop(guard);

        info!("Appointment {} created for provider {}", appointment.id, appointment.provider_id);

        let metadata = AuditMetadata::for_patient(appointment.patient_id)
            .with("provider_id", appointment.provider_id)
            .with_opt("location", appointment.location.clone())
            .build();
        self.publish(vec![
            OutboxEvent::Audit(AuditEvent::appointment(actor, actions::CREATE, Some(appointment.id), metadata)),
            OutboxEvent::Notify(NotificationEvent::created(appointment.clone())),
        ])
        .await;

        Ok(appointment)
    }

    /// Partial update. Unset fields keep their stored values; the effective
    /// range is always re-validated and re-checked against the target provider.
    #[instrument(skip(self, request, actor))]
    pub async fn update(
        &self,
        appointment_id: i64,
        request: UpdateAppointmentRequest,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        let (guard, current) = self.lock_appointment(appointment_id, request.provider_id).await?;

        let provider_id = request.provider_id.unwrap_or(current.provider_id);
        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);

        self.conflicts
            .ensure_slot_free(provider_id, start_time, end_time, Some(appointment_id))
            .await?;

        let now = Self::now();
        let history = request.status.map(|status| HistoryDraft {
            status: status.into(),
            changed_by: actor.id,
            changed_at: now,
            note: match request.cancelled_reason.as_ref() {
                Patch::Set(reason) => Some(reason.clone()),
                Patch::Absent | Patch::Clear => None,
            },
        });
        let changes = AppointmentChanges {
            provider_id: request.provider_id,
            location: request.location,
            service_type: request.service_type,
            start_time: request.start_time,
            end_time: request.end_time,
            notes: request.notes,
            status: request.status,
            cancelled_reason: request.cancelled_reason,
            ..AppointmentChanges::touching(now)
        };

        let updated = self
            .repository
            .update(appointment_id, &changes, history)
            .await
            .map_err(|e| log_store_failure("update", e))?;
        drop(guard);

        info!("Appointment {} updated", appointment_id);

        let metadata = AuditMetadata::for_patient(updated.patient_id)
            .with_opt("status", request.status.map(|status| status.to_string()))
            .with_opt("provider_id", request.provider_id)
            .build();
        self.publish(vec![OutboxEvent::Audit(AuditEvent::appointment(
            actor,
            actions::UPDATE,
            Some(appointment_id),
            metadata,
        ))])
        .await;

        Ok(updated)
    }

    /// Cancels unconditionally. The patient is notified only on request.
    #[instrument(skip(self, request, actor))]
    pub async fn cancel(
        &self,
        appointment_id: i64,
        request: CancelAppointmentRequest,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let (guard, _current) = self.lock_appointment(appointment_id, None).await?;

        let now = Self::now();
        let changes = AppointmentChanges {
            status: Some(AppointmentStatus::Cancelled),
            cancelled_reason: Patch::from(request.reason.clone()),
            cancelled_at: Some(now),
            ..AppointmentChanges::touching(now)
        };
        let history = HistoryDraft {
            status: HistoryStatus::Cancelled,
            changed_by: actor.id,
            changed_at: now,
            note: request.reason.clone(),
        };

        let cancelled = self
            .repository
            .update(appointment_id, &changes, Some(history))
            .await
            .map_err(|e| log_store_failure("cancel", e))?;
        drop(guard);

        info!("Appointment {} cancelled (notify patient: {})", appointment_id, request.notify_patient);

        let metadata = AuditMetadata::for_patient(cancelled.patient_id)
            .with("notify", request.notify_patient)
            .with_opt("reason", request.reason.clone())
            .build();
        let mut events = vec![OutboxEvent::Audit(AuditEvent::appointment(
            actor,
            actions::CANCEL,
            Some(appointment_id),
            metadata,
        ))];
        if request.notify_patient {
            events.push(OutboxEvent::Notify(NotificationEvent::cancelled(
                cancelled.clone(),
                request.reason,
            )));
        }
        self.publish(events).await;

        Ok(cancelled)
    }

    /// Moves an appointment to a new range on the same provider. A rejected
    /// move carries free alternatives from the lookahead window.
    #[instrument(skip(self, request, actor))]
    pub async fn reschedule(
        &self,
        appointment_id: i64,
        request: RescheduleAppointmentRequest,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {} to {} - {}",
               appointment_id, request.start_time, request.end_time);

        self.load(appointment_id).await?;
        ConflictDetectionService::validate_time_range(request.start_time, request.end_time)?;

        let (guard, current) = self.lock_appointment(appointment_id, None).await?;

        if self
            .conflicts
            .has_overlap(current.provider_id, request.start_time, request.end_time, Some(appointment_id))
            .await?
        {
            let alternatives = self
                .reschedule_alternatives(&current, request.start_time, request.end_time)
                .await;
            warn!("Reschedule of appointment {} rejected, offering {} alternatives",
                  appointment_id, alternatives.len());
            return Err(AppointmentError::Conflict {
                code: ConflictCode::ProviderOverlap,
                alternatives,
            });
        }

        let now = Self::now();
        let note = reschedule_note(
            current.start_time,
            current.end_time,
            current.location.as_deref(),
            request.reason.as_deref(),
        );
        let changes = AppointmentChanges {
            start_time: Some(request.start_time),
            end_time: Some(request.end_time),
            status: Some(AppointmentStatus::Scheduled),
            ..AppointmentChanges::touching(now)
        };
        let history = HistoryDraft {
            status: HistoryStatus::Rescheduled,
            changed_by: actor.id,
            changed_at: now,
            note: Some(note),
        };

        let rescheduled = self
            .repository
            .update(appointment_id, &changes, Some(history))
            .await
            .map_err(|e| log_store_failure("reschedule", e))?;
        drop(guard);

        info!("Appointment {} rescheduled from {} to {}",
              appointment_id, current.start_time, rescheduled.start_time);

        let metadata = AuditMetadata::for_patient(rescheduled.patient_id)
            .with("previous_start", iso(current.start_time))
            .with("previous_end", iso(current.end_time))
            .with_opt("reason", request.reason.clone())
            .build();
        self.publish(vec![
            OutboxEvent::Audit(AuditEvent::appointment(actor, actions::RESCHEDULE, Some(appointment_id), metadata)),
            OutboxEvent::Notify(NotificationEvent::rescheduled(
                rescheduled.clone(),
                current.start_time,
                current.end_time,
                request.reason,
            )),
        ])
        .await;

        Ok(rescheduled)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    #[instrument(skip(self, actor))]
    pub async fn get(&self, appointment_id: i64, actor: &Actor) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let status_history = self.repository.history(appointment_id).await?;

        if actor.id.is_some() {
            let metadata = AuditMetadata::for_patient(appointment.patient_id).build();
            self.publish(vec![OutboxEvent::Audit(AuditEvent::appointment(
                actor,
                actions::READ,
                Some(appointment_id),
                metadata,
            ))])
            .await;
        }

        Ok(AppointmentDetails { appointment, status_history })
    }

    #[instrument(skip(self, query, actor))]
    pub async fn list(
        &self,
        query: &AppointmentSearchQuery,
        actor: &Actor,
    ) -> Result<Page<AppointmentSummary>, AppointmentError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));

        debug!("Listing appointments page {} (size {})", page, page_size);

        let (rows, total) = self.repository.list(query, page, page_size).await?;
        let items: Vec<AppointmentSummary> = rows.iter().map(AppointmentSummary::from).collect();

        if actor.id.is_some() {
            let metadata = AuditMetadata::new()
                .with("page", page)
                .with("page_size", page_size)
                .with("returned", items.len())
                .with("total", total)
                .with_opt("provider_id", query.provider_id)
                .with_opt("status", query.status.map(|status| status.to_string()))
                .build();
            self.publish(vec![OutboxEvent::Audit(AuditEvent::appointment(actor, actions::LIST, None, metadata))])
                .await;
        }

        Ok(Page { items, page, page_size, total })
    }

    #[instrument(skip(self, request, actor))]
    pub async fn availability(
        &self,
        request: AvailabilityRequest,
        actor: &Actor,
    ) -> Result<Vec<AppointmentAvailability>, AppointmentError> {
        let query = request.into_query(self.config.default_slot_minutes);
        let availability = self.planner.compute_availability(&query).await?;

        if actor.id.is_some() {
            let metadata = AuditMetadata::new()
                .with("provider_ids", query.provider_ids.clone())
                .with("start_from", iso(query.start_from))
                .with("end_to", iso(query.end_to))
                .with("slot_minutes", query.slot_minutes)
                .with_opt("location", query.location.clone())
                .with("groups", availability.len())
                .with("slot_count", availability.iter().map(|group| group.slots.len()).sum::<usize>())
                .build();
            self.publish(vec![OutboxEvent::Audit(AuditEvent::appointment(
                actor,
                actions::AVAILABILITY,
                None,
                metadata,
            ))])
            .await;
        }

        Ok(availability)
    }

    // ==============================================================================
    // INTERNALS
    // ==============================================================================

    async fn load(&self, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        self.repository
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Locks the appointment's current provider (and `target_provider` when
    /// moving it) and returns the row as read under those locks.
    async fn lock_appointment(
        &self,
        appointment_id: i64,
        target_provider: Option<i64>,
    ) -> Result<(ProviderGuard, Appointment), AppointmentError> {
        let mut snapshot = self.load(appointment_id).await?;
        loop {
            let providers = [snapshot.provider_id, target_provider.unwrap_or(snapshot.provider_id)];
            let guard = self.locks.acquire(&providers).await;
            let current = self.load(appointment_id).await?;
            if current.provider_id == snapshot.provider_id {
                return Ok((guard, current));
            }
            debug!("Provider of appointment {} changed while locking, retrying", appointment_id);
            drop(guard);
            snapshot = current;
        }
    }

    /// Free slots of the requested length on the appointment's provider and
    /// location, starting at the requested time. A duration with leftover
    /// seconds is rounded up to the next whole minute. Candidates that collide
    /// with the provider's bookings elsewhere are dropped.
    async fn reschedule_alternatives(
        &self,
        appointment: &Appointment,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Vec<AvailabilitySlot> {
        let slot_minutes = whole_minutes_ceil(end_time - start_time);
        if slot_minutes <= 0 || self.config.max_alternatives == 0 {
            return Vec::new();
        }
        let Some(window_end) = Duration::try_hours(self.config.effective_lookahead_hours())
            .filter(|lookahead| *lookahead > Duration::zero())
            .and_then(|lookahead| start_time.checked_add_signed(lookahead))
        else {
            return Vec::new();
        };

        let query = AvailabilityQuery {
            start_from: start_time,
            end_to: window_end,
            provider_ids: vec![appointment.provider_id],
            location: appointment.location.clone(),
            slot_minutes,
            exclude_appointment_id: Some(appointment.id),
        };

        let groups = match self.planner.compute_availability(&query).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Could not compute reschedule alternatives: {}", e);
                return Vec::new();
            }
        };

        let filter = RangeFilter::for_provider(appointment.provider_id, query.start_from, query.end_to)
            .excluding(Some(appointment.id));
        let busy = match self.repository.find_active_in_range(&filter).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not load busy time for reschedule alternatives: {}", e);
                return Vec::new();
            }
        };

        groups
            .into_iter()
            .flat_map(|group| group.slots)
            .filter(|slot| !busy.iter().any(|row| row.overlaps(slot.start_time, slot.end_time)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(self.config.max_alternatives)
            .collect()
    }

    async fn publish(&self, events: Vec<OutboxEvent>) {
        self.outbox.enqueue_all(events).await;
        let report = self.outbox.flush().await;
        if report.failed > 0 {
            warn!("{} post-commit events failed and were retained", report.failed);
        }
    }
}

fn whole_minutes_ceil(duration: Duration) -> i64 {
    let minutes = duration.num_minutes();
    if duration > Duration::minutes(minutes) {
        minutes + 1
    } else {
        minutes
    }
}

fn log_store_failure(operation: &str, e: AppointmentError) -> AppointmentError {
    if matches!(e, AppointmentError::DatabaseError(_)) {
        error!("Store write failed during {}: {}", operation, e);
    }
    e
}
