// libs/appointment-cell/src/services/repository.rs
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentSearchQuery,
    HistoryDraft, NewAppointment, StatusHistoryEntry,
};

/// Selects the non-cancelled appointments that intersect `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub provider_ids: Vec<i64>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Option<String>,
    pub exclude_appointment_id: Option<i64>,
}

impl RangeFilter {
    pub fn for_provider(provider_id: i64, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            provider_ids: vec![provider_id],
            start,
            end,
            location: None,
            exclude_appointment_id: None,
        }
    }

    pub fn excluding(mut self, appointment_id: Option<i64>) -> Self {
        self.exclude_appointment_id = appointment_id;
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.is_active()
            && self.provider_ids.contains(&appointment.provider_id)
            && appointment.overlaps(self.start, self.end)
            && self
                .location
                .as_deref()
                .map_or(true, |location| appointment.location.as_deref() == Some(location))
            && self.exclude_appointment_id != Some(appointment.id)
    }
}

/// Storage seam for appointments and their status history.
///
/// `insert` and `update` persist the history entry together with the row so
/// the live status never drifts from the log. `update` writes only the
/// columns populated in `changes`.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get(&self, appointment_id: i64) -> Result<Option<Appointment>, AppointmentError>;

    /// Matching rows ordered by start time ascending.
    async fn find_active_in_range(&self, filter: &RangeFilter) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert(
        &self,
        appointment: NewAppointment,
        history: HistoryDraft,
    ) -> Result<Appointment, AppointmentError>;

    async fn update(
        &self,
        appointment_id: i64,
        changes: &AppointmentChanges,
        history: Option<HistoryDraft>,
    ) -> Result<Appointment, AppointmentError>;

    /// Newest entry first.
    async fn history(&self, appointment_id: i64) -> Result<Vec<StatusHistoryEntry>, AppointmentError>;

    /// One page ordered by start time descending, plus the total match count.
    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Appointment>, u64), AppointmentError>;
}

#[derive(Default)]
struct MemoryState {
    appointments: BTreeMap<i64, Appointment>,
    history: Vec<StatusHistoryEntry>,
    next_appointment_id: i64,
    next_history_id: i64,
}

impl MemoryState {
    fn push_history(&mut self, appointment_id: i64, draft: HistoryDraft) {
        self.next_history_id += 1;
        self.history.push(StatusHistoryEntry {
            id: self.next_history_id,
            appointment_id,
            status: draft.status,
            changed_by: draft.changed_by,
            changed_at: draft.changed_at,
            note: draft.note,
        });
    }
}

/// Process-local store. Each call is atomic under a single write lock.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.appointments.len()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.state.read().await.appointments.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn get(&self, appointment_id: i64) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.state.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn find_active_in_range(&self, filter: &RangeFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .cloned()
            .collect();
        rows.sort_by_key(|appointment| (appointment.start_time, appointment.id));
        Ok(rows)
    }

    async fn insert(
        &self,
        new: NewAppointment,
        history: HistoryDraft,
    ) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;
        state.next_appointment_id += 1;
        let appointment = Appointment {
            id: state.next_appointment_id,
            patient_id: new.patient_id,
            provider_id: new.provider_id,
            location: new.location,
            service_type: new.service_type,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            notes: new.notes,
            cancelled_reason: None,
            cancelled_at: None,
            created_by: new.created_by,
            created_at: new.created_at,
            updated_at: new.created_at,
        };

        state.appointments.insert(appointment.id, appointment.clone());
        state.push_history(appointment.id, history);
        debug!("Stored appointment {} in memory", appointment.id);

        Ok(appointment)
    }

    async fn update(
        &self,
        appointment_id: i64,
        changes: &AppointmentChanges,
        history: Option<HistoryDraft>,
    ) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;
        changes.apply(appointment);
        let updated = appointment.clone();

        if let Some(draft) = history {
            state.push_history(appointment_id, draft);
        }

        Ok(updated)
    }

    async fn history(&self, appointment_id: i64) -> Result<Vec<StatusHistoryEntry>, AppointmentError> {
        let state = self.state.read().await;
        let mut entries: Vec<StatusHistoryEntry> = state
            .history
            .iter()
            .filter(|entry| entry.appointment_id == appointment_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Appointment>, u64), AppointmentError> {
        let state = self.state.read().await;
        let mut rows: Vec<&Appointment> = state
            .appointments
            .values()
            .filter(|appointment| query.matches(appointment))
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));

        let total = rows.len() as u64;
        let offset = AppointmentSearchQuery::offset(page, page_size) as usize;
        let items = rows
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }
}
