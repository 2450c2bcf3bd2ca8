// libs/appointment-cell/src/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use shared_models::AppError;
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub location: Option<String>,
    pub service_type: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancelled_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Cancelled rows do not block their provider's schedule.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Status recorded in the history log. `Rescheduled` is a note-only marker,
/// never the resting status of an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
}

impl From<AppointmentStatus> for HistoryStatus {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Scheduled => HistoryStatus::Scheduled,
            AppointmentStatus::Completed => HistoryStatus::Completed,
            AppointmentStatus::Cancelled => HistoryStatus::Cancelled,
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::Scheduled => write!(f, "scheduled"),
            HistoryStatus::Completed => write!(f, "completed"),
            HistoryStatus::Cancelled => write!(f, "cancelled"),
            HistoryStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub appointment_id: i64,
    pub status: HistoryStatus,
    pub changed_by: Option<i64>,
    pub changed_at: NaiveDateTime,
    pub note: Option<String>,
}

/// A history entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDraft {
    pub status: HistoryStatus,
    pub changed_by: Option<i64>,
    pub changed_at: NaiveDateTime,
    pub note: Option<String>,
}

/// A row ready for insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub provider_id: i64,
    pub location: Option<String>,
    pub service_type: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// Column-level changes applied by the store. Only populated columns are written.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentChanges {
    pub provider_id: Option<i64>,
    pub location: Patch<String>,
    pub service_type: Patch<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub notes: Patch<String>,
    pub status: Option<AppointmentStatus>,
    pub cancelled_reason: Patch<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl AppointmentChanges {
    pub fn touching(updated_at: NaiveDateTime) -> Self {
        Self {
            provider_id: None,
            location: Patch::Absent,
            service_type: Patch::Absent,
            start_time: None,
            end_time: None,
            notes: Patch::Absent,
            status: None,
            cancelled_reason: Patch::Absent,
            cancelled_at: None,
            updated_at,
        }
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        if let Some(provider_id) = self.provider_id {
            appointment.provider_id = provider_id;
        }
        self.location.apply_to(&mut appointment.location);
        self.service_type.apply_to(&mut appointment.service_type);
        if let Some(start_time) = self.start_time {
            appointment.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            appointment.end_time = end_time;
        }
        self.notes.apply_to(&mut appointment.notes);
        if let Some(status) = self.status {
            appointment.status = status;
        }
        self.cancelled_reason.apply_to(&mut appointment.cancelled_reason);
        if let Some(cancelled_at) = self.cancelled_at {
            appointment.cancelled_at = Some(cancelled_at);
        }
        appointment.updated_at = self.updated_at;
    }
}

// ==============================================================================
// PARTIAL UPDATE MARKER
// ==============================================================================

/// Three-state field for partial updates of nullable columns.
///
/// In JSON a missing key is `Absent`, an explicit `null` is `Clear` and any
/// other value is `Set`. Fields using it need `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Absent => Patch::Absent,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(value),
        }
    }
}

impl<T: Clone> Patch<T> {
    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Clear => *target = None,
            Patch::Set(value) => *target = Some(value.clone()),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => serializer.serialize_some(value),
            Patch::Absent | Patch::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Who is performing an operation, plus request context copied into audit events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<i64>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl Actor {
    pub fn user(id: i64) -> Self {
        Self { id: Some(id), context: Map::new() }
    }

    /// Background processes act without a user.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: i64,
    pub provider_id: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub location: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub service_type: Patch<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub notes: Patch<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub cancelled_reason: Patch<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notify_patient: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub patient_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub start_from: Option<NaiveDateTime>,
    pub end_to: Option<NaiveDateTime>,
}

impl AppointmentSearchQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.provider_id.map_or(true, |id| appointment.provider_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.start_from.map_or(true, |from| appointment.start_time >= from)
            && self.end_to.map_or(true, |to| appointment.end_time <= to)
    }

    /// Zero-based row offset for a resolved page/page_size pair.
    pub fn offset(page: u32, page_size: u32) -> u64 {
        u64::from(page.max(1) - 1) * u64::from(page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub service_type: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for AppointmentSummary {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            provider_id: appointment.provider_id,
            service_type: appointment.service_type.clone(),
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

/// An appointment together with its status history, newest entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub status_history: Vec<StatusHistoryEntry>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentAvailability {
    pub provider_id: i64,
    pub location: Option<String>,
    pub slots: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub start_from: NaiveDateTime,
    pub end_to: NaiveDateTime,
    pub provider_ids: Vec<i64>,
    #[serde(default)]
    pub location: Option<String>,
    pub slot_minutes: i64,
    #[serde(default)]
    pub exclude_appointment_id: Option<i64>,
}

/// Caller-facing availability request; `slot_minutes` falls back to the configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub start_from: NaiveDateTime,
    pub end_to: NaiveDateTime,
    pub provider_ids: Vec<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub slot_minutes: Option<i64>,
}

impl AvailabilityRequest {
    pub fn into_query(self, default_slot_minutes: i64) -> AvailabilityQuery {
        AvailabilityQuery {
            start_from: self.start_from,
            end_to: self.end_to,
            provider_ids: self.provider_ids,
            location: self.location,
            slot_minutes: self.slot_minutes.unwrap_or(default_slot_minutes),
            exclude_appointment_id: None,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictCode {
    ProviderOverlap,
    InvalidTimeRange,
}

impl fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictCode::ProviderOverlap => write!(f, "PROVIDER_OVERLAP"),
            ConflictCode::InvalidTimeRange => write!(f, "INVALID_TIME_RANGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Scheduling conflict: {code}")]
    Conflict {
        code: ConflictCode,
        alternatives: Vec<AvailabilitySlot>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub fn conflict(code: ConflictCode) -> Self {
        AppointmentError::Conflict { code, alternatives: Vec::new() }
    }

    pub fn conflict_code(&self) -> Option<ConflictCode> {
        match self {
            AppointmentError::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::Conflict { code, alternatives } => AppError::Conflict {
                message: match code {
                    ConflictCode::ProviderOverlap => "Provider already has an appointment in this time range".to_string(),
                    ConflictCode::InvalidTimeRange => "End time must be after start time".to_string(),
                },
                code: code.to_string(),
                alternatives: if alternatives.is_empty() {
                    None
                } else {
                    serde_json::to_value(alternatives).ok()
                },
            },
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
