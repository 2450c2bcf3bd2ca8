// libs/appointment-cell/src/services/supabase_repository.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentSearchQuery, HistoryDraft,
    NewAppointment, Patch, StatusHistoryEntry,
};
use crate::services::repository::{AppointmentRepository, RangeFilter};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const HISTORY_PATH: &str = "/rest/v1/appointment_status_history";

fn encode_time(timestamp: NaiveDateTime) -> String {
    urlencoding::encode(&timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()).into_owned()
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn db_error(e: anyhow::Error) -> AppointmentError {
    error!("Appointment store request failed: {}", e);
    AppointmentError::DatabaseError(e.to_string())
}

fn patch_value(patch: &Patch<String>) -> Option<Value> {
    match patch {
        Patch::Absent => None,
        Patch::Clear => Some(Value::Null),
        Patch::Set(value) => Some(json!(value)),
    }
}

/// PATCH body containing only the columns populated in `changes`.
pub fn changes_to_json(changes: &AppointmentChanges) -> Map<String, Value> {
    let mut body = Map::new();

    if let Some(provider_id) = changes.provider_id {
        body.insert("provider_id".to_string(), json!(provider_id));
    }
    for (column, patch) in [
        ("location", &changes.location),
        ("service_type", &changes.service_type),
        ("notes", &changes.notes),
        ("cancelled_reason", &changes.cancelled_reason),
    ] {
        if let Some(value) = patch_value(patch) {
            body.insert(column.to_string(), value);
        }
    }
    if let Some(start_time) = changes.start_time {
        body.insert("start_time".to_string(), json!(start_time));
    }
    if let Some(end_time) = changes.end_time {
        body.insert("end_time".to_string(), json!(end_time));
    }
    if let Some(status) = changes.status {
        body.insert("status".to_string(), json!(status));
    }
    if let Some(cancelled_at) = changes.cancelled_at {
        body.insert("cancelled_at".to_string(), json!(cancelled_at));
    }
    body.insert("updated_at".to_string(), json!(changes.updated_at));

    body
}

/// PostgREST query string for a conflict or availability range read.
pub fn range_query(filter: &RangeFilter) -> String {
    let provider_ids: Vec<String> = filter.provider_ids.iter().map(i64::to_string).collect();
    let mut parts = vec![
        format!("provider_id=in.({})", provider_ids.join(",")),
        "status=neq.cancelled".to_string(),
        format!("start_time=lt.{}", encode_time(filter.end)),
        format!("end_time=gt.{}", encode_time(filter.start)),
    ];
    if let Some(location) = &filter.location {
        parts.push(format!("location=eq.{}", urlencoding::encode(location)));
    }
    if let Some(exclude_id) = filter.exclude_appointment_id {
        parts.push(format!("id=neq.{}", exclude_id));
    }
    parts.push("order=start_time.asc,id.asc".to_string());
    parts.join("&")
}

pub fn search_query(query: &AppointmentSearchQuery, page: u32, page_size: u32) -> String {
    let mut parts = Vec::new();

    if let Some(patient_id) = query.patient_id {
        parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(provider_id) = query.provider_id {
        parts.push(format!("provider_id=eq.{}", provider_id));
    }
    if let Some(status) = query.status {
        parts.push(format!("status=eq.{}", status));
    }
    if let Some(start_from) = query.start_from {
        parts.push(format!("start_time=gte.{}", encode_time(start_from)));
    }
    if let Some(end_to) = query.end_to {
        parts.push(format!("end_time=lte.{}", encode_time(end_to)));
    }

    parts.push("order=start_time.desc,id.desc".to_string());
    parts.push(format!("limit={}", page_size));
    parts.push(format!("offset={}", AppointmentSearchQuery::offset(page, page_size)));
    parts.join("&")
}

/// Appointment store backed by the `appointments` and
/// `appointment_status_history` tables.
///
/// The history row is written right after the appointment row; a failed
/// history write is reported as a database error.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn append_history(&self, appointment_id: i64, draft: HistoryDraft) -> Result<(), AppointmentError> {
        let body = json!({
            "appointment_id": appointment_id,
            "status": draft.status,
            "changed_by": draft.changed_by,
            "changed_at": draft.changed_at,
            "note": draft.note,
        });

        let _: Vec<StatusHistoryEntry> = self
            .supabase
            .request_with_headers(Method::POST, HISTORY_PATH, self.token(), Some(body), Some(return_representation()))
            .await
            .map_err(db_error)?;

        debug!("Appended {} history entry for appointment {}", draft.status, appointment_id);
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn get(&self, appointment_id: i64) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn find_active_in_range(&self, filter: &RangeFilter) -> Result<Vec<Appointment>, AppointmentError> {
        if filter.provider_ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("{}?{}", APPOINTMENTS_PATH, range_query(filter));
        self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(db_error)
    }

    async fn insert(
        &self,
        appointment: NewAppointment,
        history: HistoryDraft,
    ) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "patient_id": appointment.patient_id,
            "provider_id": appointment.provider_id,
            "location": appointment.location,
            "service_type": appointment.service_type,
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "status": appointment.status,
            "notes": appointment.notes,
            "created_by": appointment.created_by,
            "created_at": appointment.created_at,
            "updated_at": appointment.created_at,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::POST, APPOINTMENTS_PATH, self.token(), Some(body), Some(return_representation()))
            .await
            .map_err(db_error)?;

        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        self.append_history(created.id, history).await?;
        Ok(created)
    }

    async fn update(
        &self,
        appointment_id: i64,
        changes: &AppointmentChanges,
        history: Option<HistoryDraft>,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(Value::Object(changes_to_json(changes))),
                Some(return_representation()),
            )
            .await
            .map_err(db_error)?;

        let updated = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;

        if let Some(draft) = history {
            self.append_history(appointment_id, draft).await?;
        }
        Ok(updated)
    }

    async fn history(&self, appointment_id: i64) -> Result<Vec<StatusHistoryEntry>, AppointmentError> {
        let path = format!(
            "{}?appointment_id=eq.{}&order=changed_at.desc,id.desc",
            HISTORY_PATH, appointment_id
        );
        self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(db_error)
    }

    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Appointment>, u64), AppointmentError> {
        let path = format!("{}?{}", APPOINTMENTS_PATH, search_query(query, page, page_size));
        let (rows, total): (Vec<Appointment>, Option<u64>) = self
            .supabase
            .request_with_count(&path, self.token())
            .await
            .map_err(db_error)?;

        let total = total.unwrap_or_else(|| AppointmentSearchQuery::offset(page, page_size) + rows.len() as u64);
        Ok((rows, total))
    }
}
