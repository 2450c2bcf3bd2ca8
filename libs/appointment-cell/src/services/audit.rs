// =====================================================================================
// AUDIT COLLABORATOR - PII-SAFE APPOINTMENT AUDIT EVENTS
// =====================================================================================

use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::Actor;

pub const RESOURCE_APPOINTMENT: &str = "appointment";

pub mod actions {
    pub const CREATE: &str = "appointment.create";
    pub const UPDATE: &str = "appointment.update";
    pub const CANCEL: &str = "appointment.cancel";
    pub const RESCHEDULE: &str = "appointment.reschedule";
    pub const READ: &str = "appointment.read";
    pub const LIST: &str = "appointment.list";
    pub const AVAILABILITY: &str = "appointment.availability";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor_id: Option<i64>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub context: Map<String, Value>,
    pub recorded_at: NaiveDateTime,
}

impl AuditEvent {
    pub fn appointment(
        actor: &Actor,
        action: &str,
        resource_id: Option<i64>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor.id,
            action: action.to_string(),
            resource_type: RESOURCE_APPOINTMENT.to_string(),
            resource_id: resource_id.map(|id| id.to_string()),
            metadata,
            context: actor.context.clone(),
            recorded_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditError {
    #[error("Audit metadata key '{key}' is not allowed for action '{action}' on '{resource_type}'")]
    DisallowedKey {
        key: String,
        action: String,
        resource_type: String,
    },

    #[error("Audit metadata may not contain personal identity codes")]
    PersonalIdentifier,

    #[error("Audit sink failure: {0}")]
    Sink(String),
}

/// Append-only audit sink. Implementations must not block the caller for long.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Stable reference to a patient used in audit metadata instead of raw ids.
pub fn patient_reference(patient_id: i64) -> String {
    format!("patient:{}", patient_id)
}

/// Builds appointment audit metadata, skipping unset optional values.
#[derive(Debug, Default)]
pub struct AuditMetadata(Map<String, Value>);

impl AuditMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_patient(patient_id: i64) -> Self {
        Self::new().with("patient_ref", patient_reference(patient_id))
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn build(self) -> Map<String, Value> {
        self.0
    }
}

// ==============================================================================
// POLICY
// ==============================================================================

const DEFAULT_ALLOWED_KEYS: &[&str] = &["result_count", "index", "page", "page_size"];

const APPOINTMENT_KEYS: &[&str] = &[
    "patient_ref",
    "previous_start",
    "previous_end",
    "reason",
    "notify",
    "auto",
    "provider_id",
    "provider_ids",
    "status",
    "returned",
    "total",
    "start_from",
    "end_to",
    "slot_minutes",
    "groups",
    "slot_count",
    "location",
];

const RESCHEDULE_KEYS: &[&str] = &["previous_start", "previous_end", "reason"];
const CANCEL_KEYS: &[&str] = &["notify", "reason"];

fn identity_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b\d{6}[+\-A]\d{3}[0-9A-Y]\b").expect("identity code pattern is valid")
    })
}

/// Key whitelist plus a personal-identifier scan over every metadata value.
#[derive(Debug, Clone, Default)]
pub struct AuditPolicy;

impl AuditPolicy {
    pub fn allowed_keys(resource_type: &str, action: &str) -> HashSet<&'static str> {
        let mut allowed: HashSet<&'static str> = DEFAULT_ALLOWED_KEYS.iter().copied().collect();
        if resource_type == RESOURCE_APPOINTMENT {
            allowed.extend(APPOINTMENT_KEYS.iter().copied());
        }
        match action {
            actions::RESCHEDULE => allowed.extend(RESCHEDULE_KEYS.iter().copied()),
            actions::CANCEL => allowed.extend(CANCEL_KEYS.iter().copied()),
            _ => {}
        }
        allowed
    }

    pub fn sanitize(&self, event: &AuditEvent) -> Result<Map<String, Value>, AuditError> {
        let allowed = Self::allowed_keys(&event.resource_type, &event.action);

        for (key, value) in &event.metadata {
            if !allowed.contains(key.as_str()) {
                return Err(AuditError::DisallowedKey {
                    key: key.clone(),
                    action: event.action.clone(),
                    resource_type: event.resource_type.clone(),
                });
            }
            ensure_no_identity_code(value)?;
        }

        Ok(event.metadata.clone())
    }
}

fn ensure_no_identity_code(value: &Value) -> Result<(), AuditError> {
    match value {
        Value::String(text) if identity_code_pattern().is_match(text) => {
            Err(AuditError::PersonalIdentifier)
        }
        Value::Array(items) => items.iter().try_for_each(ensure_no_identity_code),
        Value::Object(map) => map.values().try_for_each(ensure_no_identity_code),
        _ => Ok(()),
    }
}

// ==============================================================================
// TRACING LOGGER
// ==============================================================================

pub const DEFAULT_AUDIT_BUFFER: usize = 1024;

/// Sanitizes events, emits them as structured `tracing` records and keeps
/// the most recent ones in memory for inspection.
pub struct TracingAuditLogger {
    policy: AuditPolicy,
    buffer: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl Default for TracingAuditLogger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_BUFFER)
    }
}

impl TracingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            policy: AuditPolicy,
            buffer: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn entries(&self) -> Vec<AuditEvent> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub async fn entries_for_action(&self, action: &str) -> Vec<AuditEvent> {
        self.buffer
            .read()
            .await
            .iter()
            .filter(|event| event.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    #[instrument(skip(self, event), fields(action = %event.action))]
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let metadata = match self.policy.sanitize(event) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(event_id = %event.id, "AUDIT REJECTED: {}", e);
                return Err(e);
            }
        };

        info!(
            event_id = %event.id,
            actor_id = ?event.actor_id,
            resource_type = %event.resource_type,
            resource_id = ?event.resource_id,
            metadata = %serde_json::Value::Object(metadata.clone()),
            "AUDIT: {}", event.action
        );

        let mut stored = event.clone();
        stored.metadata = metadata;
        let mut buffer = self.buffer.write().await;
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(stored);
        Ok(())
    }
}
