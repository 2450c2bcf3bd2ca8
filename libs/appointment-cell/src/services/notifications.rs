// libs/appointment-cell/src/services/notifications.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::Appointment;

const FALLBACK_DISPLAY_NAME: &str = "Patient";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Patient directory lookup failed: {0}")]
    Directory(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<NotificationMessage, NotificationError>;
    async fn send_sms(&self, to: &str, body: &str) -> Result<NotificationMessage, NotificationError>;
}

/// Name and contact channels of a patient as stored by the patient records service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl PatientContact {
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(trimmed)
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            FALLBACK_DISPLAY_NAME.to_string()
        } else {
            name
        }
    }

    pub fn email(&self) -> Option<&str> {
        trimmed(self.email.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        trimmed(self.phone.as_deref())
    }
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn contact(&self, patient_id: i64) -> Result<Option<PatientContact>, NotificationError>;
}

// ==============================================================================
// EVENTS AND MESSAGE COMPOSITION
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    Created,
    Rescheduled {
        previous_start: NaiveDateTime,
        previous_end: NaiveDateTime,
        reason: Option<String>,
    },
    Cancelled {
        reason: Option<String>,
    },
}

/// A patient notification about a committed change, carrying the appointment as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub appointment: Appointment,
}

impl NotificationEvent {
    pub fn created(appointment: Appointment) -> Self {
        Self { kind: NotificationKind::Created, appointment }
    }

    pub fn rescheduled(
        appointment: Appointment,
        previous_start: NaiveDateTime,
        previous_end: NaiveDateTime,
        reason: Option<String>,
    ) -> Self {
        Self {
            kind: NotificationKind::Rescheduled { previous_start, previous_end, reason },
            appointment,
        }
    }

    pub fn cancelled(appointment: Appointment, reason: Option<String>) -> Self {
        Self { kind: NotificationKind::Cancelled { reason }, appointment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedNotification {
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

fn time_range(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("{} - {}", start.format(DISPLAY_FORMAT), end.format(DISPLAY_FORMAT))
}

pub fn compose(event: &NotificationEvent, display_name: &str) -> ComposedNotification {
    let appointment = &event.appointment;
    let range = time_range(appointment.start_time, appointment.end_time);

    match &event.kind {
        NotificationKind::Created => ComposedNotification {
            subject: "Appointment confirmed".to_string(),
            email_body: format!(
                "Hello {},\n\nYour appointment is booked for {}. Location: {}.",
                display_name,
                range,
                appointment.location.as_deref().unwrap_or("not specified")
            ),
            sms_body: format!(
                "Appointment {}. Room: {}",
                range,
                appointment.location.as_deref().unwrap_or("-")
            ),
        },
        NotificationKind::Rescheduled { previous_start, previous_end, reason } => {
            let mut email_body = format!(
                "Hello {},\n\nYour appointment has been moved from {} to {}.",
                display_name,
                time_range(*previous_start, *previous_end),
                range
            );
            let mut sms_body = format!("Appointment moved to {}", range);
            if let Some(reason) = reason {
                email_body.push_str(&format!("\nReason: {}", reason));
                sms_body.push_str(&format!(" ({})", reason));
            }
            ComposedNotification {
                subject: "Appointment rescheduled".to_string(),
                email_body,
                sms_body,
            }
        }
        NotificationKind::Cancelled { reason } => {
            let mut email_body = format!(
                "Hello {},\n\nYour appointment {} has been cancelled.",
                display_name, range
            );
            let mut sms_body = format!("Appointment {} cancelled", range);
            if let Some(reason) = reason {
                email_body.push_str(&format!("\nReason: {}", reason));
                sms_body.push_str(&format!(" ({})", reason));
            }
            ComposedNotification {
                subject: "Appointment cancelled".to_string(),
                email_body,
                sms_body,
            }
        }
    }
}

/// Resolves the patient's contact channels and sends one message per channel.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn PatientDirectory>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, directory: Arc<dyn PatientDirectory>) -> Self {
        Self { notifier, directory }
    }

    /// Unknown patients and patients without contact info produce no messages.
    pub async fn deliver(&self, event: &NotificationEvent) -> Result<Vec<NotificationMessage>, NotificationError> {
        let patient_id = event.appointment.patient_id;
        let Some(contact) = self.directory.contact(patient_id).await? else {
            debug!("No directory entry for patient {}, skipping notification", patient_id);
            return Ok(Vec::new());
        };

        let (email, phone) = (contact.email(), contact.phone());
        if email.is_none() && phone.is_none() {
            debug!("Patient {} has no contact channels, skipping notification", patient_id);
            return Ok(Vec::new());
        }

        let composed = compose(event, &contact.display_name());
        let mut attempts = Vec::new();

        if let Some(email) = email {
            attempts.push(self.notifier.send_email(email, &composed.subject, &composed.email_body).await);
        }
        if let Some(phone) = phone {
            attempts.push(self.notifier.send_sms(phone, &composed.sms_body).await);
        }

        let mut messages = Vec::new();
        let mut first_error = None;
        for attempt in attempts {
            match attempt {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("Notification for patient {} failed: {}", patient_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(messages),
        }
    }
}

// ==============================================================================
// IN-PROCESS IMPLEMENTATIONS
// ==============================================================================

/// Records every outgoing message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<NotificationMessage>>,
    failing: Vec<NotificationChannel>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails.
    pub fn failing() -> Self {
        Self {
            failing: vec![NotificationChannel::Email, NotificationChannel::Sms],
            ..Self::default()
        }
    }

    /// A notifier whose sends fail on one channel only.
    pub fn failing_on(channel: NotificationChannel) -> Self {
        Self {
            failing: vec![channel],
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.read().await.clone()
    }

    async fn record(&self, message: NotificationMessage) -> Result<NotificationMessage, NotificationError> {
        if self.failing.contains(&message.channel) {
            return Err(NotificationError::Delivery(format!(
                "{:?} gateway unavailable",
                message.channel
            )));
        }
        self.sent.write().await.push(message.clone());
        Ok(message)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<NotificationMessage, NotificationError> {
        self.record(NotificationMessage {
            channel: NotificationChannel::Email,
            recipient: to.to_string(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        })
        .await
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<NotificationMessage, NotificationError> {
        self.record(NotificationMessage {
            channel: NotificationChannel::Sms,
            recipient: to.to_string(),
            subject: None,
            body: body.to_string(),
        })
        .await
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    contacts: RwLock<HashMap<i64, PatientContact>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, patient_id: i64, contact: PatientContact) {
        self.contacts.write().await.insert(patient_id, contact);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn contact(&self, patient_id: i64) -> Result<Option<PatientContact>, NotificationError> {
        Ok(self.contacts.read().await.get(&patient_id).cloned())
    }
}
