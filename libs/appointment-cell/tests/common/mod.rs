// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use appointment_cell::models::{Actor, Appointment, CreateAppointmentRequest};
use appointment_cell::services::{
    AppointmentLifecycleService, InMemoryAppointmentRepository, InMemoryPatientDirectory,
    PatientContact, RecordingNotifier, TracingAuditLogger,
};
use shared_config::SchedulingConfig;
use shared_utils::test_utils::init_test_tracing;

pub const PROVIDER: i64 = 10;
pub const PATIENT: i64 = 1;
pub const ROOM: &str = "Room 1";

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn staff() -> Actor {
    Actor::user(99).with_context("request_id", "test-request")
}

pub fn booking(provider_id: i64, start: NaiveDateTime, end: NaiveDateTime) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: PATIENT,
        provider_id,
        location: Some(ROOM.to_string()),
        service_type: Some("consultation".to_string()),
        start_time: start,
        end_time: end,
        notes: None,
    }
}

pub struct Harness {
    pub service: Arc<AppointmentLifecycleService>,
    pub repository: Arc<InMemoryAppointmentRepository>,
    pub audit: Arc<TracingAuditLogger>,
    pub notifier: Arc<RecordingNotifier>,
    pub directory: Arc<InMemoryPatientDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        init_test_tracing();

        let repository = Arc::new(InMemoryAppointmentRepository::new());
        let audit = Arc::new(TracingAuditLogger::new());
        let notifier = Arc::new(notifier);
        let directory = Arc::new(InMemoryPatientDirectory::new());

        let service = AppointmentLifecycleService::new(
            repository.clone(),
            audit.clone(),
            notifier.clone(),
            directory.clone(),
            SchedulingConfig::default(),
        );

        Self {
            service: Arc::new(service),
            repository,
            audit,
            notifier,
            directory,
        }
    }

    pub async fn with_patient_email(self) -> Self {
        self.directory
            .insert(PATIENT, PatientContact {
                first_name: Some("Aino".to_string()),
                last_name: Some("Virtanen".to_string()),
                email: Some("aino@example.com".to_string()),
                phone: None,
            })
            .await;
        self
    }

    pub async fn book(&self, start: NaiveDateTime, end: NaiveDateTime) -> Appointment {
        self.service
            .create(booking(PROVIDER, start, end), &staff())
            .await
            .expect("booking should succeed")
    }
}

/// Fails if two active appointments of the same provider intersect.
pub fn assert_no_overlaps(appointments: &[Appointment]) {
    let active: Vec<&Appointment> = appointments.iter().filter(|a| a.is_active()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            assert!(
                a.provider_id != b.provider_id
                    || !(a.start_time < b.end_time && b.start_time < a.end_time),
                "appointments {} and {} overlap for provider {}",
                a.id, b.id, a.provider_id
            );
        }
    }
}
