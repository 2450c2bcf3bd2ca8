// libs/appointment-cell/src/lib.rs
//! # Appointment Cell
//!
//! Scheduling core for clinic appointments: double-booking detection,
//! provider availability and the appointment lifecycle.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Appointment Cell                        |
//! +--------------------------------------------------------------+
//! |  models.rs                 |  Appointments, requests, errors |
//! |  services/                 |                                 |
//! |    interval.rs             |  Interval merge / clamp / chunk |
//! |    conflict.rs             |  Provider overlap detection     |
//! |    availability.rs         |  Free slots per provider group  |
//! |    lifecycle.rs            |  create/update/cancel/reschedule|
//! |    locks.rs                |  Per-provider scheduling locks  |
//! |    outbox.rs               |  Post-commit side effects       |
//! |    audit.rs                |  Audit events and key policy    |
//! |    notifications.rs        |  Patient email / SMS messages   |
//! |    repository.rs           |  Store seam + in-memory store   |
//! |    supabase_repository.rs  |  PostgREST-backed store         |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use appointment_cell::models::{Actor, CreateAppointmentRequest};
//! use appointment_cell::services::{
//!     AppointmentLifecycleService, InMemoryAppointmentRepository, InMemoryPatientDirectory,
//!     RecordingNotifier, TracingAuditLogger,
//! };
//! use shared_config::SchedulingConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = AppointmentLifecycleService::new(
//!     Arc::new(InMemoryAppointmentRepository::new()),
//!     Arc::new(TracingAuditLogger::new()),
//!     Arc::new(RecordingNotifier::new()),
//!     Arc::new(InMemoryPatientDirectory::new()),
//!     SchedulingConfig::default(),
//! );
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let appointment = service
//!     .create(
//!         CreateAppointmentRequest {
//!             patient_id: 1,
//!             provider_id: 10,
//!             location: Some("Room 1".to_string()),
//!             service_type: None,
//!             start_time: start,
//!             end_time: start + chrono::Duration::minutes(30),
//!             notes: None,
//!         },
//!         &Actor::user(99),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod services;

pub use models::{
    Appointment, AppointmentAvailability, AppointmentError, AppointmentStatus, AvailabilitySlot,
    ConflictCode, Patch,
};

pub use services::{AppointmentLifecycleService, AvailabilityPlanner, ConflictDetectionService};
