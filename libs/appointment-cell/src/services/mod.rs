// libs/appointment-cell/src/services/mod.rs

pub mod audit;
pub mod availability;
pub mod conflict;
pub mod interval;
pub mod lifecycle;
pub mod locks;
pub mod notifications;
pub mod outbox;
pub mod repository;
pub mod supabase_repository;

pub use audit::{AuditEvent, AuditLogger, AuditPolicy, TracingAuditLogger};
pub use availability::{AvailabilityPlanner, GroupingMode};
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use locks::ProviderLocks;
pub use notifications::{
    InMemoryPatientDirectory, NotificationDispatcher, NotificationMessage, Notifier,
    PatientContact, PatientDirectory, RecordingNotifier,
};
pub use outbox::{DispatchReport, EventOutbox, OutboxEvent};
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository, RangeFilter};
pub use supabase_repository::SupabaseAppointmentRepository;
