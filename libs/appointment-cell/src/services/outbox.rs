// libs/appointment-cell/src/services/outbox.rs
//
// Post-commit side effects. Lifecycle operations enqueue audit and notification
// events after the store write and flush them once the write has succeeded.
// Delivery failures are logged and retained, never returned to the caller.
// Retention is bounded; the oldest failure is dropped first.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::services::audit::{AuditEvent, AuditLogger};
use crate::services::notifications::{NotificationDispatcher, NotificationEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum OutboxEvent {
    Audit(AuditEvent),
    Notify(NotificationEvent),
}

impl OutboxEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboxEvent::Audit(_) => "audit",
            OutboxEvent::Notify(_) => "notification",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedEvent {
    pub event: OutboxEvent,
    pub error: String,
}

pub const DEFAULT_FAILED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct EventOutbox {
    audit: Arc<dyn AuditLogger>,
    notifications: NotificationDispatcher,
    pending: Mutex<VecDeque<OutboxEvent>>,
    failed: Mutex<VecDeque<FailedEvent>>,
    failed_capacity: usize,
}

impl EventOutbox {
    pub fn new(audit: Arc<dyn AuditLogger>, notifications: NotificationDispatcher) -> Self {
        Self {
            audit,
            notifications,
            pending: Mutex::new(VecDeque::new()),
            failed: Mutex::new(VecDeque::new()),
            failed_capacity: DEFAULT_FAILED_CAPACITY,
        }
    }

    /// Caps how many failed events are kept for `take_failed`.
    pub fn with_failed_capacity(mut self, capacity: usize) -> Self {
        self.failed_capacity = capacity;
        self
    }

    pub async fn enqueue_all(&self, events: impl IntoIterator<Item = OutboxEvent>) {
        self.pending.lock().await.extend(events);
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Dispatches every queued event in FIFO order.
    pub async fn flush(&self) -> DispatchReport {
        let batch: Vec<OutboxEvent> = self.pending.lock().await.drain(..).collect();
        let mut report = DispatchReport::default();

        for event in batch {
            match self.dispatch(&event).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!("Post-commit {} event failed: {}", event.kind(), error);
                    report.failed += 1;
                    self.retain_failure(FailedEvent { event, error }).await;
                }
            }
        }

        if report.delivered + report.failed > 0 {
            debug!("Outbox flushed: {} delivered, {} failed", report.delivered, report.failed);
        }
        report
    }

    /// Drains the retained failures, oldest first, e.g. for a retry job.
    pub async fn take_failed(&self) -> Vec<FailedEvent> {
        self.failed.lock().await.drain(..).collect()
    }

    async fn retain_failure(&self, failure: FailedEvent) {
        let mut failed = self.failed.lock().await;
        while failed.len() >= self.failed_capacity.max(1) {
            if let Some(dropped) = failed.pop_front() {
                warn!("Failed-event retention full, dropping oldest {} event", dropped.event.kind());
            }
        }
        failed.push_back(failure);
    }

    async fn dispatch(&self, event: &OutboxEvent) -> Result<(), String> {
        match event {
            OutboxEvent::Audit(audit_event) => self
                .audit
                .record(audit_event)
                .await
                .map_err(|e| e.to_string()),
            OutboxEvent::Notify(notification) => self
                .notifications
                .deliver(notification)
                .await
                .map(|messages| {
                    debug!("Delivered {} notification messages for appointment {}",
                           messages.len(), notification.appointment.id);
                })
                .map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Actor;
    use crate::services::audit::{actions, AuditMetadata, TracingAuditLogger};
    use crate::services::notifications::{InMemoryPatientDirectory, RecordingNotifier};

    fn outbox(audit: Arc<TracingAuditLogger>) -> EventOutbox {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingNotifier::new()),
            Arc::new(InMemoryPatientDirectory::new()),
        );
        EventOutbox::new(audit, dispatcher)
    }

    #[tokio::test]
    async fn failures_are_counted_and_retained() {
        let audit = Arc::new(TracingAuditLogger::new());
        let outbox = outbox(audit.clone());
        let actor = Actor::user(1);

        outbox
            .enqueue_all(vec![
                OutboxEvent::Audit(AuditEvent::appointment(&actor, actions::CREATE, Some(1), AuditMetadata::for_patient(2).build())),
                OutboxEvent::Audit(AuditEvent::appointment(&actor, actions::CREATE, Some(1), AuditMetadata::new().with("ssn", "x").build())),
            ])
            .await;

        let report = outbox.flush().await;
        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(outbox.pending_len().await, 0);
        assert_eq!(audit.entries().await.len(), 1);

        let failed = outbox.take_failed().await;
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.contains("ssn"));
        assert!(outbox.take_failed().await.is_empty());
    }

    #[tokio::test]
    async fn retained_failures_are_capped_oldest_first() {
        let outbox = outbox(Arc::new(TracingAuditLogger::new())).with_failed_capacity(2);
        let actor = Actor::user(1);

        let rejected = (1..=3).map(|id| {
            OutboxEvent::Audit(AuditEvent::appointment(&actor, actions::CANCEL, Some(id), AuditMetadata::new().with("ssn", "x").build()))
        });
        outbox.enqueue_all(rejected).await;

        assert_eq!(outbox.flush().await.failed, 3);
        let failed = outbox.take_failed().await;
        let ids: Vec<_> = failed
            .iter()
            .map(|failure| match &failure.event {
                OutboxEvent::Audit(event) => event.resource_id.clone(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec![Some("2".to_string()), Some("3".to_string())]);
    }

    #[test]
    fn flushing_an_empty_outbox_is_a_no_op() {
        let outbox = outbox(Arc::new(TracingAuditLogger::new()));
        assert_eq!(tokio_test::block_on(outbox.flush()), DispatchReport::default());
    }
}
