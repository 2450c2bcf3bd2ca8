mod common;

use assert_matches::assert_matches;
use serde_json::json;

use appointment_cell::models::{
    Actor, AppointmentError, AppointmentSearchQuery, AppointmentStatus, AvailabilitySlot,
    CancelAppointmentRequest, ConflictCode, HistoryStatus, Patch, RescheduleAppointmentRequest,
    UpdateAppointmentRequest,
};
use appointment_cell::services::audit::actions;
use appointment_cell::services::RecordingNotifier;

use common::{at, booking, staff, Harness, PATIENT, PROVIDER, ROOM};

// ==============================================================================
// CREATE
// ==============================================================================

#[tokio::test]
async fn non_overlapping_bookings_both_succeed() {
    let harness = Harness::new();

    let a = harness.book(at(9, 0), at(9, 30)).await;
    let b = harness.book(at(10, 0), at(10, 30)).await;

    assert_ne!(a.id, b.id);
    assert_eq!(a.status, AppointmentStatus::Scheduled);
    assert_eq!(b.created_by, Some(99));
    assert_eq!(harness.repository.len().await, 2);
}

#[tokio::test]
async fn overlapping_booking_is_rejected() {
    let harness = Harness::new();
    harness.book(at(9, 0), at(9, 30)).await;

    let result = harness
        .service
        .create(booking(PROVIDER, at(9, 15), at(9, 45)), &staff())
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, ref alternatives })
            if alternatives.is_empty()
    );
    assert_eq!(harness.repository.len().await, 1);
}

#[tokio::test]
async fn touching_bookings_do_not_overlap() {
    let harness = Harness::new();
    harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(9, 30), at(10, 0)).await;
    assert_eq!(harness.repository.len().await, 2);
}

#[tokio::test]
async fn other_providers_are_not_blocked() {
    let harness = Harness::new();
    harness.book(at(9, 0), at(9, 30)).await;

    let result = harness.service.create(booking(11, at(9, 0), at(9, 30)), &staff()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn inverted_or_empty_range_is_rejected_before_booking() {
    let harness = Harness::new();

    for (start, end) in [(at(10, 0), at(9, 0)), (at(10, 0), at(10, 0))] {
        let result = harness.service.create(booking(PROVIDER, start, end), &staff()).await;
        assert_matches!(
            result,
            Err(AppointmentError::Conflict { code: ConflictCode::InvalidTimeRange, .. })
        );
    }
    assert_eq!(harness.repository.len().await, 0);
}

#[tokio::test]
async fn cancelled_slot_can_be_booked_again() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    harness
        .service
        .cancel(a.id, CancelAppointmentRequest::default(), &staff())
        .await
        .unwrap();

    let again = harness.service.create(booking(PROVIDER, at(9, 0), at(9, 30)), &staff()).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn create_records_history_and_audit() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let details = harness.service.get(a.id, &Actor::system()).await.unwrap();
    assert_eq!(details.status_history.len(), 1);
    assert_eq!(details.status_history[0].status, HistoryStatus::Scheduled);
    assert_eq!(details.status_history[0].changed_by, Some(99));

    let events = harness.audit.entries_for_action(actions::CREATE).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].actor_id, Some(99));
    assert_eq!(events[0].resource_id.as_deref(), Some(a.id.to_string().as_str()));
    assert_eq!(events[0].metadata["patient_ref"], json!(format!("patient:{}", PATIENT)));
    assert_eq!(events[0].context["request_id"], json!("test-request"));
}

#[tokio::test]
async fn create_notifies_patient_with_contact_info() {
    let harness = Harness::new().with_patient_email().await;
    harness.book(at(9, 0), at(9, 30)).await;

    let sent = harness.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "aino@example.com");
    assert_eq!(sent[0].subject.as_deref(), Some("Appointment confirmed"));
    assert!(sent[0].body.contains("Aino Virtanen"));
}

#[tokio::test]
async fn notification_failure_does_not_fail_booking() {
    let harness = Harness::with_notifier(RecordingNotifier::failing()).with_patient_email().await;

    let result = harness.service.create(booking(PROVIDER, at(9, 0), at(9, 30)), &staff()).await;

    assert!(result.is_ok());
    assert_eq!(harness.repository.len().await, 1);
    let failed = harness.service.outbox().take_failed().await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event.kind(), "notification");
}

#[tokio::test]
async fn concurrent_bookings_for_same_slot_admit_exactly_one() {
    let harness = Harness::new();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let service = harness.service.clone();
            tokio::spawn(async move {
                service.create(booking(PROVIDER, at(9, 0), at(9, 30)), &staff()).await
            })
        })
        .collect();

    let mut booked = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(booked, 1);
    assert_eq!(rejected, 11);
    common::assert_no_overlaps(&harness.repository.all().await);
}

// ==============================================================================
// UPDATE
// ==============================================================================

#[tokio::test]
async fn update_touches_only_provided_fields() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let updated = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest {
                notes: Patch::Set("Bring lab results".to_string()),
                ..Default::default()
            },
            &staff(),
        )
        .await
        .unwrap();

    assert_eq!(updated.notes.as_deref(), Some("Bring lab results"));
    assert_eq!(updated.location.as_deref(), Some(ROOM));
    assert_eq!(updated.service_type.as_deref(), Some("consultation"));
    assert_eq!((updated.start_time, updated.end_time), (at(9, 0), at(9, 30)));

    let cleared = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { location: Patch::Clear, ..Default::default() },
            &staff(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.location, None);
    assert_eq!(cleared.notes.as_deref(), Some("Bring lab results"));

    // No status field, no new history entry.
    let details = harness.service.get(a.id, &staff()).await.unwrap();
    assert_eq!(details.status_history.len(), 1);
}

#[tokio::test]
async fn update_rechecks_overlap_excluding_itself() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(10, 0), at(10, 30)).await;

    let extended = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { end_time: Some(at(9, 45)), ..Default::default() },
            &staff(),
        )
        .await
        .unwrap();
    assert_eq!(extended.end_time, at(9, 45));

    let clash = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { end_time: Some(at(10, 15)), ..Default::default() },
            &staff(),
        )
        .await;
    assert_matches!(
        clash,
        Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, ref alternatives })
            if alternatives.is_empty()
    );

    let inverted = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { start_time: Some(at(10, 0)), ..Default::default() },
            &staff(),
        )
        .await;
    assert_matches!(
        inverted,
        Err(AppointmentError::Conflict { code: ConflictCode::InvalidTimeRange, .. })
    );
}

#[tokio::test]
async fn update_checks_the_new_provider_schedule() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.service.create(booking(11, at(9, 0), at(9, 30)), &staff()).await.unwrap();

    let result = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { provider_id: Some(11), ..Default::default() },
            &staff(),
        )
        .await;
    assert_matches!(result, Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, .. }));

    let moved = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest { provider_id: Some(12), ..Default::default() },
            &staff(),
        )
        .await
        .unwrap();
    assert_eq!(moved.provider_id, 12);
}

#[tokio::test]
async fn update_with_status_appends_history() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let updated = harness
        .service
        .update(
            a.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Cancelled),
                cancelled_reason: Patch::Set("Provider ill".to_string()),
                ..Default::default()
            },
            &staff(),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Cancelled);
    assert_eq!(updated.cancelled_reason.as_deref(), Some("Provider ill"));

    let history = harness.service.get(a.id, &staff()).await.unwrap().status_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, HistoryStatus::Cancelled);
    assert_eq!(history[0].note.as_deref(), Some("Provider ill"));

    let audit = harness.audit.entries_for_action(actions::UPDATE).await;
    assert_eq!(audit[0].metadata["status"], json!("cancelled"));
}

#[tokio::test]
async fn update_of_unknown_appointment_is_not_found() {
    let harness = Harness::new();
    let result = harness
        .service
        .update(404, UpdateAppointmentRequest::default(), &staff())
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

// ==============================================================================
// CANCEL
// ==============================================================================

#[tokio::test]
async fn cancel_stamps_reason_and_time() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let cancelled = harness
        .service
        .cancel(
            a.id,
            CancelAppointmentRequest { reason: Some("Patient request".to_string()), notify_patient: false },
            &staff(),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_reason.as_deref(), Some("Patient request"));
    assert!(cancelled.cancelled_at.is_some());

    let history = harness.service.get(a.id, &staff()).await.unwrap().status_history;
    assert_eq!(history[0].status, HistoryStatus::Cancelled);
    assert_eq!(history[0].note.as_deref(), Some("Patient request"));

    let audit = harness.audit.entries_for_action(actions::CANCEL).await;
    assert_eq!(audit[0].metadata["notify"], json!(false));
    assert_eq!(audit[0].metadata["reason"], json!("Patient request"));
}

#[tokio::test]
async fn cancel_notifies_only_when_requested() {
    let harness = Harness::new().with_patient_email().await;
    let a = harness.book(at(9, 0), at(9, 30)).await;
    let b = harness.book(at(10, 0), at(10, 30)).await;
    let after_booking = harness.notifier.sent().await.len();

    harness
        .service
        .cancel(a.id, CancelAppointmentRequest { reason: None, notify_patient: false }, &staff())
        .await
        .unwrap();
    assert_eq!(harness.notifier.sent().await.len(), after_booking);

    harness
        .service
        .cancel(
            b.id,
            CancelAppointmentRequest { reason: Some("Clinic closed".to_string()), notify_patient: true },
            &staff(),
        )
        .await
        .unwrap();

    let sent = harness.notifier.sent().await;
    assert_eq!(sent.len(), after_booking + 1);
    let last = sent.last().unwrap();
    assert_eq!(last.subject.as_deref(), Some("Appointment cancelled"));
    assert!(last.body.contains("Reason: Clinic closed"));
}

#[tokio::test]
async fn cancel_of_unknown_appointment_is_not_found() {
    let harness = Harness::new();
    let result = harness
        .service
        .cancel(404, CancelAppointmentRequest::default(), &staff())
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn reschedule_into_taken_slot_offers_alternatives() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    let b = harness.book(at(10, 0), at(10, 30)).await;

    let result = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest { start_time: at(10, 0), end_time: at(10, 30), reason: None },
            &staff(),
        )
        .await;

    let alternatives = match result {
        Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, alternatives }) => alternatives,
        other => panic!("expected provider overlap, got {:?}", other),
    };

    let taken = AvailabilitySlot { start_time: b.start_time, end_time: b.end_time };
    assert!(!alternatives.is_empty());
    assert!(alternatives.len() <= 5);
    assert!(!alternatives.contains(&taken));
    assert_eq!(alternatives[0], AvailabilitySlot { start_time: at(10, 30), end_time: at(11, 0) });
    for slot in &alternatives {
        assert_eq!(slot.end_time - slot.start_time, chrono::Duration::minutes(30));
        assert!(slot.start_time >= at(10, 0) && slot.end_time <= at(18, 0));
    }

    // The rejected move leaves the appointment untouched.
    let unchanged = harness.service.get(a.id, &staff()).await.unwrap().appointment;
    assert_eq!((unchanged.start_time, unchanged.end_time), (at(9, 0), at(9, 30)));
}

#[tokio::test]
async fn reschedule_alternatives_skip_bookings_at_other_locations() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(10, 0), at(10, 30)).await;

    let mut elsewhere = booking(PROVIDER, at(10, 30), at(11, 0));
    elsewhere.location = Some("Room 2".to_string());
    harness.service.create(elsewhere, &staff()).await.unwrap();

    let result = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest { start_time: at(10, 0), end_time: at(10, 30), reason: None },
            &staff(),
        )
        .await;

    match result {
        Err(AppointmentError::Conflict { alternatives, .. }) => {
            assert_eq!(alternatives[0].start_time, at(11, 0));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn alternatives_for_sub_minute_request_round_up_to_a_whole_minute() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(10, 0), at(10, 30)).await;

    let result = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest {
                start_time: at(10, 0),
                end_time: at(10, 0) + chrono::Duration::seconds(30),
                reason: None,
            },
            &staff(),
        )
        .await;

    match result {
        Err(AppointmentError::Conflict { alternatives, .. }) => {
            assert_eq!(alternatives.len(), 5);
            assert_eq!(alternatives[0], AvailabilitySlot { start_time: at(10, 30), end_time: at(10, 31) });
            assert!(alternatives
                .iter()
                .all(|slot| slot.end_time - slot.start_time == chrono::Duration::minutes(1)));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn request_longer_than_lookahead_gets_no_alternatives() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(10, 0), at(10, 30)).await;

    let result = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest { start_time: at(10, 0), end_time: at(19, 0), reason: None },
            &staff(),
        )
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::Conflict { code: ConflictCode::ProviderOverlap, ref alternatives })
            if alternatives.is_empty()
    );
}

#[tokio::test]
async fn reschedule_into_free_slot_records_previous_times() {
    let harness = Harness::new().with_patient_email().await;
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let moved = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest {
                start_time: at(14, 0),
                end_time: at(14, 45),
                reason: Some("Patient request".to_string()),
            },
            &staff(),
        )
        .await
        .unwrap();

    assert_eq!(moved.status, AppointmentStatus::Scheduled);
    assert_eq!((moved.start_time, moved.end_time), (at(14, 0), at(14, 45)));

    let history = harness.service.get(a.id, &staff()).await.unwrap().status_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, HistoryStatus::Rescheduled);
    let note = history[0].note.as_deref().unwrap();
    assert!(note.contains("from=2024-01-02T09:00:00"));
    assert!(note.contains("to=2024-01-02T09:30:00"));
    assert_eq!(
        note,
        "from=2024-01-02T09:00:00;to=2024-01-02T09:30:00;location=Room 1;reason=Patient request"
    );

    let audit = harness.audit.entries_for_action(actions::RESCHEDULE).await;
    assert_eq!(audit[0].metadata["previous_start"], json!("2024-01-02T09:00:00"));

    let sent = harness.notifier.sent().await;
    let last = sent.last().unwrap();
    assert_eq!(last.subject.as_deref(), Some("Appointment rescheduled"));
    assert!(last.body.contains("2024-01-02 09:00 - 2024-01-02 09:30"));
}

#[tokio::test]
async fn reschedule_overlapping_its_own_old_slot_is_allowed() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let moved = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest { start_time: at(9, 15), end_time: at(9, 45), reason: None },
            &staff(),
        )
        .await
        .unwrap();
    assert_eq!(moved.start_time, at(9, 15));
}

#[tokio::test]
async fn reschedule_validates_existence_then_range() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    let missing = harness
        .service
        .reschedule(
            404,
            RescheduleAppointmentRequest { start_time: at(11, 0), end_time: at(10, 0), reason: None },
            &staff(),
        )
        .await;
    assert_matches!(missing, Err(AppointmentError::NotFound));

    let inverted = harness
        .service
        .reschedule(
            a.id,
            RescheduleAppointmentRequest { start_time: at(11, 0), end_time: at(10, 0), reason: None },
            &staff(),
        )
        .await;
    assert_matches!(
        inverted,
        Err(AppointmentError::Conflict { code: ConflictCode::InvalidTimeRange, ref alternatives })
            if alternatives.is_empty()
    );
}

// ==============================================================================
// INVARIANTS
// ==============================================================================

#[tokio::test]
async fn no_two_active_appointments_overlap_after_mixed_operations() {
    let harness = Harness::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: u64| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed % bound
    };

    let mut ids = Vec::new();
    for _ in 0..200 {
        let provider = 10 + next(3) as i64;
        let start = at(8, 0) + chrono::Duration::minutes(15 * next(36) as i64);
        let end = start + chrono::Duration::minutes(15 * (1 + next(4)) as i64);

        match next(4) {
            0 | 1 => {
                if let Ok(created) = harness.service.create(booking(provider, start, end), &staff()).await {
                    ids.push(created.id);
                }
            }
            2 if !ids.is_empty() => {
                let id = ids[next(ids.len() as u64) as usize];
                let _ = harness
                    .service
                    .reschedule(id, RescheduleAppointmentRequest { start_time: start, end_time: end, reason: None }, &staff())
                    .await;
            }
            3 if !ids.is_empty() => {
                let id = ids[next(ids.len() as u64) as usize];
                let request = UpdateAppointmentRequest {
                    provider_id: Some(provider),
                    start_time: Some(start),
                    end_time: Some(end),
                    ..Default::default()
                };
                let _ = harness.service.update(id, request, &staff()).await;
            }
            _ => {}
        }
    }

    common::assert_no_overlaps(&harness.repository.all().await);
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[tokio::test]
async fn get_returns_history_newest_first() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness
        .service
        .reschedule(a.id, RescheduleAppointmentRequest { start_time: at(11, 0), end_time: at(11, 30), reason: None }, &staff())
        .await
        .unwrap();
    harness
        .service
        .cancel(a.id, CancelAppointmentRequest::default(), &staff())
        .await
        .unwrap();

    let details = harness.service.get(a.id, &staff()).await.unwrap();
    let statuses: Vec<_> = details.status_history.iter().map(|entry| entry.status).collect();
    assert_eq!(
        statuses,
        vec![HistoryStatus::Cancelled, HistoryStatus::Rescheduled, HistoryStatus::Scheduled]
    );
    assert_eq!(details.appointment.status, AppointmentStatus::Cancelled);

    assert_matches!(harness.service.get(404, &staff()).await, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn reads_are_audited_only_for_identified_actors() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;

    harness.service.get(a.id, &Actor::system()).await.unwrap();
    assert!(harness.audit.entries_for_action(actions::READ).await.is_empty());

    harness.service.get(a.id, &staff()).await.unwrap();
    assert_eq!(harness.audit.entries_for_action(actions::READ).await.len(), 1);
}

#[tokio::test]
async fn list_pages_newest_first_and_clamps_page_size() {
    let harness = Harness::new();
    for hour in [9, 10, 11] {
        harness.book(at(hour, 0), at(hour, 30)).await;
    }
    harness.service.create(booking(11, at(9, 0), at(9, 30)), &staff()).await.unwrap();

    let query = AppointmentSearchQuery {
        provider_id: Some(PROVIDER),
        page: Some(1),
        page_size: Some(2),
        ..Default::default()
    };
    let first = harness.service.list(&query, &staff()).await.unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].start_time, at(11, 0));
    assert_eq!(first.items[1].start_time, at(10, 0));

    let second = harness
        .service
        .list(&AppointmentSearchQuery { page: Some(2), ..query.clone() }, &staff())
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].start_time, at(9, 0));

    let clamped = harness
        .service
        .list(&AppointmentSearchQuery { page_size: Some(10_000), ..Default::default() }, &staff())
        .await
        .unwrap();
    assert_eq!(clamped.page_size, 100);
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.total, 4);

    let audit = harness.audit.entries_for_action(actions::LIST).await;
    assert_eq!(audit.len(), 3);
    assert_eq!(audit[0].metadata["returned"], json!(2));
}

#[tokio::test]
async fn list_filters_by_time_window_and_status() {
    let harness = Harness::new();
    let a = harness.book(at(9, 0), at(9, 30)).await;
    harness.book(at(10, 0), at(10, 30)).await;
    harness.book(at(12, 0), at(12, 30)).await;
    harness
        .service
        .cancel(a.id, CancelAppointmentRequest::default(), &staff())
        .await
        .unwrap();

    let window = AppointmentSearchQuery {
        start_from: Some(at(9, 0)),
        end_to: Some(at(11, 0)),
        ..Default::default()
    };
    let page = harness.service.list(&window, &Actor::system()).await.unwrap();
    assert_eq!(page.total, 2);

    let scheduled_only = AppointmentSearchQuery { status: Some(AppointmentStatus::Scheduled), ..window };
    let page = harness.service.list(&scheduled_only, &Actor::system()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].start_time, at(10, 0));
}
