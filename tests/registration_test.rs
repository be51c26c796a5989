//! Registration flow against a real database

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use futures::future::join_all;
use helpers::*;
use serial_test::serial;

use eventdesk::models::{EventStatus, RegistrationStatus, UpdateEventRequest};
use eventdesk::EventDeskError;

#[tokio::test]
#[serial]
async fn test_concurrent_registrations_never_exceed_capacity() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, Some(3)).await;
    let participants = db.create_participants(10).await;

    let attempts = participants.iter().map(|user| {
        let registrations = db.service.registrations.clone();
        let (event_id, user_id) = (event.id, user.id);
        async move { registrations.register(event_id, user_id).await }
    });
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 3);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(EventDeskError::EventFull { capacity: 3, .. }));
    }

    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 3);
    assert_eq!(db.service.registrations.list_active(event.id).await.unwrap().len(), 3);
}

#[tokio::test]
#[serial]
async fn test_duplicate_registration_is_rejected() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, Some(10)).await;
    let user = db.create_participants(1).await.remove(0);

    db.service.registrations.register(event.id, user.id).await.unwrap();
    let second = db.service.registrations.register(event.id, user.id).await;

    assert_matches!(second, Err(EventDeskError::AlreadyRegistered { .. }));
    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 1);
}

#[tokio::test]
#[serial]
async fn test_cancel_and_register_again_rotates_ticket_nonce() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, Some(1)).await;
    let user = db.create_participants(1).await.remove(0);

    let (first, _) = db.service.registrations.register(event.id, user.id).await.unwrap();
    let cancelled = db.service.registrations.cancel(event.id, user.id).await.unwrap();
    assert_eq!(cancelled.status, RegistrationStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 0);

    let (again, event_after) = db.service.registrations.register(event.id, user.id).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.status, RegistrationStatus::Registered);
    assert_ne!(again.ticket_nonce, first.ticket_nonce);
    assert!(again.cancelled_at.is_none());
    assert_eq!(event_after.current_participants, 1);
}

#[tokio::test]
#[serial]
async fn test_cancel_without_registration() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let user = db.create_participants(1).await.remove(0);

    let result = db.service.registrations.cancel(event.id, user.id).await;
    assert_matches!(result, Err(EventDeskError::NotRegistered { .. }));
}

#[tokio::test]
#[serial]
async fn test_attended_registration_cannot_be_cancelled() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let user = db.create_participants(1).await.remove(0);

    let (registration, _) = db.service.registrations.register(event.id, user.id).await.unwrap();
    db.service
        .attendance
        .check_in(registration.id, event.id, user.id, organizer.id)
        .await
        .unwrap();

    let result = db.service.registrations.cancel(event.id, user.id).await;
    assert_matches!(result, Err(EventDeskError::InvalidStateTransition { .. }));

    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 1);
}

#[tokio::test]
#[serial]
async fn test_registration_requires_open_event() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let user = db.create_participants(1).await.remove(0);
    let starts_at = Utc::now() + Duration::days(1);

    let draft = db
        .create_event(&organizer, starts_at, starts_at + Duration::hours(1), None, EventStatus::Draft)
        .await;
    let result = db.service.registrations.register(draft.id, user.id).await;
    assert_matches!(result, Err(EventDeskError::EventNotOpen { status, .. }) if status == "draft");

    let cancelled = db
        .create_event(&organizer, starts_at, starts_at + Duration::hours(1), None, EventStatus::Cancelled)
        .await;
    let result = db.service.registrations.register(cancelled.id, user.id).await;
    assert_matches!(result, Err(EventDeskError::EventNotOpen { status, .. }) if status == "cancelled");

    let past_start = Utc::now() - Duration::days(2);
    let ended = db
        .create_event(&organizer, past_start, past_start + Duration::hours(1), None, EventStatus::Published)
        .await;
    let result = db.service.registrations.register(ended.id, user.id).await;
    assert_matches!(result, Err(EventDeskError::EventNotOpen { status, .. }) if status == "ended");

    let result = db.service.registrations.register(999_999, user.id).await;
    assert_matches!(result, Err(EventDeskError::EventNotFound { event_id: 999_999 }));

    assert_eq!(db.count_records("event_registrations").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_unlimited_event_accepts_everyone() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;

    for user in db.create_participants(5).await {
        db.service.registrations.register(event.id, user.id).await.unwrap();
    }

    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 5);
    assert_eq!(stored.max_participants, None);
}

#[tokio::test]
#[serial]
async fn test_register_schedules_a_single_reminder() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;

    for user in db.create_participants(3).await {
        services.events.register(&user, event.id).await.unwrap();
    }

    assert_eq!(db.count_jobs("event_reminder").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_banned_user_cannot_register() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let user = db.create_participants(1).await.remove(0);
    let banned = db.service.users.set_ban_status(user.id, true).await.unwrap();

    let result = services.events.register(&banned, event.id).await;
    assert_matches!(result, Err(EventDeskError::UserBanned { .. }));
}

#[tokio::test]
#[serial]
async fn test_cancel_event_notifies_active_registrations() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(3).await;

    for user in &users {
        services.events.register(user, event.id).await.unwrap();
    }
    services.events.cancel_registration(&users[2], event.id).await.unwrap();

    let cancelled = services.events.cancel_event(&organizer, event.id).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);
    assert_eq!(db.count_jobs("send_notification").await.unwrap(), 2);

    // Cancelled is terminal
    let again = services.events.publish_event(&organizer, event.id).await;
    assert_matches!(again, Err(EventDeskError::InvalidStateTransition { .. }));
}

#[tokio::test]
#[serial]
async fn test_capacity_cannot_drop_below_participants() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, Some(10)).await;

    for user in db.create_participants(2).await {
        services.events.register(&user, event.id).await.unwrap();
    }

    let shrink = |max| UpdateEventRequest {
        max_participants: Some(max),
        ..UpdateEventRequest::default()
    };
    let refused = services.events.update_event(&organizer, event.id, shrink(1)).await;
    assert_matches!(refused, Err(EventDeskError::InvalidInput(_)));

    let updated = services.events.update_event(&organizer, event.id, shrink(2)).await.unwrap();
    assert_eq!(updated.max_participants, Some(2));
    assert!(updated.is_full());
}

#[tokio::test]
#[serial]
async fn test_only_drafts_can_be_deleted() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let published = db.create_published_event(&organizer, None).await;
    let starts_at = Utc::now() + Duration::days(5);
    let draft = db
        .create_event(&organizer, starts_at, starts_at + Duration::hours(1), None, EventStatus::Draft)
        .await;

    let result = services.events.delete_event(&organizer, published.id).await;
    assert_matches!(result, Err(EventDeskError::InvalidStateTransition { .. }));

    services.events.delete_event(&organizer, draft.id).await.unwrap();
    assert!(db.service.events.find_by_id(draft.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_recount_repairs_a_drifted_counter() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(3).await;
    for user in &users {
        services.events.register(user, event.id).await.unwrap();
    }
    services.events.cancel_registration(&users[2], event.id).await.unwrap();

    sqlx::query("UPDATE events SET current_participants = 7 WHERE id = $1")
        .bind(event.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let result = services.events.recount_participants(&users[0], event.id).await;
    assert_matches!(result, Err(EventDeskError::PermissionDenied(_)));

    let count = services.events.recount_participants(&organizer, event.id).await.unwrap();
    assert_eq!(count, 2);
    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 2);
}

#[tokio::test]
#[serial]
async fn test_moving_an_event_moves_its_pending_jobs() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(2).await;

    let (registration, event) = services.events.register(&users[0], event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();
    services.checkin.check_in(&organizer, event.id, &token).await.unwrap();

    let postponed = UpdateEventRequest {
        starts_at: Some(event.starts_at + Duration::days(7)),
        ends_at: Some(event.ends_at + Duration::days(7)),
        ..UpdateEventRequest::default()
    };
    let moved = services.events.update_event(&organizer, event.id, postponed).await.unwrap();
    services.events.register(&users[1], event.id).await.unwrap();

    let jobs: Vec<(String, chrono::DateTime<Utc>)> = sqlx::query_as(
        "SELECT kind, run_at FROM jobs WHERE status = 'pending' ORDER BY kind",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap();
    let reminder_at = moved.starts_at - Duration::hours(settings.jobs.reminder_hours_before);
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].0, "event_reminder");
    assert_eq!(jobs[0].1.timestamp(), reminder_at.timestamp());
    for (kind, run_at) in &jobs[1..] {
        assert!(kind == "generate_certificate" || kind == "send_survey");
        assert_eq!(run_at.timestamp(), moved.ends_at.timestamp());
    }

    // Brought forward inside the reminder window: the reminder becomes due now
    let starts_at = Utc::now() + Duration::hours(2);
    let brought_forward = UpdateEventRequest {
        starts_at: Some(starts_at),
        ends_at: Some(starts_at + Duration::hours(2)),
        ..UpdateEventRequest::default()
    };
    services.events.update_event(&organizer, event.id, brought_forward).await.unwrap();
    let (run_at,): (chrono::DateTime<Utc>,) =
        sqlx::query_as("SELECT run_at FROM jobs WHERE kind = 'event_reminder' AND status = 'pending'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert!(run_at <= Utc::now());
    assert_eq!(db.count_jobs("event_reminder").await.unwrap(), 1);
}
