//! Ticket verification and check-in at the door

mod helpers;

use assert_matches::assert_matches;
use helpers::*;
use serial_test::serial;

use eventdesk::config::TicketConfig;
use eventdesk::models::{CheckInOutcome, JobStatus, RegistrationStatus, UserRole};
use eventdesk::services::TicketService;
use eventdesk::EventDeskError;

#[tokio::test]
#[serial]
async fn test_first_scan_checks_in_and_schedules_follow_ups() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, Some(5)).await;
    let attendee = db.create_participants(1).await.remove(0);

    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();

    let result = services.checkin.check_in(&organizer, event.id, &token).await.unwrap();
    assert_matches!(result.outcome, CheckInOutcome::CheckedIn(_));
    assert_eq!(result.attendee.id, attendee.id);
    assert_eq!(result.outcome.log().scanned_by, organizer.id);

    let stored = db.service.registrations.find_by_id(registration.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RegistrationStatus::Attended);
    assert!(stored.attended_at.is_some());

    let follow_ups: Vec<(String, JobStatus, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT kind, status, run_at FROM jobs WHERE kind IN ('generate_certificate', 'send_survey') ORDER BY kind",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(follow_ups.len(), 2);
    assert_eq!(follow_ups[0].0, "generate_certificate");
    assert_eq!(follow_ups[1].0, "send_survey");
    for (_, status, run_at) in &follow_ups {
        assert_eq!(*status, JobStatus::Pending);
        assert_eq!(run_at.timestamp(), event.ends_at.timestamp());
    }
}

#[tokio::test]
#[serial]
async fn test_repeated_scan_is_idempotent() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);

    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();

    let first = services.checkin.check_in(&organizer, event.id, &token).await.unwrap();
    let second = services.checkin.check_in(&organizer, event.id, &token).await.unwrap();

    assert!(first.outcome.is_first_scan());
    assert_matches!(second.outcome, CheckInOutcome::AlreadyCheckedIn(_));
    assert_eq!(first.outcome.log().id, second.outcome.log().id);
    assert_eq!(db.count_records("attendance_logs").await.unwrap(), 1);
    assert_eq!(db.count_jobs("generate_certificate").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_ticket_from_before_reregistration_is_superseded() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);

    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let old_token = services.tickets.issue(&registration, &event).unwrap();
    services.events.cancel_registration(&attendee, event.id).await.unwrap();
    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let new_token = services.tickets.issue(&registration, &event).unwrap();

    let result = services.checkin.check_in(&organizer, event.id, &old_token).await;
    assert_matches!(result, Err(EventDeskError::InvalidTicket(reason)) if reason.contains("superseded"));

    let result = services.checkin.check_in(&organizer, event.id, &new_token).await.unwrap();
    assert!(result.outcome.is_first_scan());
}

#[tokio::test]
#[serial]
async fn test_cancelled_registration_cannot_check_in() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);

    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();
    services.events.cancel_registration(&attendee, event.id).await.unwrap();

    let result = services.checkin.check_in(&organizer, event.id, &token).await;
    assert_matches!(result, Err(EventDeskError::NotRegistered { .. }));
    assert_eq!(db.count_records("attendance_logs").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_forged_ticket_is_rejected() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);
    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();

    let forger = TicketService::new(&TicketConfig {
        signing_secret: "someone-else-entirely-different-secret-value".to_string(),
        ..settings.tickets.clone()
    });
    let forged = forger.issue(&registration, &event).unwrap();

    let result = services.checkin.check_in(&organizer, event.id, &forged).await;
    assert_matches!(result, Err(EventDeskError::InvalidTicket(_)));

    let result = services.checkin.check_in(&organizer, event.id, "not a ticket").await;
    assert_matches!(result, Err(EventDeskError::InvalidTicket(_)));
}

#[tokio::test]
#[serial]
async fn test_ticket_for_another_event_is_refused() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let other = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);

    let (registration, event) = services.events.register(&attendee, event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();

    let result = services.checkin.check_in(&organizer, other.id, &token).await;
    assert_matches!(result, Err(EventDeskError::TicketMismatch { expected_event_id }) if expected_event_id == other.id);
}

#[tokio::test]
#[serial]
async fn test_only_event_managers_can_scan() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(2).await;
    let other_organizer = db.create_user(900_000_002, UserRole::Organizer).await;
    let admin = db.create_user(900_000_003, UserRole::Admin).await;

    let (registration, event) = services.events.register(&users[0], event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();

    let result = services.checkin.check_in(&users[1], event.id, &token).await;
    assert_matches!(result, Err(EventDeskError::PermissionDenied(_)));

    let result = services.checkin.check_in(&other_organizer, event.id, &token).await;
    assert_matches!(result, Err(EventDeskError::PermissionDenied(_)));

    let result = services.checkin.check_in(&admin, event.id, &token).await.unwrap();
    assert!(result.outcome.is_first_scan());
}
