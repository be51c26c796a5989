//! Certificates of attendance and post-event surveys

mod helpers;

use assert_matches::assert_matches;
use helpers::*;
use serial_test::serial;

use eventdesk::models::{Event, EventRegistration, User};
use eventdesk::EventDeskError;

/// Register `attendee` and scan their ticket
async fn attend(services: &TestServices, organizer: &User, attendee: &User, event: &Event) -> EventRegistration {
    let (registration, event) = services.events.register(attendee, event.id).await.unwrap();
    let token = services.tickets.issue(&registration, &event).unwrap();
    services.checkin.check_in(organizer, event.id, &token).await.unwrap();
    registration
}

#[tokio::test]
#[serial]
async fn test_certificates_are_numbered_per_event() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(2).await;

    let first = attend(&services, &organizer, &users[0], &event).await;
    let second = attend(&services, &organizer, &users[1], &event).await;

    let (issued, holder) = services.certificates.issue_for_registration(first.id).await.unwrap();
    assert!(issued.newly_issued);
    assert_eq!(holder.id, users[0].id);
    assert_eq!(issued.certificate.certificate_number, format!("CERT-{:05}-0001", event.id));
    assert_eq!(issued.file_name, format!("CERT-{:05}-0001.txt", event.id));
    assert!(issued.document.contains("Rust Meetup"));
    assert!(issued.document.contains(&issued.certificate.verification_code.to_string()));

    let (issued, _) = services.certificates.issue_for_registration(second.id).await.unwrap();
    assert_eq!(issued.certificate.sequence_number, 2);

    let stored = db.service.events.find_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored.certificates_issued, 2);
}

#[tokio::test]
#[serial]
async fn test_reissuing_returns_the_same_certificate() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);
    let registration = attend(&services, &organizer, &attendee, &event).await;

    let (first, _) = services.certificates.issue_for_registration(registration.id).await.unwrap();
    let (again, _) = services.certificates.issue_for_registration(registration.id).await.unwrap();

    assert!(!again.newly_issued);
    assert_eq!(first.certificate.id, again.certificate.id);
    assert_eq!(first.certificate.verification_code, again.certificate.verification_code);
    assert_eq!(db.count_records("certificates").await.unwrap(), 1);

    let listed = services.certificates.list_for_user(&attendee).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].event_title, "Rust Meetup");

    let found = db
        .service
        .certificates
        .find_by_verification_code(first.certificate.verification_code)
        .await
        .unwrap();
    assert_eq!(found.map(|c| c.id), Some(first.certificate.id));
}

#[tokio::test]
#[serial]
async fn test_no_certificate_without_attendance() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let user = db.create_participants(1).await.remove(0);
    let (registration, _) = services.events.register(&user, event.id).await.unwrap();

    let result = services.certificates.issue_for_registration(registration.id).await;
    assert_matches!(result, Err(EventDeskError::InvalidStateTransition { .. }));

    let result = services.certificates.issue_for_registration(424_242).await;
    assert_matches!(result, Err(EventDeskError::RegistrationNotFound { registration_id: 424_242 }));
    assert_eq!(db.count_records("certificates").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_survey_answers_are_upserted() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(2).await;
    attend(&services, &organizer, &users[0], &event).await;
    attend(&services, &organizer, &users[1], &event).await;

    services.surveys.record_rating(&users[0], event.id, 2).await.unwrap();
    let changed = services.surveys.record_rating(&users[0], event.id, 4).await.unwrap();
    assert_eq!(changed.rating, 4);
    services.surveys.record_rating(&users[1], event.id, 5).await.unwrap();

    let commented = services
        .surveys
        .add_comment(&users[0], event.id, "  Great talks  ")
        .await
        .unwrap();
    assert_eq!(commented.rating, 4);
    assert_eq!(commented.comment.as_deref(), Some("Great talks"));

    let summary = services.surveys.summary(event.id).await.unwrap();
    assert_eq!(summary.responses, 2);
    assert_eq!(summary.average_rating, Some(4.5));
}

#[tokio::test]
#[serial]
async fn test_survey_rules() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let users = db.create_participants(2).await;
    attend(&services, &organizer, &users[0], &event).await;
    services.events.register(&users[1], event.id).await.unwrap();

    // Registered but never scanned
    let result = services.surveys.record_rating(&users[1], event.id, 5).await;
    assert_matches!(result, Err(EventDeskError::PermissionDenied(_)));

    let result = services.surveys.record_rating(&users[0], event.id, 6).await;
    assert_matches!(result, Err(EventDeskError::InvalidInput(_)));

    let result = services.surveys.add_comment(&users[0], event.id, "Before rating").await;
    assert_matches!(result, Err(EventDeskError::InvalidInput(_)));

    assert_eq!(db.count_records("survey_responses").await.unwrap(), 0);
    let summary = services.surveys.summary(event.id).await.unwrap();
    assert_eq!(summary.responses, 0);
    assert_eq!(summary.average_rating, None);
}

#[tokio::test]
#[serial]
async fn test_certificate_is_verified_by_its_code() {
    let db = TestDatabase::new().await.expect("Failed to create test database");
    let settings = test_settings();
    let services = TestServices::new(&db.service, &settings);
    let organizer = db.create_organizer().await;
    let event = db.create_published_event(&organizer, None).await;
    let attendee = db.create_participants(1).await.remove(0);
    let registration = attend(&services, &organizer, &attendee, &event).await;
    let (issued, _) = services.certificates.issue_for_registration(registration.id).await.unwrap();
    let code = issued.certificate.verification_code.to_string();
    assert!(issued.document.contains(&format!("/verify {}", code)));

    let found = services
        .certificates
        .verify(&format!("  {}  ", code))
        .await
        .unwrap()
        .expect("certificate should be found");
    assert_eq!(found.certificate.id, issued.certificate.id);
    assert_eq!(found.holder_name, attendee.display_name());
    assert_eq!(found.event_title, "Rust Meetup");

    let unknown = services.certificates.verify("00000000-0000-0000-0000-000000000000").await.unwrap();
    assert!(unknown.is_none());

    let result = services.certificates.verify("CERT-00001-0001").await;
    assert_matches!(result, Err(EventDeskError::InvalidInput(_)));
}
