//! Outgoing messages against a mock Telegram Bot API

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use helpers::*;
use serial_test::serial;
use teloxide::{ApiError, RequestError};

use eventdesk::i18n::params;
use eventdesk::jobs::processors::is_permanent_delivery_failure;
use eventdesk::models::{Event, EventStatus};
use eventdesk::services::NotificationService;
use eventdesk::EventDeskError;

fn sample_event(id: i64) -> Event {
    let starts_at = Utc::now() + Duration::days(1);
    Event {
        id,
        title: "Rust Meetup".to_string(),
        description: None,
        venue: Some("Hall A".to_string()),
        starts_at,
        ends_at: starts_at + Duration::hours(2),
        max_participants: None,
        current_participants: 0,
        status: EventStatus::Published,
        certificates_issued: 0,
        created_by: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
#[serial]
async fn test_notify_translates_and_escapes_params() {
    let mock = TelegramMockServer::new().await;
    mock.mock_send_message().await;
    let settings = test_settings();
    let service = NotificationService::new(mock.bot(), test_i18n(&settings), settings);
    let user = detached_user(1, 4242, "ru");

    service
        .notify(
            &user,
            "notifications.event_cancelled",
            Some(&params([("title", "<Rust> & Co")])),
        )
        .await
        .unwrap();

    let requests = mock.requests_for("sendMessage").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["chat_id"], 4242);
    assert_eq!(requests[0]["parse_mode"], "HTML");
    let text = requests[0]["text"].as_str().unwrap();
    assert!(text.contains("отменено"));
    assert!(text.contains("<b>&lt;Rust&gt; &amp; Co</b>"));
}

#[tokio::test]
#[serial]
async fn test_blocked_recipient_is_a_permanent_failure() {
    let mock = TelegramMockServer::new().await;
    mock.mock_send_message_blocked().await;
    let settings = test_settings();
    let service = NotificationService::new(mock.bot(), test_i18n(&settings), settings);
    let user = detached_user(1, 4242, "en");

    let result = service.notify(&user, "surveys.thanks", None).await;

    assert_matches!(result, Err(EventDeskError::Telegram(RequestError::Api(ApiError::BotBlocked))));
    if let Err(EventDeskError::Telegram(error)) = result {
        assert!(is_permanent_delivery_failure(&error));
    }
    assert_eq!(mock.requests_for("sendMessage").await[0]["chat_id"], 4242);
}

#[tokio::test]
#[serial]
async fn test_survey_prompt_carries_rating_buttons() {
    let mock = TelegramMockServer::new().await;
    mock.mock_send_message().await;
    let settings = test_settings();
    let service = NotificationService::new(mock.bot(), test_i18n(&settings), settings);
    let user = detached_user(1, 4242, "en");

    service.send_survey(&user, &sample_event(7)).await.unwrap();

    let requests = mock.requests_for("sendMessage").await;
    let body = requests[0].to_string();
    assert!(requests[0]["text"].as_str().unwrap().contains("Rust Meetup"));
    for rating in 1..=5 {
        assert!(body.contains(&format!("survey:7:{}", rating)));
    }
}

#[tokio::test]
#[serial]
async fn test_notify_many_counts_deliveries() {
    let mock = TelegramMockServer::new().await;
    mock.mock_send_message().await;
    let settings = test_settings();
    let service = NotificationService::new(mock.bot(), test_i18n(&settings), settings);
    let users = vec![detached_user(1, 11, "en"), detached_user(2, 12, "ru")];

    let outcome = service
        .notify_many(&users, "notifications.event_reminder", Some(&params([
            ("title", "Rust Meetup"),
            ("starts_at", "2030-05-17 18:00 UTC"),
            ("venue", "Hall A"),
        ])))
        .await;

    assert_eq!((outcome.sent, outcome.failed), (2, 0));
    assert_eq!(mock.requests_for("sendMessage").await.len(), 2);
}

#[tokio::test]
#[serial]
async fn test_admin_alerts_go_to_every_configured_admin() {
    let mock = TelegramMockServer::new().await;
    mock.mock_send_message().await;
    let mut settings = test_settings();
    settings.bot.admin_ids = vec![501, 502];
    let service = NotificationService::new(mock.bot(), test_i18n(&settings), settings);

    let outcome = service.notify_admins("Job #3 failed").await;

    assert_eq!(outcome.sent, 2);
    let chats: Vec<i64> = mock
        .requests_for("sendMessage")
        .await
        .iter()
        .filter_map(|body| body["chat_id"].as_i64())
        .collect();
    assert_eq!(chats, vec![501, 502]);
}
