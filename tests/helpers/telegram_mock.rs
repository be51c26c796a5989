//! Mock Telegram Bot API server
//!
//! A wiremock server answering the methods the bot calls, plus a `Bot`
//! pointed at it.

use serde_json::{json, Value};
use teloxide::Bot;
use wiremock::{
    matchers::{method, path_regex},
    Mock, MockServer, ResponseTemplate,
};

use super::test_bot_token;

pub struct TelegramMockServer {
    pub server: MockServer,
}

impl TelegramMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Bot sending every request to this server
    pub fn bot(&self) -> Bot {
        let url = url::Url::parse(&self.server.uri()).expect("Mock server URI is a valid URL");
        Bot::new(test_bot_token()).set_api_url(url)
    }

    fn method_path(name: &str) -> String {
        format!("/bot{}/{}", test_bot_token(), name)
    }

    /// teloxide spells methods `SendMessage`, the Bot API docs `sendMessage`
    fn method_matcher(name: &str) -> String {
        format!("(?i)^{}$", regex::escape(&Self::method_path(name)))
    }

    /// Answer sendMessage successfully
    pub async fn mock_send_message(&self) {
        Mock::given(method("POST"))
            .and(path_regex(Self::method_matcher("sendMessage")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": message_json(json!({ "text": "ok" })),
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer sendMessage as if the recipient blocked the bot
    pub async fn mock_send_message_blocked(&self) {
        Mock::given(method("POST"))
            .and(path_regex(Self::method_matcher("sendMessage")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user",
            })))
            .mount(&self.server)
            .await;
    }

    /// Bodies of every request received for `name`
    pub async fn requests_for(&self, name: &str) -> Vec<Value> {
        let wanted = Self::method_path(name);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path().eq_ignore_ascii_case(&wanted))
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }
}

/// Minimal private-chat message with the given extra fields
fn message_json(extra: Value) -> Value {
    let mut message = json!({
        "message_id": 1,
        "date": 1_700_000_000,
        "chat": { "id": 42, "type": "private", "first_name": "Test" },
        "from": { "id": 12345, "is_bot": true, "first_name": "EventDesk", "username": "eventdesk_bot" },
    });
    if let (Some(target), Value::Object(fields)) = (message.as_object_mut(), extra) {
        target.extend(fields);
    }
    message
}
