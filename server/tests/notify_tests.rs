use std::collections::BTreeMap;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use telehealth_server::config::FcmConfig;
use telehealth_server::notify::{NotifyError, PushMessage, PushNotifier};

fn notifier(server: &MockServer) -> PushNotifier {
    PushNotifier::new(&FcmConfig {
        server_key: Some("srv-key".to_string()),
        endpoint: format!("{}/fcm/send", server.uri()),
    })
}

fn message() -> PushMessage {
    PushMessage {
        title: "Dr. Khan".to_string(),
        body: "Your results are in".to_string(),
        data: BTreeMap::from([("type".to_string(), "chat".to_string())]),
    }
}

#[tokio::test]
async fn push_uses_server_key_and_legacy_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "key=srv-key"))
        .and(body_partial_json(json!({
            "to": "device-1",
            "notification": { "title": "Dr. Khan", "body": "Your results are in" },
            "data": { "type": "chat" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let sent = notifier(&server).send("device-1", &message()).await.unwrap();
    assert!(sent);
}

#[tokio::test]
async fn rejected_push_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = notifier(&server).send("device-1", &message()).await;
    assert!(matches!(result, Err(NotifyError::Status(status)) if status.as_u16() == 401));
}
