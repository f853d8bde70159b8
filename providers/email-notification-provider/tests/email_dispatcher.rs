use airquality_common::{AlertDispatcher, AlertNotice, DispatchError, RiskLevel, RiskSignal};
use chrono::Utc;
use email_notification_provider::{EmailAlertDispatcher, EmailConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmailConfig {
    EmailConfig {
        resend_api_key: "re_test".to_string(),
        resend_base_url: Some(server.uri()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dispatch_sends_alert_with_idempotency_key() {
    let mock_server = MockServer::start().await;
    let notice = AlertNotice::new(
        42,
        52.5,
        13.4,
        RiskSignal::categorical(RiskLevel::Poor),
        Utc::now(),
    );

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Idempotency-Key", notice.alert_id.to_string().as_str()))
        .and(body_partial_json(serde_json::json!({
            "to": ["a@x.com"],
            "subject": "Air Quality Alert: POOR"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg-42"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = EmailAlertDispatcher::new(&config_for(&mock_server)).unwrap();
    assert_eq!(dispatcher.channel(), "email");

    let receipt = dispatcher.send_alert("a@x.com", &notice).await.unwrap();
    assert_eq!(receipt.message_id.as_deref(), Some("msg-42"));
}

#[tokio::test]
async fn test_invalid_destination_never_reaches_resend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "unexpected"
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dispatcher = EmailAlertDispatcher::new(&config_for(&mock_server)).unwrap();
    let notice = AlertNotice::new(
        1,
        52.5,
        13.4,
        RiskSignal::numeric(150.0, 100.0),
        Utc::now(),
    );

    let err = dispatcher
        .send_alert("not-an-email", &notice)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MalformedPayload(_)));
}

#[test]
fn test_dispatcher_rejects_invalid_config() {
    let result = EmailAlertDispatcher::new(&EmailConfig::default());
    assert!(matches!(result, Err(DispatchError::InvalidConfiguration(_))));
}
