#![cfg(test)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use feishu_bot::{
    base::{
        config::{Config, ConfigInner, ReplyMode},
        replies,
        types::{EventEnvelope, Void},
    },
    interaction::{
        event::{EventRouter, HELPDESK_TICKET, MESSAGE_RECEIVE},
        reply::ReplyGenerator,
    },
    runtime::Runtime,
    service::chat::{ChatClient, EventCallback, GenericChatClient},
};
use mockall::mock;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

// Mocks.

// Mock chat client for testing.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        async fn start(&self, callback: EventCallback) -> Void;
        async fn reply_message(&self, message_id: &str, text: &str) -> Void;
    }
}

/// A chat client that must never be asked to reply.
fn silent_chat() -> ChatClient {
    let mut mock = MockChat::new();
    mock.expect_reply_message().never();

    ChatClient::new(Arc::new(mock))
}

fn test_config(base_url: &str, reply_mode: ReplyMode) -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            app_id: "cli_test".to_string(),
            app_secret: "secret".to_string(),
            base_url: base_url.to_string(),
            reply_mode,
            bot_name: "机器人1".to_string(),
            ..Default::default()
        }),
    }
}

fn echo_router(chat: ChatClient) -> EventRouter {
    EventRouter::new(chat, ReplyGenerator::new(ReplyMode::Echo, "机器人1"), true)
}

fn message_envelope(message_id: &str, content: &str) -> EventEnvelope {
    EventEnvelope::new(
        MESSAGE_RECEIVE,
        json!({
            "sender": { "sender_id": { "open_id": "ou_1" }, "sender_type": "user" },
            "message": {
                "message_id": message_id,
                "chat_id": "oc_1",
                "chat_type": "p2p",
                "message_type": "text",
                "content": content,
            },
        }),
    )
}

// Tests.

#[tokio::test]
async fn test_message_event_replies_once() {
    let mut mock = MockChat::new();
    mock.expect_reply_message()
        .withf(|message_id: &str, text: &str| message_id == "om_1" && text == "【机器人1】收到你的消息：hi")
        .times(1)
        .returning(|_, _| Ok(()));

    let router = echo_router(ChatClient::new(Arc::new(mock)));

    let handle = router.dispatch(message_envelope("om_1", r#"{"text":"hi"}"#)).expect("a reply task");
    handle.await.unwrap();
}

#[tokio::test]
async fn test_smart_mode_answers_greeting() {
    let mut mock = MockChat::new();
    mock.expect_reply_message()
        .withf(|message_id: &str, text: &str| message_id == "om_2" && text == replies::GREETING_REPLY)
        .times(1)
        .returning(|_, _| Ok(()));

    let router = EventRouter::new(ChatClient::new(Arc::new(mock)), ReplyGenerator::new(ReplyMode::Smart, "bot"), true);

    router.dispatch(message_envelope("om_2", r#"{"text":"你好"}"#)).expect("a reply task").await.unwrap();
}

#[tokio::test]
async fn test_unknown_event_is_ignored() {
    let router = echo_router(silent_chat());

    let handle = router.dispatch(EventEnvelope::new("im.chat.member.bot.added_v1", json!({ "chat_id": "oc_1" })));

    assert!(handle.is_none());
}

#[tokio::test]
async fn test_invalid_content_is_ignored() {
    let router = echo_router(silent_chat());

    assert!(router.dispatch(message_envelope("om_1", "{not json")).is_none());
    assert!(router.dispatch(message_envelope("om_1", r#"{"image_key":"img_1"}"#)).is_none());
}

#[tokio::test]
async fn test_malformed_message_event_is_dropped() {
    let router = echo_router(silent_chat());

    let handle = router.dispatch(EventEnvelope::new(MESSAGE_RECEIVE, json!({ "message": 42 })));

    assert!(handle.is_none());
}

#[tokio::test]
async fn test_empty_message_id_is_skipped() {
    let router = echo_router(silent_chat());

    assert!(router.dispatch(message_envelope("", r#"{"text":"hi"}"#)).is_none());
}

#[tokio::test]
async fn test_helpdesk_events_never_reply() {
    let ticket = || EventEnvelope::new(HELPDESK_TICKET, json!({ "ticket": { "ticket_id": "1" } }));

    let enabled = echo_router(silent_chat());
    let disabled = EventRouter::new(silent_chat(), ReplyGenerator::new(ReplyMode::Echo, "bot"), false);

    assert!(enabled.dispatch(ticket()).is_none());
    assert!(disabled.dispatch(ticket()).is_none());
}

#[tokio::test]
async fn test_reply_failure_is_contained() {
    let mut mock = MockChat::new();
    mock.expect_reply_message().times(1).returning(|_, _| Err(anyhow::anyhow!("code=230002, msg=bot not in chat")));

    let router = echo_router(ChatClient::new(Arc::new(mock)));

    // The task logs the failure and finishes normally.
    router.dispatch(message_envelope("om_1", r#"{"text":"hi"}"#)).expect("a reply task").await.unwrap();
}

#[tokio::test]
async fn test_callback_dispatches_in_background() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut mock = MockChat::new();
    mock.expect_reply_message().times(1).returning(move |message_id, _| {
        tx.send(message_id.to_string()).unwrap();
        Ok(())
    });

    let callback = echo_router(ChatClient::new(Arc::new(mock))).into_callback();
    callback(message_envelope("om_3", r#"{"text":"hi"}"#));

    let replied_to = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();

    assert_eq!(replied_to.as_deref(), Some("om_3"));
}

#[tokio::test]
async fn test_runtime_feeds_events_to_router() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut mock = MockChat::new();
    mock.expect_start().times(1).returning(|callback| {
        callback(message_envelope("om_4", r#"{"text":"ping"}"#));
        callback(EventEnvelope::new("unknown.event_v1", json!({})));
        Ok(())
    });
    mock.expect_reply_message().times(1).returning(move |message_id, text| {
        tx.send((message_id.to_string(), text.to_string())).unwrap();
        Ok(())
    });

    let runtime = Runtime {
        config: test_config("http://127.0.0.1:9", ReplyMode::Echo),
        chat: ChatClient::new(Arc::new(mock)),
    };

    runtime.start().await.unwrap();

    let (message_id, text) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();

    assert_eq!(message_id, "om_4");
    assert_eq!(text, "【机器人1】收到你的消息：ping");
}

#[tokio::test]
async fn test_runtime_fails_when_connection_fails() {
    let mut mock = MockChat::new();
    mock.expect_start().times(1).returning(|_| Err(anyhow::anyhow!("connection refused")));

    let runtime = Runtime {
        config: test_config("http://127.0.0.1:9", ReplyMode::Smart),
        chat: ChatClient::new(Arc::new(mock)),
    };

    assert!(runtime.start().await.is_err());
}

#[tokio::test]
async fn test_lark_client_reply_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok", "tenant_access_token": "t-test", "expire": 7200 })))
        .expect(1)
        .mount(&server)
        .await;

    let text = "he said \"hi\"\nand left";
    let expected_reply = format!("【机器人1】收到你的消息：{text}");

    Mock::given(method("POST"))
        .and(path("/open-apis/im/v1/messages/om_1/reply"))
        .and(body_json(json!({ "msg_type": "text", "content": json!({ "text": expected_reply }).to_string() })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), ReplyMode::Echo);
    let router = EventRouter::from_config(&config, ChatClient::lark(&config).unwrap());

    let content = json!({ "text": text }).to_string();
    router.dispatch(message_envelope("om_1", &content)).expect("a reply task").await.unwrap();

    // Decoding the sent body's `text` yields the reply text.
    let requests = server.received_requests().await.unwrap();
    let reply_request = requests.iter().find(|r| r.url.path().ends_with("/reply")).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&reply_request.body).unwrap();
    let sent: serde_json::Value = serde_json::from_str(body["content"].as_str().unwrap()).unwrap();

    assert_eq!(sent["text"], expected_reply);
}
