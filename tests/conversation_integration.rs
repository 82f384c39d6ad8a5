//! Conversation flow integration tests.
//!
//! Drives the voice, text and photo flows against a wiremock backend and
//! checks what ends up in the shared store.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sprout_client::api::{ApiClient, ImageUpload, Role, SessionResponse};
use sprout_client::config::StudentConfig;
use sprout_client::conversation::photo::{
    PHOTO_PLACEHOLDER, UPLOAD_FAILED_MESSAGE, UPLOAD_FAILED_REPLY,
};
use sprout_client::conversation::text::{EMPTY_INPUT_MESSAGE, SEND_FAILED_MESSAGE};
use sprout_client::conversation::{
    bootstrap_session, end_session, restore_history, send_photo, send_text, RetryPolicy,
    SendError, VoiceSender, SESSION_START_FAILED,
};
use sprout_client::errors::ErrorKind;
use sprout_client::store::{SharedStore, Store};
use std::io::Cursor;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VOICE_PATH: &str = "/api/v1/conversations/voice";

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5))
        .expect("Failed to create client")
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(10),
    }
}

/// Store with an active session "s-1"
fn store_with_session() -> SharedStore {
    let mut store = Store::in_memory();
    store.set_session(&SessionResponse {
        session_id: "s-1".to_string(),
        student_id: "student_001".to_string(),
        subject: "数学".to_string(),
        student_age: 6,
        created_at: "2026-03-01T09:00:00".to_string(),
        is_valid: true,
    });
    store.shared()
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "session_id": "s-1",
        "response": text,
        "timestamp": "2026-03-01T09:00:05"
    }))
}

fn transcript(store: &SharedStore) -> Vec<(Role, String)> {
    store
        .lock()
        .messages()
        .iter()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_bootstrap_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/conversations/create"))
        .and(body_partial_json(json!({
            "student_id": "student_001",
            "subject": "数学",
            "student_age": 6
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s-9",
            "student_id": "student_001",
            "subject": "数学",
            "student_age": 6,
            "created_at": "2026-03-01T09:00:00",
            "is_valid": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Store::in_memory().shared();
    let student = StudentConfig {
        student_id: "student_001".to_string(),
        ..StudentConfig::default()
    };
    bootstrap_session(&client(&server), &store, &student).await.unwrap();

    let store = store.lock();
    assert_eq!(store.session_id(), Some("s-9"));
    assert_eq!(store.session().student_id, "student_001");
    assert!(!store.is_loading());
    assert!(store.error().is_none());
}

#[tokio::test]
async fn test_bootstrap_generates_student_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/conversations/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s-2",
            "student_id": "student_1",
            "subject": "数学",
            "student_age": 6,
            "created_at": "2026-03-01T09:00:00",
            "is_valid": true
        })))
        .mount(&server)
        .await;

    let store = Store::in_memory().shared();
    bootstrap_session(&client(&server), &store, &StudentConfig::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let student_id = body["student_id"].as_str().unwrap();
    assert!(student_id.starts_with("student_"));
    assert!(student_id["student_".len()..].parse::<i64>().is_ok());
}

#[tokio::test]
async fn test_bootstrap_failure_sets_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/conversations/create"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Store::in_memory().shared();
    assert!(bootstrap_session(&client(&server), &store, &StudentConfig::default())
        .await
        .is_err());

    let store = store.lock();
    assert!(store.session_id().is_none());
    assert_eq!(store.error(), Some(SESSION_START_FAILED));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_restore_history_replaces_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/conversations/s-1/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s-1",
            "messages": [
                {"role": "user", "content": "你好", "timestamp": "2026-03-01T09:00:00"},
                {"role": "assistant", "content": "你好呀！", "timestamp": "2026-03-01T09:00:01.250Z"}
            ],
            "total_count": 12
        })))
        .mount(&server)
        .await;

    let store = store_with_session();
    store.lock().add_message(Role::User, "stale");

    let count = restore_history(&client(&server), &store, None).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        transcript(&store),
        [
            (Role::User, "你好".to_string()),
            (Role::Assistant, "你好呀！".to_string())
        ]
    );
}

#[tokio::test]
async fn test_restore_history_needs_session() {
    let server = MockServer::start().await;
    let store = Store::in_memory().shared();
    let err = restore_history(&client(&server), &store, None).await.unwrap_err();
    assert!(matches!(err, SendError::NoSession));
}

#[tokio::test]
async fn test_end_session_clears_even_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/conversations/s-1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Session not found" })),
        )
        .mount(&server)
        .await;

    let store = store_with_session();
    store.lock().record_answer(true);

    assert!(end_session(&client(&server), &store).await.is_err());

    let store = store.lock();
    assert!(store.session_id().is_none());
    // Progress is not session state
    assert_eq!(store.stats().correct_answers, 1);
}

// =============================================================================
// Voice
// =============================================================================

#[tokio::test]
async fn test_voice_success_appends_both_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .and(body_partial_json(json!({ "session_id": "s-1", "transcript": "五加三" })))
        .respond_with(reply("你能用手指数一数吗？"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());
    let response = sender.send("  五加三 ", Some(0.9)).await.unwrap();

    assert_eq!(response.response, "你能用手指数一数吗？");
    assert_eq!(
        transcript(&store),
        [
            (Role::User, "五加三".to_string()),
            (Role::Assistant, "你能用手指数一数吗？".to_string())
        ]
    );
    assert!(!store.lock().is_loading());
}

#[tokio::test]
async fn test_voice_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .respond_with(reply("再想想看"))
        .with_priority(2)
        .mount(&server)
        .await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());
    sender.send("五加三", None).await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    // The child's turn is recorded once despite the resend
    let turns = transcript(&store);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1], (Role::Assistant, "再想想看".to_string()));
    assert!(store.lock().error().is_none());
}

#[tokio::test]
async fn test_voice_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());
    let err = sender.send("五加三", None).await.unwrap_err();

    match &err {
        SendError::Failed {
            attempts, friendly, ..
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(friendly.kind, ErrorKind::Network);
            assert!(!friendly.retryable);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let store = store.lock();
    assert_eq!(store.error(), Some(err.friendly().to_string().as_str()));
    assert_eq!(store.messages().len(), 1);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_voice_does_not_retry_permission_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());
    let err = sender.send("五加三", None).await.unwrap_err();

    assert!(matches!(err, SendError::Failed { attempts: 1, .. }));
    assert_eq!(err.friendly().kind, ErrorKind::Permission);
}

#[tokio::test]
async fn test_voice_cancel_stops_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOICE_PATH))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());

    let task = {
        let sender = sender.clone();
        tokio::spawn(async move { sender.send("五加三", None).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    sender.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::Cancelled { attempts: 1 }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(!store.lock().is_loading());
}

#[tokio::test]
async fn test_voice_rejects_empty_transcript_and_missing_session() {
    let server = MockServer::start().await;

    let store = store_with_session();
    let sender = VoiceSender::new(client(&server), store.clone(), quick_policy());
    assert!(matches!(sender.send("   ", None).await, Err(SendError::Invalid(_))));
    assert!(store.lock().messages().is_empty());

    let sender = VoiceSender::new(client(&server), Store::in_memory().shared(), quick_policy());
    assert!(matches!(sender.send("你好", None).await, Err(SendError::NoSession)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Text
// =============================================================================

#[tokio::test]
async fn test_text_validation() {
    let server = MockServer::start().await;
    let api = client(&server);
    let store = store_with_session();

    let err = send_text(&api, &store, " \n ").await.unwrap_err();
    assert!(matches!(err, SendError::Invalid(_)));
    assert_eq!(store.lock().error(), Some(EMPTY_INPUT_MESSAGE));

    let too_long = "题".repeat(2001);
    let err = send_text(&api, &store, &too_long).await.unwrap_err();
    assert_eq!(err.friendly().kind, ErrorKind::Validation);

    assert!(store.lock().messages().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_text_success_and_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/conversations/message"))
        .respond_with(reply("对啦！"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/conversations/message"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(2)
        .mount(&server)
        .await;

    let api = client(&server);
    let store = store_with_session();

    send_text(&api, &store, "是8").await.unwrap();
    assert_eq!(transcript(&store).len(), 2);

    // Only one attempt, the message stays in the transcript
    let err = send_text(&api, &store, "那9呢").await.unwrap_err();
    assert!(matches!(err, SendError::Failed { attempts: 1, .. }));
    let store = store.lock();
    assert_eq!(store.error(), Some(SEND_FAILED_MESSAGE));
    assert_eq!(store.messages().last().map(|m| m.content.as_str()), Some("那9呢"));
}

// =============================================================================
// Photo
// =============================================================================

/// Solid-colour PNG of the given size
fn png_upload(name: &str, width: u32, height: u32) -> ImageUpload {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([240, 200, 60])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode test image");
    ImageUpload::new(name, "image/png", bytes)
}

#[tokio::test]
async fn test_photo_guidance_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/images/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "student_id": "student_001",
                "subject": "数学",
                "response": "先看看图里有几只小鸭子",
                "image_size": 3
            }
        })))
        .mount(&server)
        .await;

    let store = store_with_session();
    let image = png_upload("hw.png", 800, 600);
    send_photo(&client(&server), &store, &image).await.unwrap();

    assert_eq!(
        transcript(&store),
        [
            (Role::User, PHOTO_PLACEHOLDER.to_string()),
            (Role::Assistant, "先看看图里有几只小鸭子".to_string())
        ]
    );
}

#[tokio::test]
async fn test_photo_is_compressed_before_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/images/guide"))
        .and(body_string_contains("filename=\"homework.jpg\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "student_id": "student_001",
                "subject": "数学",
                "response": "数一数每一行有几个",
                "image_size": 1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_session();
    let image = png_upload("homework.png", 2400, 1200);
    send_photo(&client(&server), &store, &image).await.unwrap();
    assert!(store.lock().error().is_none());
}

#[tokio::test]
async fn test_photo_failure_adds_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/images/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "data": {
                "student_id": "student_001",
                "subject": "数学",
                "response": "",
                "image_size": 3
            }
        })))
        .mount(&server)
        .await;

    let store = store_with_session();
    let image = png_upload("hw.png", 640, 480);
    assert!(send_photo(&client(&server), &store, &image).await.is_err());

    let store = store.lock();
    assert_eq!(store.error(), Some(UPLOAD_FAILED_MESSAGE));
    assert_eq!(
        store.messages().last().map(|m| m.content.as_str()),
        Some(UPLOAD_FAILED_REPLY)
    );
}

#[tokio::test]
async fn test_photo_rejected_before_upload() {
    let server = MockServer::start().await;
    let store = store_with_session();
    let api = client(&server);

    let not_image = ImageUpload::new("notes.pdf", "application/pdf", vec![1]);
    let err = send_photo(&api, &store, &not_image).await.unwrap_err();
    assert!(matches!(
        err,
        SendError::Invalid(ref m) if m == "不支持的图片格式，请使用 JPG、PNG 或 WebP"
    ));

    let gif = ImageUpload::new("anim.gif", "image/gif", vec![1]);
    assert!(send_photo(&api, &store, &gif).await.is_err());

    let huge = ImageUpload::new("big.png", "image/png", vec![0; 10 * 1024 * 1024 + 1]);
    assert!(send_photo(&api, &store, &huge).await.is_err());

    let broken = ImageUpload::new("broken.jpg", "image/jpeg", vec![1, 2, 3]);
    send_photo(&api, &store, &broken).await.unwrap_err();
    assert_eq!(store.lock().error(), Some("图片压缩失败，请重试"));

    assert!(store.lock().messages().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
