//! End-to-end chat scenarios through the generic runtime.
//!
//! # Test Strategy
//!
//! Each test drives [`Runtime`] with a [`SimDriver`]:
//! 1. Inject what the user or relay does
//! 2. Run runtime cycles
//! 3. Inspect the frames written and the notifications delivered

use parley_app::Runtime;
use parley_client::{SessionConfig, SessionEvent};
use parley_harness::{Notification, RecordingObserver, SimDriver, SimEnv};
use parley_proto::{Participant, ParticipantId};
use serde_json::{Value, json};

type SimRuntime = Runtime<SimDriver, SimEnv, RecordingObserver>;

/// A runtime whose transport opens as soon as it is requested.
async fn connected() -> (SimRuntime, SimDriver) {
    let driver = SimDriver::new();
    driver.set_auto_open(true);
    let handle = driver.clone();

    let mut runtime =
        Runtime::new(driver, SimEnv::with_seed(11), RecordingObserver::new(), SessionConfig::default());
    runtime.dispatch(SessionEvent::Connect).await;
    runtime.process_cycle().await.unwrap();

    let opened = handle.take_transmitted();
    assert_eq!(parse(&opened), vec![json!({ "type": "get-users" })]);
    (runtime, handle)
}

fn parse(frames: &[String]) -> Vec<Value> {
    frames.iter().map(|raw| serde_json::from_str(raw).unwrap()).collect()
}

fn looks_like_uuid(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.len() == 36 && s.matches('-').count() == 4)
}

#[tokio::test]
async fn alice_joins_sees_bob_and_chats() {
    let (mut runtime, driver) = connected().await;

    // Join announces the identity, then asks for the roster.
    runtime.request_join("alice").await;
    let frames = parse(&driver.take_transmitted());
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["type"], "new-user");
    assert_eq!(frames[0]["user"]["name"], "alice");
    assert!(looks_like_uuid(&frames[0]["user"]["id"]));
    assert_eq!(frames[1], json!({ "type": "get-users" }));
    let alice_id = frames[0]["user"]["id"].clone();

    // The relay answers with the roster.
    driver.inject_frame(r#"[{"id":"x","name":"bob"}]"#);
    runtime.process_cycle().await.unwrap();
    let bob = Participant::new(ParticipantId::new("x"), "bob");
    assert_eq!(runtime.observer().last_roster(), Some([bob].as_slice()));

    // Sending renders at once, then transmits.
    runtime.request_send("hi").await;
    let rendered: Vec<_> = runtime.observer().rendered().collect();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0.text, "hi");
    assert!(rendered[0].1);

    let sent = driver.take_transmitted();
    let frame = &parse(&sent)[0];
    assert_eq!(frame["type"], "send");
    assert_eq!(frame["message"], "hi");
    assert_eq!(frame["user"]["id"], alice_id);
    assert_eq!(frame["user"]["name"], "alice");
    assert!(looks_like_uuid(&frame["tempId"]));

    // The relay echoes the frame back verbatim; it is not rendered again.
    driver.inject_frame(sent[0].clone());
    runtime.process_cycle().await.unwrap();
    assert_eq!(runtime.observer().rendered().count(), 1);
    assert_eq!(runtime.session().pending_echoes(), 0);
}

#[tokio::test]
async fn other_participants_messages_render_as_theirs() {
    let (mut runtime, driver) = connected().await;
    runtime.request_join("alice").await;
    driver.take_transmitted();

    driver.inject_frame(
        r#"{"type":"send","message":"hey alice","user":{"id":"x","name":"bob"},"tempId":"t-1"}"#,
    );
    runtime.process_cycle().await.unwrap();

    let rendered: Vec<_> = runtime.observer().rendered().collect();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0.author.name, "bob");
    assert!(!rendered[0].1);
}

#[tokio::test]
async fn presence_hint_triggers_fresh_roster_request() {
    let (mut runtime, driver) = connected().await;
    runtime.request_join("alice").await;
    driver.take_transmitted();

    driver.inject_frame(r#"{"type":"user-left","user":{"id":"x","name":"bob"}}"#);
    runtime.process_cycle().await.unwrap();

    assert_eq!(parse(&driver.take_transmitted()), vec![json!({ "type": "get-users" })]);
    // The hint itself never edits the roster.
    assert!(runtime.observer().last_roster().is_none());
}

#[tokio::test]
async fn garbage_between_valid_frames_is_ignored() {
    let (mut runtime, driver) = connected().await;

    for raw in ["{not json", "42", r#"{"type":"typing"}"#, r#"{"users":"nope"}"#] {
        driver.inject_frame(raw);
        runtime.process_cycle().await.unwrap();
    }
    driver.inject_frame(r#"{"users":[{"id":"x","name":"bob"}]}"#);
    runtime.process_cycle().await.unwrap();

    let notifications = runtime.observer().notifications();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(&notifications[0], Notification::RosterChanged(r) if r[0].name == "bob"));
}

#[tokio::test]
async fn blank_input_is_rejected_without_traffic() {
    let (mut runtime, driver) = connected().await;

    runtime.request_join("   ").await;
    runtime.request_send("hello").await;

    assert!(driver.take_transmitted().is_empty());
    assert_eq!(
        runtime.observer().validation_errors(),
        vec!["display name must not be empty", "join the chat before sending messages"]
    );
}
