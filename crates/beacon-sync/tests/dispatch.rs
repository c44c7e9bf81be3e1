mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_sync::{Envelope, SyncConfig, WILDCARD};
use common::{admin, config, harness, harness_with, settle};

type Calls = Arc<Mutex<Vec<String>>>;

fn recorder(calls: &Calls, name: &'static str) -> impl Fn(&Envelope) + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |event: &Envelope| {
        calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", name, event.event_type));
    }
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_to_type_and_wildcard() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _a = h.sync.subscribe("order_submitted", recorder(&calls, "A"));
    let _b = h.sync.subscribe(WILDCARD, recorder(&calls, "B"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server
        .push(0, r#"{"type":"order_submitted","message":"New order","order_id":7}"#);
    settle().await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["A:order_submitted", "B:order_submitted"]
    );
    let notices = h.notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "New order");
}

#[tokio::test(start_paused = true)]
async fn test_payload_reaches_subscriber_verbatim() {
    let h = harness();
    let seen: Arc<Mutex<Option<Envelope>>> = Arc::default();
    let slot = Arc::clone(&seen);
    let _sub = h.sync.subscribe("print_job", move |event| {
        *slot.lock().unwrap() = Some(event.clone());
    });

    h.sync.connect(admin("42"));
    settle().await;
    h.server
        .push(0, r#"{"type":"print_job","order_id":17,"lines":["a","b"]}"#);
    settle().await;

    let event = seen.lock().unwrap().clone().unwrap();
    assert_eq!(event.get("order_id"), Some(&serde_json::json!(17)));
    assert_eq!(event.get("lines"), Some(&serde_json::json!(["a", "b"])));
    assert!(h.notices.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_type_not_delivered() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _a = h.sync.subscribe("order_submitted", recorder(&calls, "A"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server.push(0, r#"{"type":"wallet_update","balance":10}"#);
    settle().await;

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_internal_frames_never_delivered() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _all = h.sync.subscribe(WILDCARD, recorder(&calls, "all"));
    let _pong = h.sync.subscribe("pong", recorder(&calls, "pong"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server.push(0, r#"{"type":"connected","message":"Welcome"}"#);
    h.server.push(0, r#"{"type":"pong"}"#);
    settle().await;

    assert!(calls.lock().unwrap().is_empty());
    assert!(h.notices.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_before_any_frame() {
    let h = harness();
    let calls: Calls = Arc::default();
    let sub = h.sync.subscribe("order_submitted", recorder(&calls, "A"));
    sub.unsubscribe();
    sub.unsubscribe();

    h.sync.connect(admin("42"));
    settle().await;
    h.server.push(0, r#"{"type":"order_submitted"}"#);
    settle().await;

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failing_callback_keeps_session_alive() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _boom = h
        .sync
        .subscribe("order_updated", |_| panic!("subscriber failure"));
    let _same = h.sync.subscribe("order_updated", recorder(&calls, "same"));
    let _other = h.sync.subscribe("wallet_update", recorder(&calls, "other"));
    let _wild = h.sync.subscribe(WILDCARD, recorder(&calls, "wild"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server.push(0, r#"{"type":"order_updated"}"#);
    h.server.push(0, r#"{"type":"wallet_update"}"#);
    settle().await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "same:order_updated",
            "wild:order_updated",
            "other:wallet_update",
            "wild:wallet_update",
        ]
    );
    assert!(h.sync.is_connected());
    assert_eq!(h.server.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_keep_session_alive() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _all = h.sync.subscribe(WILDCARD, recorder(&calls, "all"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server.push(0, "not json");
    h.server.push(0, r#"{"message":"missing type"}"#);
    h.server.push(0, r#"{"type":"chat_message","message":"hi"}"#);
    settle().await;

    assert_eq!(*calls.lock().unwrap(), vec!["all:chat_message"]);
    assert!(h.sync.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_frames_arrive_in_order_without_coalescing() {
    let h = harness();
    let seen: Arc<Mutex<Vec<i64>>> = Arc::default();
    let slot = Arc::clone(&seen);
    let _sub = h.sync.subscribe("order_updated", move |event| {
        if let Some(n) = event.get("seq").and_then(|v| v.as_i64()) {
            slot.lock().unwrap().push(n);
        }
    });

    h.sync.connect(admin("42"));
    settle().await;
    for seq in 0..5 {
        h.server
            .push(0, &format!(r#"{{"type":"order_updated","seq":{}}}"#, seq));
    }
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_survive_reconnect() {
    let h = harness();
    let calls: Calls = Arc::default();
    let _a = h.sync.subscribe("chat_message", recorder(&calls, "A"));

    h.sync.connect(admin("42"));
    settle().await;
    h.server.close(0);
    tokio::time::sleep(Duration::from_millis(3100)).await;

    h.server.push_latest(r#"{"type":"chat_message"}"#);
    settle().await;
    assert_eq!(*calls.lock().unwrap(), vec!["A:chat_message"]);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_can_be_disabled() {
    let h = harness_with(SyncConfig {
        notifications_enabled: false,
        ..config()
    });
    h.sync.connect(admin("42"));
    settle().await;
    h.server
        .push(0, r#"{"type":"order_submitted","message":"New order"}"#);
    settle().await;

    assert!(h.notices.lock().unwrap().is_empty());
}
