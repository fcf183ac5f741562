//! Integration tests for events

use pkgcore_errors::FetchError;
use pkgcore_events::*;

#[tokio::test]
async fn test_emitter_wraps_events_with_meta() {
    let (tx, mut rx) = channel();

    tx.emit_error("test error");
    tx.emit_fetch(FetchEvent::CacheHit {
        package: "foo-1.0".into(),
        path: "/cache/foo-1.0~abc.pkg".into(),
    });

    let first = rx.recv().await.unwrap();
    assert!(matches!(
        first.event,
        AppEvent::General(GeneralEvent::Error { .. })
    ));
    assert_eq!(first.meta.level, EventLevel::Error);
    assert_eq!(first.meta.source, EventSource::GENERAL);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.meta.source, EventSource::FETCH);
    assert_eq!(second.meta.level, EventLevel::Info);
    assert_ne!(first.meta.event_id, second.meta.event_id);
}

#[tokio::test]
async fn test_dropped_receiver() {
    let (tx, rx) = channel();
    drop(rx);

    // Should not panic when receiver is dropped
    tx.emit_warning("ignored");
}

#[test]
fn test_missing_sender_is_silent() {
    let none: Option<EventSender> = None;
    none.emit_debug("nobody listens");
}

#[test]
fn test_log_levels() {
    let retry = AppEvent::Fetch(FetchEvent::Retrying {
        package: "foo-1.0".into(),
        reason: "size mismatch".into(),
    });
    assert_eq!(retry.log_level(), tracing::Level::WARN);
    assert_eq!(retry.log_target(), "pkgcore::events::fetch");

    let err = FetchError::ChecksumFileMissing {
        package: "foo-1.0".into(),
        path: "/cache/foo".into(),
    };
    let failed = AppEvent::Fetch(FetchEvent::Failed {
        package: "foo-1.0".into(),
        failure: FailureContext::from_error(&err),
    });
    assert_eq!(failed.log_level(), tracing::Level::ERROR);

    let verified = AppEvent::Signing(SigningEvent::Verified {
        backend: "minisign".into(),
        legacy_allowed: false,
    });
    assert_eq!(verified.log_level(), tracing::Level::INFO);
}

#[test]
fn test_event_message_serialization() {
    let message = EventMessage::from_event(AppEvent::Signing(SigningEvent::Signed {
        backend: "ed25519".into(),
        bytes: 64,
    }));
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["event"]["domain"], "signing");
    assert_eq!(json["event"]["event"]["type"], "signed");
    assert_eq!(json["meta"]["level"], "info");
    assert_eq!(json["meta"]["source"], "signing");

    let meta = json["meta"].as_object().unwrap();
    let mut keys: Vec<&str> = meta.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["eventId", "level", "source", "timestamp"]);
}
