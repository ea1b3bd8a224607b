use interaction_replay::{
    Args, DocumentHasher, DocumentSerializer, FunctionSubject, InteractionStore, JsonSerializer, Live, Node,
    ObjectSubject, Proxy, RecordingProxy, StoreError, StoreOutcome,
};
use std::fs;

fn recorded_service() -> RecordingProxy {
    let proxy = RecordingProxy::new(
        ObjectSubject::new("Service")
            .with_field("name", "billing")
            .with_method("total", |args| {
                let sum: i64 = args.positional.iter().filter_map(|v| v.as_i64()).sum();
                Ok(Live::from(sum))
            }),
    );
    proxy.attribute("name").unwrap();
    proxy.call_method("total", Args::new().arg(1).arg(2).arg(3)).unwrap();
    proxy
}

#[test]
fn test_store_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.json");
    let store = InteractionStore::json();

    store.store_to_file(&recorded_service(), &path).unwrap();
    let replaying = store.load_from_file(&path).unwrap();

    assert_eq!(replaying.attribute("name").unwrap(), Node::from("billing"));
    assert_eq!(
        replaying.call_method("total", Args::new()).unwrap(),
        Node::from(6)
    );
}

#[test]
fn test_pretty_and_compact_share_a_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let pretty = InteractionStore::json();
    let compact = InteractionStore::new(JsonSerializer::compact());
    let recording = recorded_service();

    let first = pretty.store_to_file(&recording, dir.path().join("pretty.json")).unwrap();
    let second = compact.store_to_file(&recording, dir.path().join("compact.json")).unwrap();

    match (first, second) {
        (
            StoreOutcome::Written { fingerprint: a, bytes: pretty_bytes },
            StoreOutcome::Written { fingerprint: b, bytes: compact_bytes },
        ) => {
            assert_eq!(a, b);
            assert!(pretty_bytes > compact_bytes);
        }
        other => panic!("expected two writes, got {other:?}"),
    }
}

#[test]
fn test_fingerprint_matches_artifact_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.json");
    let store = InteractionStore::json();

    let outcome = store.store_to_file(&recorded_service(), &path).unwrap();
    let document = store.serializer().deserialize(&fs::read(&path).unwrap()).unwrap();

    assert_eq!(
        outcome,
        StoreOutcome::Written {
            fingerprint: DocumentHasher::new().hash(&document),
            bytes: fs::metadata(&path).unwrap().len() as usize,
        }
    );
}

#[test]
fn test_absence_deletes_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.json");
    let store = InteractionStore::json();

    let used = RecordingProxy::new(FunctionSubject::new("now", |_| Ok(Live::from(5))));
    used.invoke(Args::new()).unwrap();
    store.store_to_file(&used, &path).unwrap();
    assert!(path.exists());

    let unused = RecordingProxy::new(FunctionSubject::new("now", |_| Ok(Live::from(5))));
    let outcome = store.store_to_file(&unused, &path).unwrap();

    assert_eq!(outcome, StoreOutcome::Removed { existed: true });
    assert!(!path.exists());
    assert!(store.load_from_file(&path).unwrap().is_empty());
}

#[test]
fn test_unreadable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.json");
    fs::write(&path, "not json at all").unwrap();

    let err = InteractionStore::json().load_from_file(&path).unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}

#[test]
fn test_directory_in_place_of_artifact_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = InteractionStore::json().load_from_file(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}
