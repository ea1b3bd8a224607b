use interaction_replay::{
    Args, DependencyIsolation, FunctionSubject, IsolationConfig, IsolationError, Live, Mode, Node, ObjectSubject,
    Proxy, StoreOutcome, Subject, Substitute, Value,
};
use serde_json::json;
use std::cell::Cell;
use std::fs;
use std::rc::Rc;

fn prefix(dir: &tempfile::TempDir) -> String {
    format!("{}/test_checkout_", dir.path().display())
}

/// Runs the code under test against whatever is bound for `inventory` and `clock`
fn checkout(
    session: &mut DependencyIsolation,
    stock: i64,
    connects: &Rc<Cell<usize>>,
) -> (Node<Substitute>, Node<Substitute>) {
    let counter = connects.clone();
    let inventory = session
        .bind("inventory", move || {
            counter.set(counter.get() + 1);
            ObjectSubject::new("Inventory").with_method("reserve", move |args| {
                let quantity = args.param(0, "quantity").and_then(|v| v.as_i64()).unwrap_or_default();
                Ok(Live::from(stock - quantity))
            })
        })
        .unwrap();
    let counter = connects.clone();
    let clock = session
        .bind("clock", move || {
            counter.set(counter.get() + 1);
            FunctionSubject::new("now", |_| Ok(Live::from(1_700_000_000)))
        })
        .unwrap();

    let left = inventory.call_method("reserve", Args::new().arg(2)).unwrap();
    let now = clock.invoke(Args::new()).unwrap();
    (left, now)
}

#[test]
fn test_record_then_replay_session() {
    let dir = tempfile::tempdir().unwrap();
    let connects = Rc::new(Cell::new(0));

    // Record against the live dependencies
    let mut recording = DependencyIsolation::new(IsolationConfig::new(prefix(&dir)).with_mode(Mode::Record));
    let (left, now) = checkout(&mut recording, 10, &connects);
    assert_eq!(left, Node::from(8));
    assert_eq!(now, Node::from(1_700_000_000));
    let summary = recording.finish().unwrap();

    assert_eq!(connects.get(), 2);
    assert_eq!(summary.written(), 2);
    assert!(summary.fingerprint().is_some());
    assert!(matches!(summary.outcome("clock"), Some(StoreOutcome::Written { .. })));
    assert!(dir.path().join("test_checkout_inventory.json").exists());
    assert!(dir.path().join("test_checkout_clock.json").exists());

    // Replay: the live dependencies would now answer differently, but are never connected
    let mut replaying = DependencyIsolation::new(IsolationConfig::new(prefix(&dir)));
    let (left, now) = checkout(&mut replaying, 99, &connects);
    assert_eq!(left, Node::from(8));
    assert_eq!(now, Node::from(1_700_000_000));
    assert_eq!(connects.get(), 2);

    let summary = replaying.finish().unwrap();
    assert_eq!(summary.mode, Mode::Replay);
    assert!(summary.artifacts.is_empty());
}

#[test]
fn test_recording_clears_stale_artifacts_under_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("test_checkout_removed_dependency.json");
    let unrelated = dir.path().join("other_test_clock.json");
    fs::write(&stale, "{}").unwrap();
    fs::write(&unrelated, "{}").unwrap();

    let mut session = DependencyIsolation::new(IsolationConfig::new(prefix(&dir)).with_mode(Mode::Record));
    session
        .bind("idle", || ObjectSubject::new("Idle"))
        .unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(summary.removed, 1);
    assert!(!stale.exists());
    assert!(unrelated.exists());
    // Nothing was recorded on the idle dependency, so it leaves no artifact
    assert_eq!(summary.outcome("idle"), Some(&StoreOutcome::Removed { existed: false }));
    assert_eq!(summary.fingerprint(), None);
}

#[test]
fn test_rebinding_a_name_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = DependencyIsolation::new(IsolationConfig::new(prefix(&dir)).with_mode(Mode::Record));

    session.bind("db", || ObjectSubject::new("Db")).unwrap();
    let err = session.bind("db", || ObjectSubject::new("Db")).unwrap_err();

    assert!(matches!(err, IsolationError::DuplicateBinding { name } if name == "db"));
    assert_eq!(session.names().collect::<Vec<_>>(), vec!["db"]);
}

#[test]
fn test_corrupt_artifact_names_the_dependency() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("test_checkout_db.json"), "[1, 2").unwrap();

    let mut session = DependencyIsolation::new(IsolationConfig::new(prefix(&dir)));
    let err = session.bind("db", || ObjectSubject::new("Db")).unwrap_err();

    assert!(matches!(err, IsolationError::Store { name, .. } if name == "db"));
}

struct Money {
    amount: i64,
    currency: &'static str,
}

impl Subject for Money {
    fn type_name(&self) -> &str {
        "Money"
    }

    fn snapshot(&self) -> Option<Value> {
        Some(Value::map([
            ("amount", Value::from(self.amount)),
            ("currency", Value::from(self.currency)),
        ]))
    }
}

#[test]
fn test_concrete_types_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = IsolationConfig::new(prefix(&dir))
        .with_mode(Mode::Record)
        .with_concrete_type("Money");
    let mut session = DependencyIsolation::new(config);
    assert!(session.config().additional_concrete_types.contains("Money"));

    let account = session
        .bind("account", || {
            ObjectSubject::new("Account").with_value("balance", || {
                Live::object(Money {
                    amount: 1250,
                    currency: "EUR",
                })
            })
        })
        .unwrap();
    let balance = account.attribute("balance").unwrap();
    assert_eq!(balance.get("currency"), Some(&Node::from("EUR")));
    assert!(balance.as_proxy().is_none());

    let path = session.artifact_path("account");
    session.finish().unwrap();

    let artifact: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(
        artifact["recorded_attribute_accesses"]["balance"],
        json!({"__repeat__": {"amount": 1250, "currency": "EUR"}})
    );
}
