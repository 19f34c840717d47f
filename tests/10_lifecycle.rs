mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{RecordingValidator, Trace};
use vetkit::attrs::Attrs;
use vetkit::error::ApiError;
use vetkit::manager::ObjectManager;
use vetkit::store::{MemStore, ObjectStore, Selection};
use vetkit::validator::Context;

fn attrs(value: Value) -> Attrs {
    Attrs::from_value(value).expect("object literal")
}

fn manager(store: &Arc<MemStore>, trace: &Trace) -> ObjectManager<RecordingValidator> {
    let handle: Arc<dyn ObjectStore> = store.clone();
    ObjectManager::new(handle, "items", Context::new().with(trace.clone()))
}

#[test]
fn create_runs_phases_in_the_documented_order() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    // keys arrive out of alphabetical order on purpose
    let record = manager.do_create(Some(attrs(json!({"b": "x", "a": 2})))).unwrap();

    assert_eq!(
        trace.entries(),
        vec![
            "pre",
            "clean_a",
            "clean_b",
            "clean",
            "default_z",
            "base",
            "field_a",
            "field_b",
            "check_one",
            "check_two",
            "will_create",
            "will_create_or_update",
            "base_db",
            "did_create",
            "did_create_or_update",
            "post",
        ]
    );
    assert_eq!(record.id(), Some(1));
    // the default fired because "z" was absent from the input
    assert_eq!(record.get("z"), Some(&json!("zed")));
}

#[test]
fn clean_hooks_replace_the_stored_value() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let record = manager.do_create(Some(attrs(json!({"b": "quiet"})))).unwrap();
    assert_eq!(record.get("b"), Some(&json!("QUIET")));
}

#[test]
fn update_swaps_lifecycle_hooks_and_skips_defaults() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut create_manager = manager(&store, &trace);
    let record = create_manager.do_create(Some(attrs(json!({"a": 1})))).unwrap();

    let trace = Trace::default();
    let mut update_manager = manager(&store, &trace);
    let updated = update_manager.do_update(&record, Some(attrs(json!({"a": 5})))).unwrap();

    let entries = trace.entries();
    assert!(entries.contains(&"will_update".to_string()));
    assert!(entries.contains(&"did_update".to_string()));
    assert!(!entries.contains(&"will_create".to_string()));
    assert!(!entries.contains(&"default_z".to_string()));
    assert_eq!(updated.get("a"), Some(&json!(5)));
    assert!(!updated.contains("z"));
}

#[test]
fn defaults_do_not_overwrite_present_fields() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let record = manager.do_create(Some(attrs(json!({"z": "mine"})))).unwrap();
    assert_eq!(record.get("z"), Some(&json!("mine")));
    assert_eq!(trace.count("default_z"), 0);
}

#[test]
fn a_failing_check_stops_everything_after_it() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let err = manager
        .do_create(Some(attrs(json!({"a": 1, "fail_check": true}))))
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let entries = trace.entries();
    assert!(entries.contains(&"check_one".to_string()));
    // check_two sorts after check_one and must not have run
    assert!(!entries.contains(&"check_two".to_string()));
    assert!(!entries.contains(&"will_create".to_string()));
    assert_eq!(store.count("items"), 0);
}

#[test]
fn base_db_failure_happens_before_any_store_mutation() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let err = manager
        .do_create(Some(attrs(json!({"fail_base_db": true}))))
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let entries = trace.entries();
    assert!(entries.contains(&"will_create".to_string()));
    assert!(entries.contains(&"base_db".to_string()));
    assert!(!entries.contains(&"did_create".to_string()));
    assert_eq!(store.count("items"), 0);
}

#[test]
fn validate_only_then_do_create_continues_without_revalidating() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    manager.make_validator(attrs(json!({"a": 1})), Some(vetkit::validator::Op::Create));
    let validated = manager.validate_only(None).unwrap();
    assert_eq!(validated.get("z"), Some(&json!("zed")));

    let record = manager.do_create(None).unwrap();
    assert_eq!(record.id(), Some(1));

    // each first-stage phase ran exactly once
    assert_eq!(trace.count("pre"), 1);
    assert_eq!(trace.count("check_one"), 1);
    assert_eq!(trace.count("will_create"), 1);
}

#[test]
fn new_attrs_after_validation_are_rejected() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    manager.validate_only(Some(attrs(json!({"a": 1})))).unwrap();
    let err = manager.do_create(Some(attrs(json!({"a": 2})))).unwrap_err();
    assert!(matches!(err, ApiError::Contract(_)));
    assert_eq!(store.count("items"), 0);
}

#[test]
fn validate_only_without_an_operation_skips_defaults() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let validated = manager.validate_only(Some(attrs(json!({"a": 1})))).unwrap();
    assert!(!validated.contains("z"));
    let entries = trace.entries();
    assert!(!entries.contains(&"will_create".to_string()));
    assert!(entries.contains(&"check_two".to_string()));
}

#[test]
fn delete_runs_only_the_delete_hooks() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut create_manager = manager(&store, &trace);
    let record = create_manager.do_create(Some(attrs(json!({"a": 1})))).unwrap();

    let trace = Trace::default();
    let mut delete_manager = manager(&store, &trace);
    delete_manager
        .do_delete(Selection::one(record), Attrs::new())
        .unwrap();

    assert_eq!(trace.entries(), vec!["pre", "will_delete", "did_delete", "post"]);
    assert_eq!(store.count("items"), 0);
}

#[test]
fn batch_create_defers_lifecycle_until_all_items_validate() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let records = manager
        .do_create_many(vec![
            attrs(json!({"a": 1})),
            attrs(json!({"a": 2})),
            attrs(json!({"a": 3})),
        ])
        .unwrap();

    let ids: Vec<Option<i64>> = records.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    // every first-stage pass finishes before any lifecycle phase starts
    let entries = trace.entries();
    let last_check = entries.iter().rposition(|e| e == "check_two").unwrap();
    let first_will_create = entries.iter().position(|e| e == "will_create").unwrap();
    assert!(last_check < first_will_create);
    assert_eq!(trace.count("did_create"), 3);
}

#[test]
fn batch_create_is_all_or_nothing_before_the_insert() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let err = manager
        .do_create_many(vec![
            attrs(json!({"a": 1})),
            attrs(json!({"a": 2})),
            attrs(json!({"a": 3, "fail_base_db": true})),
        ])
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // the third item failed its database check after the first two passed
    // theirs, and still nothing was inserted
    assert_eq!(trace.count("base_db"), 3);
    assert_eq!(store.count("items"), 0);
    assert_eq!(trace.count("did_create"), 0);
}

#[test]
fn an_early_batch_failure_is_caught_during_first_stage() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let err = manager
        .do_create_many(vec![
            attrs(json!({"a": 1})),
            attrs(json!({"a": 2, "fail_check": true})),
            attrs(json!({"a": 3})),
        ])
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // items one and two went through first-stage validation, item three
    // was never reached and no lifecycle phase ran
    assert_eq!(trace.count("pre"), 2);
    assert_eq!(trace.count("will_create"), 0);
    assert_eq!(store.count("items"), 0);
}

#[test]
fn read_hooks_rewrite_the_representation() {
    let store = Arc::new(MemStore::new());
    let trace = Trace::default();
    let mut manager = manager(&store, &trace);

    let record = manager.do_create(Some(attrs(json!({"title": "quiet"})))).unwrap();
    let represented = manager.read(record.to_attrs(), &record).unwrap();

    assert_eq!(represented.get("title"), Some(&json!("QUIET")));
    let entries = trace.entries();
    let read_pos = entries.iter().position(|e| e == "read_title").unwrap();
    let will_read_pos = entries.iter().position(|e| e == "will_read").unwrap();
    assert!(read_pos < will_read_pos);
}
