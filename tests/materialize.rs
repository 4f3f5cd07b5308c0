mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use common::{ASSEMBLY_SET_TYPE, FakeStore, GENOME_SET_TYPE, READS_TYPE, SharedStore, info};
use kb_gtdbtk::domain::ObjectRef;
use kb_gtdbtk::error::GtdbtkError;
use kb_gtdbtk::materialize::materialize;

fn reference(value: &str) -> ObjectRef {
    value.parse().unwrap()
}

#[test]
fn genome_set_yields_one_file_per_genome() {
    let temp = tempfile::tempdir().unwrap();
    let store = SharedStore(Arc::new(FakeStore::with_genome_set()));

    let files = materialize(&reference("ws/123/genome_set"), &store, temp.path()).unwrap();

    assert_eq!(files.len(), 3);
    let distinct = files.keys().collect::<BTreeSet<_>>();
    assert_eq!(distinct.len(), 3);
    for (path, name) in &files {
        assert!(path.starts_with(temp.path()));
        assert!(path.exists());
        assert!(name.starts_with("genome_"));
    }
    let names = files.values().cloned().collect::<BTreeSet<_>>();
    assert_eq!(
        names,
        BTreeSet::from([
            "genome_1".to_string(),
            "genome_2".to_string(),
            "genome_3".to_string()
        ])
    );
}

#[test]
fn genome_assembly_is_fetched_through_reference_path() {
    let temp = tempfile::tempdir().unwrap();
    let mut fake = FakeStore::new();
    let genome = fake.add_genome(9, 1, "ecoli");
    let store = SharedStore(Arc::new(fake));

    let files = materialize(&reference(&genome), &store, temp.path()).unwrap();

    assert_eq!(files.len(), 1);
    let path = files.keys().next().unwrap();
    assert!(path.ends_with("9_1_1.fa"));
    let requests = store.0.fasta_requests.lock().unwrap().clone();
    assert_eq!(requests, vec!["9/1/1;9/101/1".to_string()]);
}

#[test]
fn single_assembly_and_assembly_set() {
    let temp = tempfile::tempdir().unwrap();
    let mut fake = FakeStore::new();
    let first = fake.add_assembly(5, 1, "bin.001");
    let second = fake.add_assembly(5, 2, "bin.002");
    fake.add(
        "5/3/1",
        info(5, 3, "bins", ASSEMBLY_SET_TYPE),
        json!({"items": [{"ref": first}, {"ref": second}]}),
    );
    let store = SharedStore(Arc::new(fake));

    let single = materialize(&reference(&first), &store, temp.path()).unwrap();
    assert_eq!(single.values().collect::<Vec<_>>(), vec!["bin.001"]);

    let set = materialize(&reference("5/3/1"), &store, temp.path()).unwrap();
    assert_eq!(set.len(), 2);
    let requests = store.0.fasta_requests.lock().unwrap().clone();
    assert!(requests.contains(&"5/3/1;5/2/1".to_string()));
}

#[test]
fn duplicate_set_members_are_fetched_once() {
    let temp = tempfile::tempdir().unwrap();
    let mut fake = FakeStore::new();
    let genome = fake.add_genome(7, 1, "dup");
    fake.add(
        "7/2/1",
        info(7, 2, "dups", GENOME_SET_TYPE),
        json!({"elements": {"a": {"ref": genome}, "b": {"ref": genome}}}),
    );
    let store = SharedStore(Arc::new(fake));

    let files = materialize(&reference("7/2/1"), &store, temp.path()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(store.0.fasta_requests.lock().unwrap().len(), 1);
}

#[test]
fn unknown_reference_is_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let store = SharedStore(Arc::new(FakeStore::new()));

    let err = materialize(&reference("ws/404/missing"), &store, temp.path()).unwrap_err();
    assert_matches!(err, GtdbtkError::ReferenceNotFound { reference, .. } if reference == "ws/404/missing");
}

#[test]
fn unsupported_types_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let mut fake = FakeStore::new();
    fake.add("1/1/1", info(1, 1, "reads", READS_TYPE), json!({}));
    fake.add(
        "1/2/1",
        info(1, 2, "mixed", GENOME_SET_TYPE),
        json!({"items": [{"ref": "1/1/1"}]}),
    );
    let store = SharedStore(Arc::new(fake));

    let err = materialize(&reference("1/1/1"), &store, temp.path()).unwrap_err();
    assert_matches!(err, GtdbtkError::UnsupportedType { .. });

    let err = materialize(&reference("1/2/1"), &store, temp.path()).unwrap_err();
    assert_matches!(err, GtdbtkError::UnsupportedType { reference, .. } if reference == "1/2/1;1/1/1");
    assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[test]
fn empty_set_is_invalid() {
    let temp = tempfile::tempdir().unwrap();
    let mut fake = FakeStore::new();
    fake.add(
        "1/2/1",
        info(1, 2, "empty", GENOME_SET_TYPE),
        json!({"items": []}),
    );
    let store = SharedStore(Arc::new(fake));

    let err = materialize(&reference("1/2/1"), &store, temp.path()).unwrap_err();
    assert_matches!(err, GtdbtkError::InvalidParameter(_));
}
