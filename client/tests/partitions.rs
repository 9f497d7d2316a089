use std::{fs, num::NonZeroUsize, path::Path};

use client::{
    ClientErr,
    data::{FemnistLoader, PartitionId, PartitionLoader, Sent140Loader, ShakespeareLoader},
};
use comms::specs::federated::{Split, Subset};
use serde_json::json;

fn write_partition(root: &Path, id: &PartitionId<'_>, body: &serde_json::Value) {
    let path = id.path(root);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body.to_string()).unwrap();
}

fn batch(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn femnist_partition_loads_in_batches() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("femnist", Split::Train, "3", Subset::Support);
    write_partition(
        root.path(),
        &id,
        &json!({
            "x": [[0.0, 0.1, 0.2, 0.3], [1.0, 1.1, 1.2, 1.3], [2.0, 2.1, 2.2, 2.3]],
            "y": [0, 2, 1],
            "idx": [10, 11, 12],
        }),
    );

    let loader = FemnistLoader::new(4, 3);
    let (mut batches, count) = loader.load(root.path(), &id, batch(2), true, Some(1)).unwrap();

    assert_eq!(count, 3);
    let sizes: Vec<_> = batches.epoch().map(|(x, y)| (x.dim(), y.dim())).collect();
    assert_eq!(sizes, vec![((2, 4), (2, 1)), ((1, 4), (1, 1))]);

    let partition = loader.decode(&id.path(root.path())).unwrap();
    assert_eq!(partition.meta.idx, Some(json!([10, 11, 12])));
}

#[test]
fn missing_partition_is_data_not_found() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("A", Split::Train, "7", Subset::Query);

    let err = Sent140Loader::new(2)
        .load(root.path(), &id, batch(4), false, None)
        .unwrap_err();

    match err {
        ClientErr::DataNotFound { path } => assert!(path.ends_with("A/train/7/query.json")),
        other => panic!("expected DataNotFound, got {other}"),
    }
}

#[test]
fn undecodable_partition_is_malformed() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("sent140", Split::Test, "0", Subset::Query);
    let path = id.path(root.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{\"x\": [[1.0, 2.0]], \"y\": [").unwrap();

    let err = Sent140Loader::new(2).decode(&path).unwrap_err();
    assert!(matches!(err, ClientErr::MalformedPartition { .. }));
}

#[test]
fn labels_are_validated_per_task() {
    let root = tempfile::tempdir().unwrap();

    let id = PartitionId::new("sent140", Split::Train, "0", Subset::Support);
    write_partition(root.path(), &id, &json!({"x": [[1.0, 2.0]], "y": [3]}));
    let err = Sent140Loader::new(2).decode(&id.path(root.path())).unwrap_err();
    assert!(matches!(err, ClientErr::MalformedPartition { .. }));

    let id = PartitionId::new("femnist", Split::Train, "0", Subset::Support);
    write_partition(root.path(), &id, &json!({"x": [[1.0]], "y": [62]}));
    let err = FemnistLoader::new(1, 62).decode(&id.path(root.path())).unwrap_err();
    assert!(matches!(err, ClientErr::MalformedPartition { .. }));
}

#[test]
fn mismatched_lengths_are_malformed() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("sent140", Split::Val, "1", Subset::Support);
    write_partition(root.path(), &id, &json!({"x": [[1.0, 2.0], [3.0, 4.0]], "y": [1]}));

    let err = Sent140Loader::new(2).decode(&id.path(root.path())).unwrap_err();
    assert!(matches!(err, ClientErr::MalformedPartition { .. }));
}

#[test]
fn shakespeare_drops_unknown_labels_before_counting() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("shakespeare", Split::Train, "9", Subset::Support);
    write_partition(
        root.path(),
        &id,
        &json!({
            "x": ["to b", "or n", "ot t", "o be"],
            "y": ["e", "o", ".", " "],
            "character": "HAMLET",
        }),
    );

    let loader = ShakespeareLoader::new(4);
    let (mut batches, count) = loader.load(root.path(), &id, batch(8), false, None).unwrap();
    assert_eq!(count, 3);

    let (x, y) = batches.epoch().next().unwrap();
    assert_eq!(x.dim(), (3, 4));
    assert_eq!(y.column(0).to_vec(), vec![30.0, 40.0, 52.0]);

    let partition = loader.decode(&id.path(root.path())).unwrap();
    assert_eq!(partition.meta.character.as_deref(), Some("HAMLET"));
}

#[test]
fn shakespeare_rejects_unknown_input_characters() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("shakespeare", Split::Train, "9", Subset::Support);
    write_partition(root.path(), &id, &json!({"x": ["ab~d"], "y": ["e"]}));

    let err = ShakespeareLoader::new(4)
        .decode(&id.path(root.path()))
        .unwrap_err();
    assert!(matches!(err, ClientErr::MalformedPartition { .. }));
}

#[test]
fn empty_partition_is_valid() {
    let root = tempfile::tempdir().unwrap();
    let id = PartitionId::new("sent140", Split::Test, "2", Subset::Query);
    write_partition(root.path(), &id, &json!({"x": [], "y": []}));

    let (mut batches, count) = Sent140Loader::new(2)
        .load(root.path(), &id, batch(4), true, None)
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(batches.epoch().count(), 0);
}
