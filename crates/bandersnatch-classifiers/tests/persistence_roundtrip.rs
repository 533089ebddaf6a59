//! Integration tests for saving and loading trained machines.

use bandersnatch_classifiers::persistence::{self, FORMAT_VERSION, HEADER_LEN};
use bandersnatch_classifiers::{
    record, Dataset, ForestConfig, Machine, MachineError, PersistenceError, Record, TrainConfig,
    Value,
};

fn trained_machine() -> Machine {
    let dataset = Dataset::from_records((0..30i64).map(|i| {
        let rank = i % 3;
        vec![
            ("Level", Value::Int(rank * 30 + i % 10)),
            ("Health", Value::Float(rank as f64 * 25.5 + (i as f64) * 0.3)),
            ("Energy", Value::Int(90 - rank * 20 - i % 7)),
            ("Rarity", Value::Text(format!("Rank {}", rank))),
        ]
    }));
    let config = TrainConfig::default().with_forest(ForestConfig {
        n_trees: 25,
        ..ForestConfig::default()
    });
    Machine::train(&dataset, &config).unwrap()
}

fn probes() -> Vec<Record> {
    (0..15i64)
        .map(|i| {
            record([
                ("Level", Value::Int(i * 6)),
                ("Health", Value::Float(i as f64 * 4.75 + 0.125)),
                ("Energy", Value::Int(95 - i * 5)),
            ])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn load_save_predicts_identically() {
    let machine = trained_machine();
    let bytes = persistence::save(&machine).unwrap();
    let loaded = persistence::load(&bytes).unwrap();

    for row in probes() {
        let a = machine.predict(&row).unwrap();
        let b = loaded.predict(&row).unwrap();
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    }
    assert_eq!(machine.describe(), loaded.describe());
    assert_eq!(machine, loaded);
}

#[test]
fn save_is_stable_across_round_trips() {
    let machine = trained_machine();
    let bytes = persistence::save(&machine).unwrap();
    let again = persistence::save(&persistence::load(&bytes).unwrap()).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn file_round_trip_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("nested").join("machine.bsnm");
    let machine = trained_machine();

    persistence::save_to_path(&machine, &path).unwrap();
    assert!(path.exists());
    let loaded = persistence::open(&path).unwrap();
    assert_eq!(machine.describe(), loaded.describe());
}

#[test]
fn open_missing_file_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        persistence::open(dir.path().join("nope.bsnm")),
        Err(MachineError::Persistence(PersistenceError::Io { .. }))
    ));
}

// ---------------------------------------------------------------------------
// Damaged artifacts
// ---------------------------------------------------------------------------

#[test]
fn truncated_blob_is_rejected() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    let cut = &bytes[..bytes.len() - 10];
    assert!(matches!(
        persistence::load(cut),
        Err(MachineError::Persistence(PersistenceError::Truncated { .. }))
    ));
    assert!(matches!(
        persistence::load(&bytes[..HEADER_LEN - 1]),
        Err(MachineError::Persistence(PersistenceError::Truncated { .. }))
    ));
}

#[test]
fn flipped_payload_byte_is_corruption() {
    let mut bytes = persistence::save(&trained_machine()).unwrap();
    let idx = HEADER_LEN + (bytes.len() - HEADER_LEN) / 2;
    bytes[idx] ^= 0x01;
    assert!(matches!(
        persistence::load(&bytes),
        Err(MachineError::Persistence(PersistenceError::Corrupt(_)))
    ));
}

#[test]
fn trailing_bytes_are_corruption() {
    let mut bytes = persistence::save(&trained_machine()).unwrap();
    bytes.extend_from_slice(b"junk");
    assert!(matches!(
        persistence::load(&bytes),
        Err(MachineError::Persistence(PersistenceError::Corrupt(_)))
    ));
}

#[test]
fn future_version_is_reported_as_such() {
    let mut bytes = persistence::save(&trained_machine()).unwrap();
    let next = FORMAT_VERSION + 1;
    bytes[4..6].copy_from_slice(&next.to_le_bytes());
    match persistence::load(&bytes) {
        Err(MachineError::Persistence(PersistenceError::UnsupportedVersion { found, supported })) => {
            assert_eq!(found, next);
            assert_eq!(supported, FORMAT_VERSION);
        }
        other => panic!("expected version error, got {:?}", other.map(|m| m.describe())),
    }
}

#[test]
fn wrong_magic_is_rejected() {
    let mut bytes = persistence::save(&trained_machine()).unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        persistence::load(&bytes),
        Err(MachineError::Persistence(PersistenceError::BadMagic))
    ));
}

/// Rewrite the JSON payload of `bytes` and wrap it in a header with a
/// matching length and checksum.
fn reforge(bytes: &[u8], edit: impl FnOnce(&mut serde_json::Value)) -> Vec<u8> {
    use sha2::{Digest, Sha256};

    let mut payload: serde_json::Value = serde_json::from_slice(&bytes[HEADER_LEN..]).unwrap();
    edit(&mut payload);
    let tampered = serde_json::to_vec(&payload).unwrap();

    let mut forged = bytes[..6].to_vec();
    forged.extend_from_slice(&(tampered.len() as u64).to_le_bytes());
    forged.extend_from_slice(Sha256::digest(&tampered).as_slice());
    forged.extend_from_slice(&tampered);
    forged
}

fn assert_corrupt(bytes: &[u8]) {
    assert!(matches!(
        persistence::load(bytes),
        Err(MachineError::Persistence(PersistenceError::Corrupt(_)))
    ));
}

#[test]
fn reforged_untouched_payload_still_loads() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    assert!(persistence::load(&reforge(&bytes, |_| {})).is_ok());
}

#[test]
fn valid_checksum_over_inconsistent_payload_is_corruption() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    assert_corrupt(&reforge(&bytes, |p| {
        p["codec"]["classes"][0] = serde_json::json!("Rank 9");
    }));
}

#[test]
fn duplicate_feature_in_payload_is_corruption() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    assert_corrupt(&reforge(&bytes, |p| {
        let first = p["schema"]["features"][0].clone();
        p["schema"]["features"][1] = first;
    }));
}

#[test]
fn target_listed_as_feature_is_corruption() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    assert_corrupt(&reforge(&bytes, |p| {
        let first = p["schema"]["features"][0].clone();
        p["schema"]["target"] = first;
    }));
}

#[test]
fn tree_count_mismatch_is_corruption() {
    let bytes = persistence::save(&trained_machine()).unwrap();
    assert_corrupt(&reforge(&bytes, |p| {
        p["metadata"]["n_trees"] = serde_json::json!(99);
    }));
}
