//! Versioned byte format for trained machines.
//!
//! Layout (all integers little-endian):
//!
//! | offset | size | field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | magic `BSNM`                   |
//! | 4      | 2    | format version                 |
//! | 6      | 8    | payload length                 |
//! | 14     | 32   | SHA-256 of the payload         |
//! | 46     | n    | JSON payload                   |
//!
//! The payload holds one section per part of the machine: `schema`,
//! `codec`, `forest` and `metadata`. Readers reject versions they do not
//! know, so a new version can change the payload freely.
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::LabelCodec;
use crate::error::{MachineError, PersistenceError, Result};
use crate::forest::RandomForest;
use crate::machine::{Machine, TrainingMetadata};
use crate::schema::FeatureSchema;

pub const MAGIC: [u8; 4] = *b"BSNM";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 8 + 32;

#[derive(Serialize)]
struct PayloadRef<'a> {
    schema: &'a FeatureSchema,
    codec: &'a LabelCodec,
    forest: &'a RandomForest,
    metadata: &'a TrainingMetadata,
}

#[derive(Deserialize)]
struct Payload {
    schema: FeatureSchema,
    codec: LabelCodec,
    forest: RandomForest,
    metadata: TrainingMetadata,
}

/// Serialize `machine` into a self-describing blob.
pub fn save(machine: &Machine) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&PayloadRef {
        schema: &machine.schema,
        codec: &machine.codec,
        forest: &machine.forest,
        metadata: &machine.metadata,
    })
    .map_err(|e| PersistenceError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(Sha256::digest(&payload).as_slice());
    out.extend_from_slice(&payload);

    log::debug!(
        "Serialized machine: {} trees, {} bytes (format v{})",
        machine.forest.n_trees(),
        out.len(),
        FORMAT_VERSION
    );
    Ok(out)
}

/// Rebuild a machine from a blob written by `save`.
///
/// The result owns fresh copies of every part and shares nothing with the
/// machine that was saved.
pub fn load(bytes: &[u8]) -> Result<Machine> {
    let magic_len = bytes.len().min(MAGIC.len());
    if bytes[..magic_len] != MAGIC[..magic_len] {
        return Err(PersistenceError::BadMagic.into());
    }
    if bytes.len() < HEADER_LEN {
        return Err(PersistenceError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        }
        .into());
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        }
        .into());
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[6..14]);
    let declared = u64::from_le_bytes(len_bytes);
    let available = (bytes.len() - HEADER_LEN) as u64;
    if declared > available {
        return Err(PersistenceError::Truncated {
            expected: HEADER_LEN.saturating_add(usize::try_from(declared).unwrap_or(usize::MAX)),
            actual: bytes.len(),
        }
        .into());
    }
    if declared < available {
        return Err(PersistenceError::Corrupt(format!(
            "{} trailing bytes after payload",
            available - declared
        ))
        .into());
    }

    let digest = &bytes[14..HEADER_LEN];
    let payload = &bytes[HEADER_LEN..];
    if Sha256::digest(payload).as_slice() != digest {
        return Err(PersistenceError::Corrupt("payload checksum mismatch".to_string()).into());
    }

    let payload: Payload = serde_json::from_slice(payload)
        .map_err(|e| PersistenceError::Corrupt(format!("undecodable payload: {}", e)))?;
    check_consistency(&payload).map_err(PersistenceError::Corrupt)?;

    log::debug!("Loaded machine: {} trees, {} bytes", payload.forest.n_trees(), bytes.len());
    Ok(Machine {
        schema: payload.schema,
        codec: payload.codec,
        forest: payload.forest,
        metadata: payload.metadata,
    })
}

fn check_consistency(p: &Payload) -> std::result::Result<(), String> {
    if p.schema.is_empty() {
        return Err("schema has no feature columns".to_string());
    }
    let features = p.schema.features();
    let mut seen = HashSet::with_capacity(features.len());
    if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
        return Err(format!("schema lists feature '{}' more than once", dup));
    }
    if seen.contains(p.schema.target()) {
        return Err(format!("target '{}' is also listed as a feature", p.schema.target()));
    }
    let classes = p.codec.classes();
    if classes.len() < 2 {
        return Err(format!("codec holds {} classes, expected at least 2", classes.len()));
    }
    if !classes.windows(2).all(|w| w[0] < w[1]) {
        return Err("codec classes are not strictly sorted".to_string());
    }
    if p.metadata.classes != classes {
        return Err("metadata class list disagrees with codec".to_string());
    }
    if p.forest.n_features() != p.schema.len() {
        return Err(format!(
            "forest expects {} features, schema lists {}",
            p.forest.n_features(),
            p.schema.len()
        ));
    }
    if p.forest.n_classes() != classes.len() {
        return Err(format!(
            "forest predicts {} classes, codec holds {}",
            p.forest.n_classes(),
            classes.len()
        ));
    }
    if p.metadata.n_trees != p.forest.n_trees() {
        return Err(format!(
            "metadata records {} trees, forest holds {}",
            p.metadata.n_trees,
            p.forest.n_trees()
        ));
    }
    p.forest.check()
}

/// Write `machine` to `path`, creating parent directories as needed.
pub fn save_to_path<P: AsRef<Path>>(machine: &Machine, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_err = |source| {
        MachineError::from(PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let bytes = save(machine)?;
    fs::write(path, bytes).map_err(io_err)?;
    log::info!("Saved machine to {}", path.display());
    Ok(())
}

/// Read a machine written by `save_to_path`.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Machine> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load(&bytes)
}
