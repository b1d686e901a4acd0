//! Model artifact persistence.
//!
//! A saved model is a small binary file: 4 magic bytes, 1 format version
//! byte, then a Postcard-encoded payload carrying everything a serving
//! process needs - forest, encoder tables, fitted column set, config, and
//! best iteration. A loaded artifact predicts without re-reading the schema
//! config directory.
//!
//! The payload is a version-tagged enum; future format revisions add
//! variants rather than mutating existing ones.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::FeatureEncoder;
use crate::model::{AmesRegressor, FittedState, RegressorConfig};
use crate::repr::Forest;

/// Magic bytes identifying an amesboost model artifact.
pub const MAGIC: &[u8; 4] = b"AMSB";

/// Current artifact format version.
pub const FORMAT_VERSION: u8 = 1;

/// Errors raised while saving or loading a model artifact.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not an amesboost model artifact (bad magic)")]
    BadMagic,

    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u8),

    #[error("artifact payload is corrupt: {0}")]
    Payload(#[from] postcard::Error),

    #[error("refusing to save an unfitted model")]
    Unfitted,
}

/// Version-tagged artifact payload.
#[derive(Debug, Serialize, Deserialize)]
enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Serialize, Deserialize)]
struct PayloadV1 {
    config: RegressorConfig,
    encoder: FeatureEncoder,
    forest: Forest,
    feature_columns: Vec<String>,
    best_iteration: u32,
}

/// Serialize a fitted model to bytes.
///
/// # Errors
///
/// [`PersistError::Unfitted`] if the model has not been trained.
pub fn to_bytes(model: &AmesRegressor) -> Result<Vec<u8>, PersistError> {
    let state = model.fitted().ok_or(PersistError::Unfitted)?;

    let payload = Payload::V1(PayloadV1 {
        config: model.config().clone(),
        encoder: model.encoder().clone(),
        forest: state.forest.clone(),
        feature_columns: state.feature_columns.clone(),
        best_iteration: state.best_iteration as u32,
    });

    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    let bytes = postcard::to_extend(&payload, bytes)?;
    Ok(bytes)
}

/// Deserialize a model from bytes.
pub fn from_bytes(bytes: &[u8]) -> Result<AmesRegressor, PersistError> {
    if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(PersistError::BadMagic);
    }
    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }

    let Payload::V1(payload) = postcard::from_bytes(&bytes[MAGIC.len() + 1..])?;

    let state = FittedState {
        forest: payload.forest,
        feature_columns: payload.feature_columns,
        best_iteration: payload.best_iteration as usize,
    };
    Ok(AmesRegressor::from_parts(
        payload.config,
        payload.encoder,
        Some(state),
    ))
}

/// Save a fitted model to a file.
pub fn save_model(path: &Path, model: &AmesRegressor) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = to_bytes(model)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Load a fitted model from a file.
pub fn load_model(path: &Path) -> Result<AmesRegressor, PersistError> {
    let bytes = fs::read(path)?;
    from_bytes(&bytes)
}
