use std::path::Path;

use platformer_engine::{
    read_text, restore_world, snapshot_digest, PersistenceError, RestoredWorld, SnapshotError,
    WorldPayload,
};
use thiserror::Error;
use tracing::info;

use super::json::{parse_json, JsonError};

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error(transparent)]
    Read(#[from] PersistenceError),
    #[error(transparent)]
    Parse(#[from] JsonError),
    #[error("restore snapshot: {0}")]
    Restore(#[from] SnapshotError),
}

pub(crate) fn parse_snapshot_json(raw: &str) -> Result<WorldPayload, SaveError> {
    Ok(parse_json("save", raw)?)
}

pub(crate) fn load_snapshot(path: &Path) -> Result<RestoredWorld, SaveError> {
    let raw = read_text(path)?;
    let payload = parse_snapshot_json(&raw)?;
    let digest = snapshot_digest(&payload)?;
    let restored = restore_world(&payload)?;
    info!(
        path = %path.display(),
        owner = %restored.owner,
        nodes = restored.tree.len(),
        digest = %digest,
        "snapshot_loaded"
    );
    Ok(restored)
}
