//! Snapshot Files
//!
//! Whole-ledger persistence for the in-memory store: players and the audit
//! log are bincode-encoded behind a small header carrying a SHA-256 digest
//! of the payload.
//!
//! # File Format
//!
//! ```text
//! ┌────────┬─────────┬──────────────┬─────────────────┐
//! │ "KEZE" │ version │ sha256(body) │ bincode(body)   │
//! │ 4 B    │ u32 LE  │ 32 B         │ rest of file    │
//! └────────┴─────────┴──────────────┴─────────────────┘
//! ```
//!
//! Writes go to a temp file first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::game::player::Player;
use crate::game::record::GameActionRecord;
use crate::ledger::{Result, StorageError};

const MAGIC: &[u8; 4] = b"KEZE";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 32;

/// Serializable contents of the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Every player, in id order
    pub players: Vec<Player>,
    /// Audit log, oldest first
    pub actions: Vec<GameActionRecord>,
}

/// Location of a snapshot on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot stored at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Path of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, `None` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(StorageError::Corrupted(format!(
                "{} is not a ledger snapshot",
                self.path.display()
            )));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(StorageError::Corrupted(format!("unsupported snapshot version {}", version)));
        }

        let body = &bytes[HEADER_LEN..];
        if digest(body)[..] != bytes[8..HEADER_LEN] {
            return Err(StorageError::Corrupted("snapshot digest mismatch".into()));
        }

        let snapshot: LedgerSnapshot = bincode::deserialize(body)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tracing::debug!(
            path = %self.path.display(),
            players = snapshot.players.len(),
            actions = snapshot.actions.len(),
            "loaded ledger snapshot"
        );

        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically, returning the payload digest.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<[u8; 32]> {
        let body = bincode::serialize(snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let hash = digest(&body);

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&hash);
        bytes.extend_from_slice(&body);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::info!(
            path = %self.path.display(),
            digest = %hex::encode(&hash[..8]),
            players = snapshot.players.len(),
            "saved ledger snapshot"
        );

        Ok(hash)
    }
}

fn digest(body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
