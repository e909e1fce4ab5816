//! Save envelope encoding and the storage seam.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::hash::Hasher;
use std::rc::Rc;
use twox_hash::XxHash64;

use crate::clock::SimTime;
use crate::constants::{SAVE_CHECKSUM_SEED, SAVE_FORMAT_VERSION};
use crate::error::SnapshotError;
use crate::world::WorldState;

/// A persisted world with enough metadata to reject stale or corrupt blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveEnvelope {
    pub version: u32,
    pub slot: String,
    pub saved_at: SimTime,
    pub checksum: u64,
    pub snapshot: WorldState,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

impl SaveEnvelope {
    /// Wrap `snapshot`, stamping the current format version and checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn seal(slot: &str, snapshot: WorldState) -> Result<Self, SnapshotError> {
        let checksum = snapshot_checksum(&snapshot)?;
        Ok(Self {
            version: SAVE_FORMAT_VERSION,
            slot: slot.to_string(),
            saved_at: snapshot.time,
            checksum,
            snapshot,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized.
    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and verify a blob: version first, then checksum, then every world invariant.
    ///
    /// # Errors
    ///
    /// Returns the first [`SnapshotError`] encountered; no partial world is produced.
    pub fn decode(blob: &str) -> Result<Self, SnapshotError> {
        let header: EnvelopeHeader = serde_json::from_str(blob)?;
        if header.version != SAVE_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: header.version,
                expected: SAVE_FORMAT_VERSION,
            });
        }
        let envelope: Self = serde_json::from_str(blob)?;
        let computed = snapshot_checksum(&envelope.snapshot)?;
        if computed != envelope.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                stored: envelope.checksum,
                computed,
            });
        }
        envelope.snapshot.validate()?;
        Ok(envelope)
    }
}

/// XxHash64 over the canonical JSON form of the snapshot.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be serialized.
pub fn snapshot_checksum(snapshot: &WorldState) -> Result<u64, SnapshotError> {
    let bytes = serde_json::to_vec(snapshot)?;
    let mut hasher = XxHash64::with_seed(SAVE_CHECKSUM_SEED);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

/// Byte storage for save blobs keyed by slot name.
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store a blob, replacing any previous one in the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn save(&self, slot: &str, blob: &str) -> Result<(), Self::Error>;

    /// Fetch a blob; `Ok(None)` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    fn load(&self, slot: &str) -> Result<Option<String>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed.
    fn delete(&self, slot: &str) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the storage cannot be enumerated.
    fn list(&self) -> Result<Vec<String>, Self::Error>;
}

/// In-process storage; clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a slot's raw blob, bypassing envelope sealing.
    pub fn put_raw(&self, slot: &str, blob: impl Into<String>) {
        self.slots.borrow_mut().insert(slot.to_string(), blob.into());
    }
}

impl GameStorage for MemoryStorage {
    type Error = Infallible;

    fn save(&self, slot: &str, blob: &str) -> Result<(), Self::Error> {
        self.put_raw(slot, blob);
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.slots.borrow().get(slot).cloned())
    }

    fn delete(&self, slot: &str) -> Result<(), Self::Error> {
        self.slots.borrow_mut().remove(slot);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.slots.borrow().keys().cloned().collect())
    }
}
