//! Secret index (AVP v0.1.0 §4.3): name-to-slot bookkeeping over the
//! backend's data-slot pool, with lowest-free-index allocation and
//! tombstone reuse.

use std::collections::BTreeMap;

use nexusclaw_backend::{Backend, DATA_SLOT_RANGE};

use crate::error::DispatchError;
use crate::limits::MAX_SECRETS;
use crate::response::SecretSummary;

/// Metadata for one live secret.
#[derive(Debug, Clone)]
struct Entry {
    slot: u8,
    created_at: u64,
    updated_at: u64,
    /// Insertion order, for stable `LIST` output across tombstone reuse.
    sequence: u64,
}

/// In-memory name → slot/metadata mapping (AVP v0.1.0 §3, §4.3).
///
/// Holds no secret bytes itself — only enough bookkeeping to route a
/// name to a backend slot. `put`/`get`/`remove` are the only paths that
/// touch the backend.
#[derive(Debug, Default)]
pub struct SecretIndex {
    entries: BTreeMap<String, Entry>,
    next_sequence: u64,
}

impl SecretIndex {
    /// Construct an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, allocating a new slot if `name` is
    /// unseen (AVP v0.1.0 §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::CapacityExceeded`] if a new name is being
    /// inserted and the index is already full, or a backend-derived error
    /// if the write itself fails. On write failure, no metadata is
    /// committed — new entries appear only after a successful write.
    pub fn put(&mut self, backend: &impl Backend, name: &str, value: &[u8]) -> Result<(), DispatchError> {
        let now = backend.now_seconds();

        if let Some(entry) = self.entries.get(name) {
            let slot = entry.slot;
            backend.slot_write(slot, value)?;
            self.entries.get_mut(name).expect("looked up above").updated_at = now;
            return Ok(());
        }

        if self.entries.len() >= MAX_SECRETS {
            return Err(DispatchError::CapacityExceeded);
        }

        let slot = self.allocate_slot()?;
        backend.slot_write(slot, value)?;

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.entries.insert(
            name.to_string(),
            Entry {
                slot,
                created_at: now,
                updated_at: now,
                sequence,
            },
        );
        Ok(())
    }

    /// Read the current bytes stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SecretNotFound`] on a miss, or a
    /// backend-derived error if the read fails.
    pub fn get(&self, backend: &impl Backend, name: &str) -> Result<Vec<u8>, DispatchError> {
        let entry = self.entries.get(name).ok_or(DispatchError::SecretNotFound)?;
        Ok(backend.slot_read(entry.slot)?)
    }

    /// Remove `name`, erasing its backing slot.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SecretNotFound`] on a miss. If the erase
    /// fails, the entry is retained rather than silently dropped.
    pub fn remove(&mut self, backend: &impl Backend, name: &str) -> Result<(), DispatchError> {
        let entry = self.entries.get(name).ok_or(DispatchError::SecretNotFound)?;
        let slot = entry.slot;
        backend.slot_erase(slot)?;
        self.entries.remove(name);
        Ok(())
    }

    /// Enumerate live entries in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<SecretSummary> {
        let mut out: Vec<(&u64, &String, &Entry)> = self
            .entries
            .iter()
            .map(|(name, entry)| (&entry.sequence, name, entry))
            .collect();
        out.sort_by_key(|(seq, _, _)| **seq);
        out.into_iter()
            .map(|(_, name, entry)| SecretSummary {
                name: name.clone(),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
            })
            .collect()
    }

    /// Current occupancy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn allocate_slot(&self) -> Result<u8, DispatchError> {
        let used: std::collections::HashSet<u8> = self.entries.values().map(|e| e.slot).collect();
        DATA_SLOT_RANGE
            .into_iter()
            .find(|slot| !used.contains(slot))
            .ok_or(DispatchError::CapacityExceeded)
    }
}
