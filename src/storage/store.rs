use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use super::types::{ItemRecord, ParsedItem, StoreError, UpsertStats};
use crate::util::atomic_write;

/// In-memory view of the persisted item store.
///
/// Keyed by normalized guid. A `BTreeMap` keeps the serialized file stable
/// across runs so an unchanged feed produces a byte-identical store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    items: BTreeMap<String, ItemRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store from `path`.
    ///
    /// Never fails: a missing file, an unreadable file, or content that does
    /// not deserialize all yield an empty store. The next `save` then replaces
    /// whatever was on disk.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No store file yet, starting empty");
                return Self::new();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read store, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str::<BTreeMap<String, ItemRecord>>(&content) {
            Ok(mut items) => {
                items.retain(|guid, _| !guid.is_empty());
                tracing::debug!(path = %path.display(), records = items.len(), "Loaded store");
                Self { items }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt store file, starting empty");
                Self::new()
            }
        }
    }

    /// Removes every record first seen strictly before `now - retention`.
    ///
    /// Returns the number of records removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let before = self.items.len();
        self.items.retain(|_, record| record.fetched_at >= cutoff);
        let removed = before - self.items.len();
        if removed > 0 {
            tracing::debug!(removed, cutoff = %cutoff.to_rfc3339(), "Pruned expired records");
        }
        removed
    }

    /// Inserts unseen guids with `fetched_at = now` and refreshes known ones.
    ///
    /// Items with an empty guid are skipped and never stored. For known guids
    /// every field except `guid` and `fetched_at` is replaced.
    pub fn upsert<I>(&mut self, items: I, now: DateTime<Utc>) -> UpsertStats
    where
        I: IntoIterator<Item = ParsedItem>,
    {
        let mut stats = UpsertStats::default();
        for item in items {
            if item.guid.is_empty() {
                stats.skipped += 1;
                continue;
            }
            match self.items.get_mut(&item.guid) {
                Some(existing) => {
                    existing.refresh_from(item);
                    stats.updated += 1;
                }
                None => {
                    let record = ItemRecord::first_seen(item, now);
                    self.items.insert(record.guid.clone(), record);
                    stats.inserted += 1;
                }
            }
        }
        stats
    }

    /// Writes the store as JSON, atomically replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.items)?;
        atomic_write(path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), records = self.items.len(), "Saved store");
        Ok(())
    }

    pub fn get(&self, guid: &str) -> Option<&ItemRecord> {
        self.items.get(guid)
    }

    /// All records, in guid order.
    pub fn records(&self) -> impl Iterator<Item = &ItemRecord> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
