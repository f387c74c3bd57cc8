//! Durable record of listing ids that were already notified.
//!
//! `SeenStore` keeps the ids in insertion order in memory and hands full
//! snapshots to a [`SeenBackend`] on `persist`. Loading never fails: a missing
//! or unreadable backend starts the store empty.

pub mod json;
pub mod memory;
pub mod sqlite;

use crate::error::StoreError;
use crate::models::{Listing, SeenEntry};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Storage for the seen set. Entries are always passed oldest first.
#[async_trait]
pub trait SeenBackend: Send + Sync {
    async fn load(&self) -> Result<Vec<SeenEntry>, StoreError>;

    /// Replace the stored set with `entries`
    async fn save(&self, entries: &[SeenEntry]) -> Result<(), StoreError>;

    /// Human-readable location for log lines
    fn describe(&self) -> String;
}

pub struct SeenStore {
    backend: Box<dyn SeenBackend>,
    entries: VecDeque<SeenEntry>,
    ids: HashSet<String>,
}

impl SeenStore {
    pub async fn load(backend: Box<dyn SeenBackend>) -> Self {
        let loaded = match backend.load().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    store = %backend.describe(),
                    error = %e,
                    "Seen store unreadable, starting empty"
                );
                Vec::new()
            }
        };

        let mut store = Self {
            backend,
            entries: VecDeque::with_capacity(loaded.len()),
            ids: HashSet::with_capacity(loaded.len()),
        };
        for entry in loaded {
            store.push(entry);
        }

        info!(
            store = %store.backend.describe(),
            "Loaded {} seen listings",
            store.len()
        );
        store
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` when the id was already present
    pub fn insert(&mut self, id: &str) -> bool {
        self.push(SeenEntry::new(id))
    }

    /// Like [`insert`](Self::insert) but keeps the listing's url, title and price
    pub fn insert_listing(&mut self, listing: &Listing) -> bool {
        self.push(SeenEntry::from_listing(listing))
    }

    /// Insert every id not yet present, in iteration order. Returns how many were new.
    pub fn seed_all<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.insert(id.as_ref()))
            .count()
    }

    /// Once the store holds `max_size` or more ids, keep only the newest
    /// `max_size / 2`. Returns how many were dropped.
    pub fn prune(&mut self, max_size: usize) -> usize {
        if self.entries.len() < max_size {
            return 0;
        }
        let keep = max_size / 2;
        let drop_count = self.entries.len() - keep;
        for entry in self.entries.drain(..drop_count) {
            self.ids.remove(&entry.id);
        }
        drop_count
    }

    pub async fn persist(&self) -> Result<(), StoreError> {
        let snapshot: Vec<SeenEntry> = self.entries.iter().cloned().collect();
        self.backend.save(&snapshot).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids oldest first
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    fn push(&mut self, entry: SeenEntry) -> bool {
        if entry.id.is_empty() || !self.ids.insert(entry.id.clone()) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }
}
