use crate::error::StoreError;
use crate::models::SeenEntry;
use crate::seen::SeenBackend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Non-durable backend. Clones share the same entries, so a clone kept by
/// the caller observes what the store persisted.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<Vec<SeenEntry>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn with_entries(entries: Vec<SeenEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            fail_loads: Arc::default(),
            fail_saves: Arc::default(),
        }
    }

    /// Make every later `load` fail, as a corrupt store would
    pub fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }

    /// Make every later `save` fail, as a full disk would
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<SeenEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SeenBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<SeenEntry>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "memory backend marked unreadable",
            )));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, entries: &[SeenEntry]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend marked read-only",
            )));
        }
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
