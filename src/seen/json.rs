use crate::error::StoreError;
use crate::models::SeenEntry;
use crate::seen::SeenBackend;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Seen set stored as a pretty-printed JSON array.
///
/// Reads both the current entry objects and the older flat array of id
/// strings. Writes go to a sibling `.tmp` file that is then renamed over the
/// target, so a crash mid-write leaves the previous file intact.
pub struct JsonFileBackend {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Id(String),
    Entry(SeenEntry),
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl SeenBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<SeenEntry>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let stored: Vec<StoredEntry> = serde_json::from_str(&data)?;
        Ok(stored
            .into_iter()
            .map(|stored| match stored {
                StoredEntry::Id(id) => SeenEntry::new(id),
                StoredEntry::Entry(entry) => entry,
            })
            .collect())
    }

    async fn save(&self, entries: &[SeenEntry]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seen::SeenStore;
    use crate::testing::sample_listing;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "olx-sniper-{}-{}-{name}",
            std::process::id(),
            rand::random::<u64>()
        ))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let backend = JsonFileBackend::new(temp_file("missing.json"));
        assert!(backend.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_trip_through_store() {
        let path = temp_file("seen.json");

        let mut store = SeenStore::load(Box::new(JsonFileBackend::new(&path))).await;
        store.insert_listing(&sample_listing("r1"));
        store.insert("r2");
        store.persist().await.unwrap();

        let reloaded = SeenStore::load(Box::new(JsonFileBackend::new(&path))).await;
        assert_eq!(reloaded.ids().collect::<Vec<_>>(), vec!["r1", "r2"]);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"title\": \"iPhone r1\""));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn reads_legacy_flat_id_array() {
        let path = temp_file("legacy.json");
        std::fs::write(&path, r#"["1", "2", {"id": "3", "seen_at": "2025-01-01T00:00:00Z"}]"#).unwrap();

        let entries = JsonFileBackend::new(&path).load().await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_and_store_starts_empty() {
        let path = temp_file("corrupt.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileBackend::new(&path).load().await,
            Err(StoreError::Json(_))
        ));
        let store = SeenStore::load(Box::new(JsonFileBackend::new(&path))).await;
        assert!(store.is_empty());
        std::fs::remove_file(&path).ok();
    }
}
