use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use snafu::ResultExt;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::model::{Metadata, RecordingId};

pub use error::*;

mod error;

/// JSON document store holding one [Metadata] file per recording.
///
/// Writes go through a staging file and a rename, so readers never see a torn document.
/// Read-modify-write cycles on the same recording are serialized within this process;
/// separate processes sharing the directory still race, and the last write wins.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
    locks: Arc<DashMap<RecordingId, Arc<Mutex<()>>>>,
}

impl MetadataStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .context(CreateDirectorySnafu { path: &dir })?;

        Ok(Self {
            dir,
            locks: Arc::default(),
        })
    }

    pub fn path(&self, id: &RecordingId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn lock(&self, id: RecordingId) -> LockEntry {
        let lock = self.locks.entry(id).or_default().clone();

        LockEntry {
            locks: self.locks.clone(),
            id,
            lock,
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &RecordingId) -> Result<Option<Metadata>> {
        read(&self.path(id), id).await
    }

    #[instrument(skip(self, record), fields(video_id = %record.video_id))]
    pub async fn create(&self, record: &Metadata) -> Result<()> {
        let entry = self.lock(record.video_id);
        let _guard = entry.lock.lock().await;

        write(&self.path(&record.video_id), record).await
    }

    /// Apply `change` to the stored record and persist the result.
    ///
    /// A recording without a document gets a fresh one (unknown duration) before `change` runs.
    #[instrument(skip(self, change))]
    pub async fn update<T>(
        &self, id: RecordingId, change: impl FnOnce(&mut Metadata) -> T,
    ) -> Result<(Metadata, T)> {
        let entry = self.lock(id);
        let _guard = entry.lock.lock().await;

        let path = self.path(&id);
        let mut record = match read(&path, &id).await? {
            Some(record) => record,
            None => {
                tracing::debug!(%id, "no metadata document yet, starting a fresh record");
                Metadata::new(id, None)
            }
        };

        let output = change(&mut record);
        write(&path, &record).await?;

        Ok((record, output))
    }
}

/// A recording's slot in the lock map. The slot is dropped with the last user.
struct LockEntry {
    locks: Arc<DashMap<RecordingId, Arc<Mutex<()>>>>,
    id: RecordingId,
    lock: Arc<Mutex<()>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        // two owners left: the map and this entry
        self.locks.remove_if(&self.id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Documents are named after their recording, so a missing or unreadable `videoId` falls back to `id`.
async fn read(path: &Path, id: &RecordingId) -> Result<Option<Metadata>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error).context(ReadSnafu { path }),
    };

    let mut record: Metadata = serde_json::from_slice(&raw).context(ParseSnafu { path })?;
    if record.video_id.is_nil() {
        record.video_id = *id;
    }

    Ok(Some(record))
}

async fn write(path: &Path, record: &Metadata) -> Result<()> {
    let body = serde_json::to_vec_pretty(record).context(SerializeSnafu)?;

    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, body)
        .await
        .context(WriteSnafu { path: &staging })?;
    tokio::fs::rename(&staging, path)
        .await
        .context(WriteSnafu { path })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WatchedSeconds;

    async fn store() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("data")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn missing_document_reads_as_none() {
        let (_dir, store) = store().await;
        let result = store.get(&RecordingId::generate()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn created_document_reads_back() {
        let (_dir, store) = store().await;
        let record = Metadata::new(RecordingId::generate(), Some(12.0));

        store.create(&record).await.unwrap();

        let stored = store.get(&record.video_id).await.unwrap();
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn documents_are_pretty_printed_with_two_spaces() {
        let (_dir, store) = store().await;
        let record = Metadata::new(RecordingId::generate(), None);
        store.create(&record).await.unwrap();

        let raw = std::fs::read_to_string(store.path(&record.video_id)).unwrap();
        assert!(raw.starts_with("{\n  \"videoId\""), "unexpected layout: {raw}");
    }

    #[tokio::test]
    async fn update_creates_missing_documents() {
        let (_dir, store) = store().await;
        let id = RecordingId::generate();

        let (record, views) = store.update(id, Metadata::record_view).await.unwrap();

        assert_eq!(views, 1);
        assert_eq!(record.video_id, id);
        assert_eq!(record.duration, None);
        assert_eq!(store.get(&id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn update_keeps_the_furthest_progress() {
        let (_dir, store) = store().await;
        let id = RecordingId::generate();

        for seconds in [20.0, 35.0, 10.0] {
            let watched = WatchedSeconds::new(seconds).unwrap();
            store
                .update(id, |meta| meta.record_progress(watched))
                .await
                .unwrap();
        }

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.watched_seconds, 35.0);
    }

    #[tokio::test]
    async fn concurrent_views_are_not_lost() {
        let (_dir, store) = store().await;
        let id = RecordingId::generate();
        store.create(&Metadata::new(id, Some(30.0))).await.unwrap();

        let updates = (0..32).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.update(id, Metadata::record_view).await })
        });

        for update in futures::future::join_all(updates).await {
            update.unwrap().unwrap();
        }

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.views, 32);
    }

    #[tokio::test]
    async fn lock_slots_are_released_after_use() {
        let (_dir, store) = store().await;
        let shared = RecordingId::generate();

        let updates = (0..200).map(|n| {
            let store = store.clone();
            let id = if n % 2 == 0 { shared } else { RecordingId::generate() };
            tokio::spawn(async move { store.update(id, Metadata::record_view).await })
        });

        for update in futures::future::join_all(updates).await {
            update.unwrap().unwrap();
        }
        store.create(&Metadata::new(RecordingId::generate(), None)).await.unwrap();

        assert!(store.locks.is_empty(), "{} slots left", store.locks.len());
        assert_eq!(store.get(&shared).await.unwrap().unwrap().views, 100);
    }

    #[tokio::test]
    async fn documents_without_identity_fields_still_update() {
        let (_dir, store) = store().await;
        let id = RecordingId::generate();
        std::fs::write(store.path(&id), r#"{ "views": 3 }"#).unwrap();

        let (record, views) = store.update(id, Metadata::record_view).await.unwrap();

        assert_eq!(views, 4);
        assert_eq!(record.video_id, id);
        assert_eq!(store.get(&id).await.unwrap().unwrap().views, 4);
    }

    #[tokio::test]
    async fn corrupt_documents_are_reported() {
        let (_dir, store) = store().await;
        let id = RecordingId::generate();
        std::fs::write(store.path(&id), "{ not json").unwrap();

        let result = store.get(&id).await;
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }
}
