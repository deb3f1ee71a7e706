use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use derive_new::new;
use futures::StreamExt as _;
use snafu::{ensure, OptionExt as _, ResultExt as _};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use super::range::{content_range, ByteRange};
use super::*;

/// Object store backed by a directory, keys map to relative paths below `root`.
#[derive(Debug, Clone, new)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    fn path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        ensure!(is_plain && !key.is_empty(), InvalidKeySnafu { key });

        Ok(self.root.join(relative))
    }

    async fn open(&self, key: &str) -> Result<(tokio::fs::File, u64)> {
        let path = self.path(key)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return NotFoundSnafu { key }.fail();
            }
            Err(error) => return Err(error).context(IoSnafu { key }),
        };

        let size = file.metadata().await.context(IoSnafu { key })?.len();
        Ok((file, size))
    }
}

/// Local files carry no content type of their own, so it is derived from the key.
fn content_type_of(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|ext| ext.to_str()) {
        Some("webm") => WEBM,
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

impl ObjectStore for LocalStorage {
    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(IoSnafu { key })?;
        }

        let staging = path.with_extension("partial");
        tokio::fs::write(&staging, &body)
            .await
            .context(IoSnafu { key })?;
        tokio::fs::rename(&staging, &path)
            .await
            .context(IoSnafu { key })?;

        tracing::debug!(path = %path.display(), "stored object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str, range: Option<&str>) -> Result<Object> {
        let (mut file, size) = self.open(key).await?;

        let requested = range.and_then(ByteRange::parse);
        let Some(requested) = requested else {
            return Ok(Object {
                content_type: Some(content_type_of(key).to_string()),
                content_length: Some(size),
                accept_ranges: Some("bytes".to_string()),
                content_range: None,
                body: ReaderStream::new(file).boxed(),
            });
        };

        let (first, last) = requested
            .resolve(size)
            .context(RangeNotSatisfiableSnafu { key, size })?;
        let length = last - first + 1;

        file.seek(SeekFrom::Start(first))
            .await
            .context(IoSnafu { key })?;

        Ok(Object {
            content_type: Some(content_type_of(key).to_string()),
            content_length: Some(length),
            accept_ranges: Some("bytes".to_string()),
            content_range: Some(content_range(first, last, size)),
            body: ReaderStream::new(file.take(length)).boxed(),
        })
    }

    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<ObjectHead> {
        let (_, size) = self.open(key).await?;

        Ok(ObjectHead {
            key: key.to_string(),
            content_type: Some(content_type_of(key).to_string()),
            content_length: Some(size),
            metadata: HashMap::new(),
        })
    }

    async fn presigned_url(&self, _key: &str, _ttl: Duration) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt as _;

    const KEY: &str = "recordings/clip.webm";

    async fn storage_with(body: &'static [u8]) -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        storage
            .put(KEY, Bytes::from_static(body), WEBM)
            .await
            .unwrap();
        (dir, storage)
    }

    async fn collect(object: Object) -> Vec<u8> {
        let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn full_read_returns_every_byte() {
        let (_dir, storage) = storage_with(b"0123456789").await;

        let object = storage.get(KEY, None).await.unwrap();

        assert_eq!(object.content_type.as_deref(), Some(WEBM));
        assert_eq!(object.content_length, Some(10));
        assert_eq!(object.content_range, None);
        assert_eq!(collect(object).await, b"0123456789");
    }

    #[tokio::test]
    async fn ranged_read_returns_the_slice() {
        let (_dir, storage) = storage_with(b"0123456789").await;

        let object = storage.get(KEY, Some("bytes=2-5")).await.unwrap();

        assert_eq!(object.content_length, Some(4));
        assert_eq!(object.content_range.as_deref(), Some("bytes 2-5/10"));
        assert_eq!(collect(object).await, b"2345");
    }

    #[tokio::test]
    async fn suffix_read_returns_the_tail() {
        let (_dir, storage) = storage_with(b"0123456789").await;

        let object = storage.get(KEY, Some("bytes=-3")).await.unwrap();

        assert_eq!(object.content_range.as_deref(), Some("bytes 7-9/10"));
        assert_eq!(collect(object).await, b"789");
    }

    #[tokio::test]
    async fn malformed_range_serves_everything() {
        let (_dir, storage) = storage_with(b"0123456789").await;

        let object = storage.get(KEY, Some("bytes=0-1,4-5")).await.unwrap();

        assert_eq!(object.content_range, None);
        assert_eq!(collect(object).await.len(), 10);
    }

    #[tokio::test]
    async fn range_past_the_end_is_rejected() {
        let (_dir, storage) = storage_with(b"0123456789").await;

        let result = storage.get(KEY, Some("bytes=10-")).await;
        assert!(matches!(
            result,
            Err(StorageError::RangeNotSatisfiable { size: 10, .. })
        ));
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let (_dir, storage) = storage_with(b"").await;

        let result = storage.head("recordings/other.webm").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn head_reports_size_and_type() {
        let (_dir, storage) = storage_with(b"abc").await;

        let head = storage.head(KEY).await.unwrap();
        assert_eq!(head.key, KEY);
        assert_eq!(head.content_length, Some(3));
        assert_eq!(head.content_type.as_deref(), Some(WEBM));
        assert!(head.metadata.is_empty());
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let (_dir, storage) = storage_with(b"abc").await;

        let result = storage.get("../secret.webm", None).await;
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn local_objects_have_no_presigned_url() {
        let (_dir, storage) = storage_with(b"abc").await;

        let url = storage
            .presigned_url(KEY, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, None);
    }
}
