use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use url::Url;

pub use error::*;
pub use local::LocalStorage;
pub use range::ByteRange;
pub use s3::S3Storage;

mod error;
mod local;
mod range;
mod s3;

/// Content type of every recording this service stores.
pub const WEBM: &str = "video/webm";

pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// An object body together with the headers needed to proxy it over HTTP.
pub struct Object {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub content_range: Option<String>,
    pub body: ObjectStream,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("accept_ranges", &self.accept_ranges)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHead {
    pub key: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub metadata: HashMap<String, String>,
}

/// Represents a place recordings can be written to and streamed back from.
pub trait ObjectStore {
    fn put(
        &self, key: &str, body: Bytes, content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch an object. `range` is the raw value of an HTTP `Range` header.
    fn get(&self, key: &str, range: Option<&str>) -> impl Future<Output = Result<Object>> + Send;

    fn head(&self, key: &str) -> impl Future<Output = Result<ObjectHead>> + Send;

    /// A time-limited URL that downloads the object without going through this service,
    /// or `None` when the backend has no such thing.
    fn presigned_url(
        &self, key: &str, ttl: Duration,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<Url>,
    },
}

/// The configured object store backend.
#[derive(Debug, Clone)]
pub enum Storage {
    Local(LocalStorage),
    S3(S3Storage),
}

impl Storage {
    pub async fn connect(config: &StorageConfig) -> Self {
        match config {
            StorageConfig::Local { root } => {
                tracing::info!(root = %root.display(), "storing recordings on local disk");
                Storage::Local(LocalStorage::new(root.clone()))
            }
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
            } => {
                tracing::info!(%bucket, ?region, ?endpoint, "storing recordings in S3");
                let storage = S3Storage::connect(bucket.clone(), region.clone(), endpoint.clone());
                Storage::S3(storage.await)
            }
        }
    }
}

impl ObjectStore for Storage {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        match self {
            Storage::Local(local) => local.put(key, body, content_type).await,
            Storage::S3(s3) => s3.put(key, body, content_type).await,
        }
    }

    async fn get(&self, key: &str, range: Option<&str>) -> Result<Object> {
        match self {
            Storage::Local(local) => local.get(key, range).await,
            Storage::S3(s3) => s3.get(key, range).await,
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectHead> {
        match self {
            Storage::Local(local) => local.head(key).await,
            Storage::S3(s3) => s3.head(key).await,
        }
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        match self {
            Storage::Local(local) => local.presigned_url(key, ttl).await,
            Storage::S3(s3) => s3.presigned_url(key, ttl).await,
        }
    }
}
