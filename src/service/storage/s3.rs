use std::time::Duration;

use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt as _;
use snafu::{IntoError as _, ResultExt as _};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tokio_util::io::ReaderStream;
use tracing::instrument;
use url::Url;

use super::*;

/// Object store backed by an S3 (or S3-compatible) bucket.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Build a client from the default AWS provider chain.
    ///
    /// A custom `endpoint` switches to path-style addressing, which is what MinIO and most
    /// other S3-compatible servers expect.
    pub async fn connect(bucket: String, region: Option<String>, endpoint: Option<Url>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            config = config
                .endpoint_url(endpoint.as_str())
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(config.build()),
            bucket,
        }
    }

    fn retry_strategy() -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(3)
    }
}

/// Convert an SDK failure, mapping the operation's "missing object" case to [StorageError::NotFound].
fn request_error<E, R>(key: &str, error: SdkError<E, R>, is_missing: fn(&E) -> bool) -> StorageError
where
    aws_sdk_s3::Error: From<SdkError<E, R>>,
{
    if error.as_service_error().is_some_and(is_missing) {
        return NotFoundSnafu { key }.build();
    }

    S3RequestSnafu { key }.into_error(aws_sdk_s3::Error::from(error))
}

impl ObjectStore for S3Storage {
    #[instrument(skip(self, body), fields(bucket = %self.bucket, size = body.len()))]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let upload = move || {
            let body = body.clone();
            async move {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .content_type(content_type)
                    .body(ByteStream::from(body))
                    .send()
                    .await
                    .inspect_err(|error| tracing::warn!(%error, "put object attempt failed"))
            }
        };

        Retry::spawn(Self::retry_strategy(), upload)
            .await
            .map_err(|error| request_error(key, error, |_| false))?;

        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str, range: Option<&str>) -> Result<Object> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.map(str::to_owned))
            .send()
            .await
            .map_err(|error| request_error(key, error, |e| e.is_no_such_key()))?;

        let content_type = output.content_type().map(str::to_owned);
        let content_length = output
            .content_length()
            .and_then(|length| u64::try_from(length).ok());
        let accept_ranges = output.accept_ranges().map(str::to_owned);
        let content_range = output.content_range().map(str::to_owned);
        let body = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(Object {
            content_type,
            content_length,
            accept_ranges,
            content_range,
            body,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> Result<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| request_error(key, error, |e| e.is_not_found()))?;

        Ok(ObjectHead {
            key: key.to_string(),
            content_type: output.content_type().map(str::to_owned),
            content_length: output
                .content_length()
                .and_then(|length| u64::try_from(length).ok()),
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let config = PresigningConfig::expires_in(ttl).context(PresignConfigSnafu)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|error| request_error(key, error, |_| false))?;

        Ok(Some(request.uri().to_string()))
    }
}
