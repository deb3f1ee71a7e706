use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt;
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::service::encoder::Ffmpeg;
use crate::service::storage::StorageConfig;

/// Service configuration, read from environment variables (`HOST_ADDRESS`, `DATA_DIR`, ...).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    /// Absolute base for share links, e.g. `https://clips.example.com`.
    #[serde(default)]
    pub public_url: Option<Url>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_encode_timeout", deserialize_with = "human_duration")]
    pub encode_timeout: Duration,
    #[serde(default = "default_signed_url_ttl", deserialize_with = "human_duration")]
    pub signed_url_ttl: Duration,
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,

    #[serde(rename = "aws_s3_bucket_name", default)]
    pub bucket: Option<String>,
    #[serde(rename = "aws_region", default)]
    pub region: Option<String>,
    #[serde(rename = "aws_s3_endpoint", default)]
    pub endpoint: Option<Url>,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn from_iter<I>(vars: I) -> Result<Config, ApplicationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars).context(ConfigLoadSnafu)
    }

    /// Recordings go to S3 when a bucket is configured and to `uploads_dir` otherwise.
    pub fn storage(&self) -> StorageConfig {
        match &self.bucket {
            Some(bucket) => StorageConfig::S3 {
                bucket: bucket.clone(),
                region: self.region.clone(),
                endpoint: self.endpoint.clone(),
            },
            None => StorageConfig::Local {
                root: self.uploads_dir.clone(),
            },
        }
    }

    pub fn encoder(&self) -> Ffmpeg {
        Ffmpeg::new(self.ffmpeg_path.clone(), self.encode_timeout)
    }
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_encode_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_signed_url_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_max_upload_size() -> usize {
    1024 * 1024 * 1024
}

/// Accepts durations such as `90s`, `5m` or `1h 30m`.
fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_to_an_empty_environment() {
        let config = Config::from_iter(vars(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.encode_timeout, Duration::from_secs(600));
        assert_eq!(config.signed_url_ttl, Duration::from_secs(300));
        assert_eq!(
            config.storage(),
            StorageConfig::Local {
                root: PathBuf::from("uploads")
            }
        );
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_iter(vars(&[
            ("HOST_ADDRESS", "127.0.0.1:8080"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
            ("SIGNED_URL_TTL", "90s"),
            ("MAX_UPLOAD_SIZE", "1048576"),
            ("PUBLIC_URL", "https://clips.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.host, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.signed_url_ttl, Duration::from_secs(90));
        assert_eq!(config.max_upload_size, 1_048_576);
        assert_eq!(
            config.public_url.map(String::from).as_deref(),
            Some("https://clips.example.com/")
        );
    }

    #[test]
    fn bucket_selects_s3() {
        let config = Config::from_iter(vars(&[
            ("AWS_S3_BUCKET_NAME", "recordings"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();

        assert_eq!(
            config.storage(),
            StorageConfig::S3 {
                bucket: "recordings".to_string(),
                region: Some("eu-west-1".to_string()),
                endpoint: None,
            }
        );
    }

    #[test]
    fn rejects_unparseable_durations() {
        let result = Config::from_iter(vars(&[("ENCODE_TIMEOUT", "forever")]));
        assert!(matches!(result, Err(ApplicationError::ConfigLoad { .. })));
    }
}
