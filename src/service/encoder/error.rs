use std::path::PathBuf;
use std::time::Duration;

use snafu::{Location, Snafu};

pub type Result<T, E = EncodeError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum EncodeError {
    #[snafu(display("cannot start `{}`: {source}", binary.display()))]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("ffmpeg exited with code {}: {stderr}", code.map_or_else(|| "none".to_string(), |code| code.to_string())))]
    Exited { code: Option<i32>, stderr: String },

    #[snafu(display("ffmpeg did not finish within {}", humantime::format_duration(*limit)))]
    TimedOut { limit: Duration },
}

impl EncodeError {
    /// The encoder binary could not be found, usually because ffmpeg is not installed.
    pub fn is_missing_binary(&self) -> bool {
        matches!(self, EncodeError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(super)))]
#[snafu(display("invalid trim range {start}..{end}"))]
pub struct InvalidTrimRange {
    pub start: f64,
    pub end: f64,
}
