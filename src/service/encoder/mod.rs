use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use derive_new::new;
use snafu::{ensure, ResultExt as _};
use tracing::instrument;

pub use error::*;

mod error;

/// A validated `[start, end)` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRange {
    start: f64,
    end: f64,
}

impl TrimRange {
    pub fn new(start: f64, end: f64) -> Result<Self, InvalidTrimRange> {
        let valid = start.is_finite() && end.is_finite() && start >= 0.0 && end > start;
        ensure!(valid, InvalidTrimRangeSnafu { start, end });

        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }
}

/// Re-encodes recordings by running an external ffmpeg binary.
#[derive(Debug, Clone, new)]
pub struct Ffmpeg {
    binary: PathBuf,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments for cutting `input` down to `range`, re-encoded as VP8 video and Opus audio.
    pub fn trim_args(input: &Path, output: &Path, range: TrimRange) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
        args.extend(
            [
                "-ss".to_string(),
                range.start.to_string(),
                "-to".to_string(),
                range.end.to_string(),
                "-c:v".to_string(),
                "libvpx".to_string(),
                "-crf".to_string(),
                "10".to_string(),
                "-b:v".to_string(),
                "1M".to_string(),
                "-c:a".to_string(),
                "libopus".to_string(),
                "-b:a".to_string(),
                "64k".to_string(),
            ]
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    /// Trim `input` into `output`. Only a zero exit status counts as success; the child is
    /// killed if it outlives the configured timeout.
    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    pub async fn trim(&self, input: &Path, output: &Path, range: TrimRange) -> Result<()> {
        let child = tokio::process::Command::new(&self.binary)
            .args(Self::trim_args(input, output, range))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context(SpawnSnafu {
                binary: &self.binary,
            })?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let Ok(finished) = finished else {
            tracing::error!(limit = ?self.timeout, "ffmpeg timed out");
            return TimedOutSnafu {
                limit: self.timeout,
            }
            .fail();
        };

        let result = finished.context(SpawnSnafu {
            binary: &self.binary,
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
            tracing::error!(code = ?result.status.code(), %stderr, "ffmpeg exited non-zero");
            return ExitedSnafu {
                code: result.status.code(),
                stderr,
            }
            .fail();
        }

        tracing::debug!(output = %output.display(), "trimmed recording");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(binary: impl Into<PathBuf>) -> Ffmpeg {
        Ffmpeg::new(binary.into(), Duration::from_secs(10))
    }

    #[test]
    fn trim_range_accepts_a_forward_window() {
        let range = TrimRange::new(1.5, 4.0).unwrap();
        assert_eq!((range.start(), range.end()), (1.5, 4.0));
    }

    #[test]
    fn trim_range_rejects_bad_windows() {
        assert!(TrimRange::new(-1.0, 4.0).is_err());
        assert!(TrimRange::new(4.0, 4.0).is_err());
        assert!(TrimRange::new(5.0, 4.0).is_err());
        assert!(TrimRange::new(0.0, f64::INFINITY).is_err());
        assert!(TrimRange::new(f64::NAN, 4.0).is_err());
    }

    #[test]
    fn trim_args_follow_the_encoding_profile() {
        let range = TrimRange::new(2.0, 7.5).unwrap();
        let args = Ffmpeg::trim_args(Path::new("in.webm"), Path::new("out.webm"), range);

        let expected = [
            "-i", "in.webm", "-ss", "2", "-to", "7.5", "-c:v", "libvpx", "-crf", "10", "-b:v",
            "1M", "-c:a", "libopus", "-b:a", "64k", "out.webm",
        ];
        assert_eq!(args, expected.map(OsString::from));
    }

    #[tokio::test]
    async fn missing_binary_is_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = encoder(dir.path().join("no-such-ffmpeg"));
        let range = TrimRange::new(0.0, 1.0).unwrap();

        let error = ffmpeg
            .trim(&dir.path().join("in.webm"), &dir.path().join("out.webm"), range)
            .await
            .unwrap_err();

        assert!(error.is_missing_binary(), "unexpected error: {error}");
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = encoder(script(dir.path(), "echo 'Invalid data found' >&2\nexit 3"));
        let range = TrimRange::new(0.0, 1.0).unwrap();

        let error = ffmpeg
            .trim(&dir.path().join("in.webm"), &dir.path().join("out.webm"), range)
            .await
            .unwrap_err();

        assert!(!error.is_missing_binary());
        match error {
            EncodeError::Exited { code, stderr } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("Invalid data found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_encoder_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = Ffmpeg::new(script(dir.path(), "sleep 5"), Duration::from_millis(100));
        let range = TrimRange::new(0.0, 1.0).unwrap();

        let error = ffmpeg
            .trim(&dir.path().join("in.webm"), &dir.path().join("out.webm"), range)
            .await
            .unwrap_err();

        assert!(matches!(error, EncodeError::TimedOut { .. }));
    }
}
