use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::instrument;
use uuid::Uuid;

use super::form::Form;
use super::{
    App, EncodeSnafu, InvalidTrimBoundsSnafu, MalformedFormSnafu, MissingFileSnafu,
    MissingTrimBoundsSnafu, NotBinarySnafu, NotMultipartSnafu, Result, ScratchSnafu,
};
use crate::model::parse_number;
use crate::service::encoder::TrimRange;
use crate::service::storage::WEBM;

/// Re-encode an uploaded recording down to `[start, end)` and send the result back.
#[instrument(skip_all)]
pub async fn trim(
    State(app): State<App>, multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let multipart = multipart.context(NotMultipartSnafu)?;
    let mut form = Form::read(multipart).await.context(MalformedFormSnafu)?;

    let file = form.take("file").context(MissingFileSnafu)?;
    let (Some(start), Some(end)) = (form.get("start"), form.get("end")) else {
        return MissingTrimBoundsSnafu.fail();
    };

    let range = TrimRange::new(parse_number(&start.text()), parse_number(&end.text()))
        .context(InvalidTrimBoundsSnafu)?;
    ensure!(file.is_file(), NotBinarySnafu);

    let scratch = Scratch::new(&app.settings.tmp_dir);
    let trimmed = encode(&app, &scratch, file.data, range).await?;
    drop(scratch);

    tracing::info!(start = range.start(), end = range.end(), size = trimmed.len(), "trimmed recording");

    Ok((
        [
            (header::CONTENT_TYPE, WEBM),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"trimmed.webm\""),
        ],
        trimmed,
    ))
}

async fn encode(app: &App, scratch: &Scratch, data: Bytes, range: TrimRange) -> Result<Vec<u8>> {
    tokio::fs::create_dir_all(&app.settings.tmp_dir)
        .await
        .context(ScratchSnafu)?;
    tokio::fs::write(&scratch.input, data)
        .await
        .context(ScratchSnafu)?;

    app.encoder
        .trim(&scratch.input, &scratch.output, range)
        .await
        .context(EncodeSnafu)?;

    tokio::fs::read(&scratch.output).await.context(ScratchSnafu)
}

/// The input and output files of one trim request, removed when dropped.
///
/// Dropping also covers requests abandoned mid-encode, where the handler future never resumes.
#[derive(Debug)]
struct Scratch {
    input: PathBuf,
    output: PathBuf,
}

impl Scratch {
    fn new(dir: &Path) -> Self {
        let id = Uuid::new_v4();

        Scratch {
            input: dir.join(format!("{id}-input.webm")),
            output: dir.join(format!("{id}-output.webm")),
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "could not remove scratch file")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_files_share_an_id() {
        let scratch = Scratch::new(Path::new("tmp"));
        let input = scratch.input.file_name().unwrap().to_string_lossy().into_owned();
        let output = scratch.output.file_name().unwrap().to_string_lossy().into_owned();

        let id = input.strip_suffix("-input.webm").unwrap();
        assert_eq!(output, format!("{id}-output.webm"));
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn dropping_scratch_removes_whatever_exists() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(dir.path());
        std::fs::write(&scratch.input, b"webm").unwrap();
        let input = scratch.input.clone();

        drop(scratch);

        assert!(!input.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
