use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use super::form::{Form, FormPart};
use super::{
    App, MalformedFormSnafu, MissingFileSnafu, NotMultipartSnafu, RecordUploadSnafu, Result,
    StoreRecordingSnafu,
};
use crate::model::{parse_number, Metadata, RecordingId};
use crate::service::storage::{ObjectStore, WEBM};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploaded {
    pub video_id: RecordingId,
    pub share_url: String,
}

/// Store a finished recording and open its metadata record.
#[instrument(skip_all)]
pub async fn create(
    State(app): State<App>, multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Uploaded>)> {
    let multipart = multipart.context(NotMultipartSnafu)?;
    let mut form = Form::read(multipart).await.context(MalformedFormSnafu)?;

    let file = form
        .take("file")
        .filter(FormPart::is_file)
        .context(MissingFileSnafu)?;

    let duration = form
        .get("duration")
        .map(|part| parse_number(&part.text()))
        .filter(|duration| duration.is_finite());

    let video_id = RecordingId::generate();
    let size = file.data.len();
    let content_type = file.content_type.clone();

    app.storage
        .put(&video_id.object_key(), file.data, WEBM)
        .await
        .context(StoreRecordingSnafu)?;

    app.metadata
        .create(&Metadata::new(video_id, duration))
        .await
        .context(RecordUploadSnafu)?;

    tracing::info!(%video_id, size, ?content_type, ?duration, "recording uploaded");

    let uploaded = Uploaded {
        video_id,
        share_url: app.settings.share_url(&video_id),
    };

    Ok((StatusCode::CREATED, Json(uploaded)))
}
