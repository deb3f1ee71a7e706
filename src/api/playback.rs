use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use super::{
    recording_id, App, InspectObjectSnafu, InspectUnknownSnafu, NotPresignableSnafu,
    PlaybackSnafu, Result, UnsatisfiableRangeSnafu,
};
use crate::model::RecordingId;
use crate::service::storage::{ObjectHead, ObjectStore, StorageError};

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Hand out a short-lived direct download link for a recording.
#[instrument(skip(app))]
pub async fn signed_url(
    State(app): State<App>, Path(video_id): Path<String>,
) -> Result<Json<SignedUrl>> {
    let key = recording_id(&video_id)?.object_key();

    let url = app
        .storage
        .presigned_url(&key, app.settings.signed_url_ttl)
        .await
        .context(PlaybackSnafu)?
        .context(NotPresignableSnafu { key })?;

    Ok(Json(SignedUrl { url }))
}

/// Stream a recording through this service, honouring the `Range` header.
#[instrument(skip(app, headers))]
pub async fn raw(
    State(app): State<App>, Path(video_id): Path<String>, headers: HeaderMap,
) -> Result<Response> {
    let key = recording_id(&video_id)?.object_key();
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let object = match app.storage.get(&key, range).await {
        Ok(object) => object,
        Err(StorageError::RangeNotSatisfiable { size, .. }) => {
            return UnsatisfiableRangeSnafu { size }.fail()
        }
        Err(error) => return Err(error).context(PlaybackSnafu),
    };

    let status = if object.content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = Response::new(Body::from_stream(object.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    let fields = [
        (header::CONTENT_TYPE, object.content_type),
        (header::CONTENT_LENGTH, object.content_length.map(|len| len.to_string())),
        (header::ACCEPT_RANGES, object.accept_ranges),
        (header::CONTENT_RANGE, object.content_range),
    ];
    for (name, value) in fields {
        insert(headers, name, value);
    }

    Ok(response)
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: Option<String>) {
    let Some(value) = value else {
        return;
    };

    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(error) => tracing::warn!(%error, %name, "dropping unrepresentable header"),
    }
}

/// Report what the object store holds for a recording.
#[instrument(skip(app))]
pub async fn inspect(
    State(app): State<App>, Path(video_id): Path<String>,
) -> Result<Json<ObjectHead>> {
    let id: RecordingId = video_id.parse().context(InspectUnknownSnafu)?;

    let head = app
        .storage
        .head(&id.object_key())
        .await
        .context(InspectObjectSnafu)?;

    Ok(Json(head))
}
