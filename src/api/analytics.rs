use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use super::{
    recording_id, App, InvalidWatchedSecondsSnafu, NoMetadataSnafu, ReadMetadataSnafu, Result,
    UpdateAnalyticsSnafu,
};
use crate::model::{Analytics, Metadata, WatchedSeconds};

#[derive(Debug, Serialize, Deserialize)]
pub struct Views {
    pub views: u64,
}

#[instrument(skip(app))]
pub async fn summary(
    State(app): State<App>, Path(video_id): Path<String>,
) -> Result<Json<Analytics>> {
    let id = recording_id(&video_id)?;

    let record = app
        .metadata
        .get(&id)
        .await
        .context(ReadMetadataSnafu)?
        .context(NoMetadataSnafu { video_id: id })?;

    Ok(Json(record.analytics()))
}

/// Record a play, or a watch position when the body carries `watchedSeconds`.
///
/// The body is optional and anything that is not JSON counts as no body at all.
#[instrument(skip(app, body))]
pub async fn record(
    State(app): State<App>, Path(video_id): Path<String>, body: Bytes,
) -> Result<Response> {
    let id = recording_id(&video_id)?;

    let body: Option<Value> = serde_json::from_slice(&body).ok();
    let watched = body.as_ref().and_then(|body| body.get("watchedSeconds"));

    if let Some(watched) = watched {
        let watched = WatchedSeconds::from_json(watched).context(InvalidWatchedSecondsSnafu)?;

        let (record, progress) = app
            .metadata
            .update(id, |record| record.record_progress(watched))
            .await
            .context(UpdateAnalyticsSnafu)?;

        tracing::debug!(%id, progress, "recorded watch progress");
        return Ok(Json(record).into_response());
    }

    let (_, views) = app
        .metadata
        .update(id, Metadata::record_view)
        .await
        .context(UpdateAnalyticsSnafu)?;

    tracing::debug!(%id, views, "recorded view");
    Ok(Json(Views { views }).into_response())
}
