use axum::extract::{Path, State};
use axum_template::RenderHtml;
use serde::Serialize;
use tracing::instrument;

use super::{recording_id, App, Result, Templates};
use crate::service::storage::ObjectStore;

#[derive(Debug, Serialize)]
pub struct SharePage {
    pub video_id: String,
    pub source: String,
    pub raw_source: String,
    pub share_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<f64>,
}

/// Playback page for a shared recording.
///
/// Storage and metadata failures only degrade the page: playback falls back to the raw
/// proxy and the counters are left out.
#[instrument(skip(app))]
pub async fn page(
    State(app): State<App>, Path(video_id): Path<String>,
) -> Result<RenderHtml<&'static str, Templates, SharePage>> {
    let id = recording_id(&video_id)?;
    let raw_source = id.raw_path();

    let signed = app
        .storage
        .presigned_url(&id.object_key(), app.settings.signed_url_ttl)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(%error, "could not sign a playback url");
            None
        });

    let record = app.metadata.get(&id).await.unwrap_or_else(|error| {
        tracing::warn!(%error, "could not read recording metadata");
        None
    });

    let page = SharePage {
        video_id: id.to_string(),
        source: signed.unwrap_or_else(|| raw_source.clone()),
        raw_source,
        share_link: app.settings.share_url(&id),
        views: record.as_ref().map(|record| record.views),
        completion: record.as_ref().and_then(|record| record.completion()),
    };

    Ok(RenderHtml("share.html", app.templates.clone(), page))
}
