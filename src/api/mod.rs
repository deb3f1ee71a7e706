use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use snafu::ResultExt;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApplicationError, BindAddressSnafu, WebServerSnafu};
use crate::model::RecordingId;

pub use error::*;
pub use state::*;

mod analytics;
mod error;
mod form;
mod playback;
mod share;
mod state;
mod trim;
mod upload;

pub fn router(app: App) -> Router {
    let body_limit = app.settings.max_upload_size;

    Router::new()
        .route("/health", get(health))
        .route("/share/:video_id", get(share::page))
        .route("/api/upload", post(upload::create))
        .route("/api/trim", post(trim::trim))
        .route(
            "/api/analytics/:video_id",
            get(analytics::summary).post(analytics::record),
        )
        .route("/api/uploads/:video_id", get(playback::signed_url))
        .route("/api/uploads/:video_id/raw", get(playback::raw))
        .route("/api/debug/object/:video_id", get(playback::inspect))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(app)
}

pub async fn serve(address: SocketAddr, app: App) -> Result<(), ApplicationError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening");

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}

async fn health() -> &'static str {
    "ok"
}

/// Path segments that are not recording ids name nothing, so they are reported as missing.
fn recording_id(video_id: &str) -> Result<RecordingId> {
    video_id.parse::<RecordingId>().context(UnknownRecordingSnafu)
}
