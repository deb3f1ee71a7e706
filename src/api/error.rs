use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use crate::model::{ParseRecordingId, RecordingId};
use crate::service::encoder::{EncodeError, InvalidTrimRange};
use crate::service::metadata::StoreError;
use crate::service::storage::StorageError;

/// Longest slice of encoder output returned to clients.
const MAX_DETAILS: usize = 2000;

/// Errors returned by the HTTP handlers.
///
/// The display text is what clients see in the `error` field; the underlying cause is
/// only logged.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("`file` is required"))]
    MissingFile,

    #[snafu(display("`file` must be a binary upload"))]
    NotBinary,

    #[snafu(display("`start` and `end` are required"))]
    MissingTrimBounds,

    #[snafu(display("Invalid `start`/`end` values"))]
    InvalidTrimBounds { source: InvalidTrimRange },

    #[snafu(display("Invalid watchedSeconds"))]
    InvalidWatchedSeconds,

    #[snafu(display("Expected a multipart/form-data request"))]
    NotMultipart { source: MultipartRejection },

    #[snafu(display("Malformed form data"))]
    MalformedForm { source: MultipartError },

    #[snafu(display("Upload failed"))]
    StoreRecording {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Upload failed"))]
    RecordUpload {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Video processing failed"))]
    Scratch {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Video processing failed"))]
    Encode {
        source: EncodeError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Not found"))]
    UnknownRecording { source: ParseRecordingId },

    #[snafu(display("Not found"))]
    NoMetadata { video_id: RecordingId },

    #[snafu(display("Not found"))]
    ReadMetadata {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Update failed"))]
    UpdateAnalytics {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Not found"))]
    Playback {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Not found"))]
    NotPresignable { key: String },

    #[snafu(display("Requested range not satisfiable"))]
    UnsatisfiableRange { size: u64 },

    #[snafu(display("not found"))]
    InspectObject {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("not found"))]
    InspectUnknown { source: ParseRecordingId },
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use ApiError::*;

        match self {
            MissingFile
            | NotBinary
            | MissingTrimBounds
            | InvalidTrimBounds { .. }
            | InvalidWatchedSeconds => StatusCode::BAD_REQUEST,
            NotMultipart { source } => source.status(),
            MalformedForm { source } => source.status(),
            StoreRecording { .. }
            | RecordUpload { .. }
            | Scratch { .. }
            | Encode { .. }
            | UpdateAnalytics { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            UnknownRecording { .. }
            | NoMetadata { .. }
            | ReadMetadata { .. }
            | Playback { .. }
            | NotPresignable { .. }
            | InspectObject { .. }
            | InspectUnknown { .. } => StatusCode::NOT_FOUND,
            UnsatisfiableRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    fn details(&self) -> Option<String> {
        let details = match self {
            ApiError::Encode { source, .. } => source.to_string(),
            ApiError::Scratch { source, .. } => source.to_string(),
            _ => return None,
        };

        Some(details.chars().take(MAX_DETAILS).collect())
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            ApiError::Encode { source, .. } if source.is_missing_binary() => Some(
                "ffmpeg not found. Install ffmpeg or set the FFMPEG_PATH env var to the ffmpeg executable.",
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(error = ?self, %status, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
            suggestion: self.suggestion(),
        };

        let mut response = (status, Json(body)).into_response();

        if let ApiError::UnsatisfiableRange { size } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}
