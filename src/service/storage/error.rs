use snafu::{Location, Snafu};

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum StorageError {
    #[snafu(display("object `{key}` does not exist"))]
    NotFound { key: String },

    #[snafu(display("object key `{key}` is not a valid relative path"))]
    InvalidKey { key: String },

    #[snafu(display("requested range is outside of object `{key}` ({size} bytes)"))]
    RangeNotSatisfiable { key: String, size: u64 },

    #[snafu(display("filesystem access to object `{key}` failed: {source}"))]
    Io {
        key: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("S3 request for object `{key}` failed: {source}"))]
    S3Request {
        key: String,
        source: aws_sdk_s3::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid presigning configuration: {source}"))]
    PresignConfig {
        source: aws_sdk_s3::presigning::PresigningConfigError,
        #[snafu(implicit)]
        location: Location,
    },
}
