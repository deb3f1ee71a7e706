use std::path::PathBuf;

use snafu::{Location, Snafu};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum StoreError {
    #[snafu(display("cannot create metadata directory `{}`: {source}", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot read metadata document `{}`: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed metadata document `{}`: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot serialize metadata: {source}"))]
    Serialize {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot write metadata document `{}`: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
