pub use metadata::*;
pub use recording_id::*;
pub use timestamp::*;

mod metadata;
mod recording_id;
mod timestamp;
