use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use uuid::Uuid;

/// Identifier shared by a recording's object key, metadata document and share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(Uuid);

impl RecordingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Placeholder for documents whose stored id is missing or unreadable.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Key of the recording's media in the object store.
    pub fn object_key(&self) -> String {
        format!("recordings/{self}.webm")
    }

    /// Relative link to the recording's share page.
    pub fn share_path(&self) -> String {
        format!("/share/{self}")
    }

    /// Relative link to the raw media proxy.
    pub fn raw_path(&self) -> String {
        format!("/api/uploads/{self}/raw")
    }
}

impl std::str::FromStr for RecordingId {
    type Err = ParseRecordingId;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(input)
            .map(RecordingId)
            .map_err(|_| ParseRecordingId::new(input.to_string()))
    }
}

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu, new)]
#[snafu(display("invalid recording id: {text}"))]
pub struct ParseRecordingId {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_every_location_from_the_id() {
        let id: RecordingId = "6f1c1f9e-3b0a-4c55-9d4e-2f3a9b7c8d10".parse().unwrap();

        assert_eq!(id.object_key(), "recordings/6f1c1f9e-3b0a-4c55-9d4e-2f3a9b7c8d10.webm");
        assert_eq!(id.share_path(), "/share/6f1c1f9e-3b0a-4c55-9d4e-2f3a9b7c8d10");
        assert_eq!(id.raw_path(), "/api/uploads/6f1c1f9e-3b0a-4c55-9d4e-2f3a9b7c8d10/raw");
    }

    #[test]
    fn rejects_path_segments() {
        let result = "../../etc/passwd".parse::<RecordingId>();
        assert_eq!(result, Err(ParseRecordingId::new("../../etc/passwd".to_string())));
    }

    #[test]
    fn generated_ids_round_trip_through_display() {
        let id = RecordingId::generate();
        assert_eq!(id.to_string().parse::<RecordingId>(), Ok(id));
    }
}
