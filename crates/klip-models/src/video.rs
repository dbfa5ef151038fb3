//! Video record types and status machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How the source video arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoSourceType {
    Upload,
    Url,
}

/// Video pipeline status.
///
/// Status only advances along the pipeline or jumps to `Failed`;
/// backward transitions are rejected at the persistence boundary via
/// [`VideoStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Uploading,
    Downloading,
    Transcribing,
    Analyzing,
    GeneratingClips,
    Completed,
    Failed,
}

impl VideoStatus {
    /// Transition table for the pipeline state machine.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        match (self, next) {
            // Any non-terminal state may fail
            (Completed, Failed) => false,
            (Failed, Failed) => false,
            (_, Failed) => true,
            // Forward-only pipeline order
            (Uploading, Transcribing) => true,
            (Downloading, Transcribing) => true,
            (Transcribing, Analyzing) => true,
            (Analyzing, GeneratingClips) => true,
            (GeneratingClips, Completed) => true,
            _ => false,
        }
    }

    /// True once the video can no longer change status.
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Uploading => "uploading",
            VideoStatus::Downloading => "downloading",
            VideoStatus::Transcribing => "transcribing",
            VideoStatus::Analyzing => "analyzing",
            VideoStatus::GeneratingClips => "generating_clips",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    /// Parse a status stored as text. Unknown values map to `Failed` so a
    /// corrupted row can never be mistaken for in-flight work.
    pub fn parse(s: &str) -> Self {
        match s {
            "uploading" => VideoStatus::Uploading,
            "downloading" => VideoStatus::Downloading,
            "transcribing" => VideoStatus::Transcribing,
            "analyzing" => VideoStatus::Analyzing,
            "generating_clips" => VideoStatus::GeneratingClips,
            "completed" => VideoStatus::Completed,
            _ => VideoStatus::Failed,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_advances_forward_only() {
        assert!(VideoStatus::Downloading.can_transition_to(VideoStatus::Transcribing));
        assert!(VideoStatus::Transcribing.can_transition_to(VideoStatus::Analyzing));
        assert!(VideoStatus::Analyzing.can_transition_to(VideoStatus::GeneratingClips));
        assert!(VideoStatus::GeneratingClips.can_transition_to(VideoStatus::Completed));

        // No backward transitions
        assert!(!VideoStatus::Analyzing.can_transition_to(VideoStatus::Transcribing));
        assert!(!VideoStatus::Completed.can_transition_to(VideoStatus::GeneratingClips));
        // No stage skipping
        assert!(!VideoStatus::Downloading.can_transition_to(VideoStatus::Analyzing));
    }

    #[test]
    fn any_active_status_can_fail() {
        assert!(VideoStatus::Downloading.can_transition_to(VideoStatus::Failed));
        assert!(VideoStatus::GeneratingClips.can_transition_to(VideoStatus::Failed));
        assert!(!VideoStatus::Completed.can_transition_to(VideoStatus::Failed));
    }

    #[test]
    fn status_roundtrips_through_text() {
        for status in [
            VideoStatus::Uploading,
            VideoStatus::Downloading,
            VideoStatus::Transcribing,
            VideoStatus::Analyzing,
            VideoStatus::GeneratingClips,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            assert_eq!(VideoStatus::parse(status.as_str()), status);
        }
        assert_eq!(VideoStatus::parse("garbage"), VideoStatus::Failed);
    }
}
