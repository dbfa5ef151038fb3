//! Clip record types, output formats and scoring metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Generate a new random clip ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Render lifecycle of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Pending,
    Rendering,
    Ready,
    Failed,
}

impl ClipStatus {
    /// Transition table for the clip state machine.
    pub fn can_transition_to(self, next: ClipStatus) -> bool {
        use ClipStatus::*;
        matches!(
            (self, next),
            (Pending, Rendering)
                | (Rendering, Ready)
                | (Rendering, Failed)
                | (Pending, Failed)
                // Manual retry path: a failed clip may be re-queued
                | (Failed, Rendering)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClipStatus::Pending => "pending",
            ClipStatus::Rendering => "rendering",
            ClipStatus::Ready => "ready",
            ClipStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => ClipStatus::Pending,
            "rendering" => ClipStatus::Rendering,
            "ready" => ClipStatus::Ready,
            _ => ClipStatus::Failed,
        }
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output aspect of a rendered clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipFormat {
    #[default]
    Portrait,
    Square,
    Landscape,
}

impl ClipFormat {
    /// Fixed output dimensions (width, height).
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ClipFormat::Portrait => (1080, 1920),
            ClipFormat::Square => (1080, 1080),
            ClipFormat::Landscape => (1920, 1080),
        }
    }

    /// Maximum characters per subtitle line for this format.
    ///
    /// Portrait frames are narrower, so lines wrap earlier.
    pub fn max_subtitle_line(self) -> usize {
        match self {
            ClipFormat::Portrait => 28,
            ClipFormat::Square => 34,
            ClipFormat::Landscape => 42,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClipFormat::Portrait => "portrait",
            ClipFormat::Square => "square",
            ClipFormat::Landscape => "landscape",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "portrait" => Some(ClipFormat::Portrait),
            "square" => Some(ClipFormat::Square),
            "landscape" => Some(ClipFormat::Landscape),
            _ => None,
        }
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subtitle span in clip-relative time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Where the call-to-action appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CtaPosition {
    /// Appended as a full-screen end card
    End,
    /// Drawn over the final seconds of the clip
    Overlay,
}

/// Call-to-action suggested by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Cta {
    /// 3-8 words, at most 50 characters
    pub text: String,
    pub position: CtaPosition,
    /// Display duration in seconds, 3-5
    pub duration: u32,
}

/// Composite virality score: four 0-25 sub-scores plus improvement tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViralityScore {
    pub hook: u8,
    pub engagement: u8,
    pub flow: u8,
    pub trend: u8,
    /// Always hook + engagement + flow + trend
    pub total: u8,
    /// 1-3 short improvement tips (may be empty for fallback scores)
    pub tips: Vec<String>,
}

impl ViralityScore {
    /// Build a score from sub-scores, deriving the total.
    pub fn from_parts(hook: u8, engagement: u8, flow: u8, trend: u8, tips: Vec<String>) -> Self {
        Self {
            hook,
            engagement,
            flow,
            trend,
            total: hook + engagement + flow + trend,
            tips,
        }
    }

    /// Fallback score derived from a moment's hook strength alone.
    pub fn from_hook_strength(hook_strength: u8) -> Self {
        Self::from_parts(hook_strength, hook_strength, hook_strength, hook_strength, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_status_transitions() {
        assert!(ClipStatus::Pending.can_transition_to(ClipStatus::Rendering));
        assert!(ClipStatus::Rendering.can_transition_to(ClipStatus::Ready));
        assert!(ClipStatus::Rendering.can_transition_to(ClipStatus::Failed));
        assert!(ClipStatus::Failed.can_transition_to(ClipStatus::Rendering));
        assert!(!ClipStatus::Ready.can_transition_to(ClipStatus::Rendering));
        assert!(!ClipStatus::Ready.can_transition_to(ClipStatus::Failed));
    }

    #[test]
    fn format_dimensions() {
        assert_eq!(ClipFormat::Portrait.dimensions(), (1080, 1920));
        assert_eq!(ClipFormat::Square.dimensions(), (1080, 1080));
        assert_eq!(ClipFormat::Landscape.dimensions(), (1920, 1080));
    }

    #[test]
    fn portrait_wraps_narrowest() {
        assert!(ClipFormat::Portrait.max_subtitle_line() < ClipFormat::Square.max_subtitle_line());
        assert!(ClipFormat::Square.max_subtitle_line() < ClipFormat::Landscape.max_subtitle_line());
    }

    #[test]
    fn virality_total_is_sum() {
        let score = ViralityScore::from_parts(20, 15, 10, 5, vec!["tip".to_string()]);
        assert_eq!(score.total, 50);

        let fallback = ViralityScore::from_hook_strength(10);
        assert_eq!(fallback.total, 40);
        assert!(fallback.tips.is_empty());
    }
}
