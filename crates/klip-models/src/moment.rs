//! Ephemeral analysis types: moment candidates and their enriched form.
//!
//! These never touch the database. A [`MomentCandidate`] is produced by the
//! moment-selection LLM call (or a fallback generator) and consumed entirely
//! within one analyze-stage invocation; an [`EnrichedMoment`] is what gets
//! persisted as a Clip at the end of that invocation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::{Cta, SubtitleSegment, ViralityScore};

/// A candidate time window proposed as clip-worthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MomentCandidate {
    /// Start offset in seconds
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
    /// Preliminary title from the selection call
    pub title: String,
    /// Why the model picked this window
    pub reason: String,
    /// Hook strength in [0, 25]
    pub hook_strength: u8,
}

impl MomentCandidate {
    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Seconds of overlap with another candidate (zero when disjoint).
    pub fn overlap_with(&self, other: &MomentCandidate) -> f64 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end - start).max(0.0)
    }
}

/// A moment after scoring, titling and CTA suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnrichedMoment {
    pub moment: MomentCandidate,
    pub virality: ViralityScore,
    /// Finalized title, at most 60 characters
    pub title: String,
    pub cta: Option<Cta>,
    /// Subtitle segments re-based to clip time
    pub subtitle_segments: Vec<SubtitleSegment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(start: f64, end: f64) -> MomentCandidate {
        MomentCandidate {
            start,
            end,
            title: "t".to_string(),
            reason: "r".to_string(),
            hook_strength: 10,
        }
    }

    #[test]
    fn overlap_is_symmetric_and_clamped() {
        let a = candidate(0.0, 30.0);
        let b = candidate(20.0, 50.0);
        let c = candidate(100.0, 130.0);

        assert!((a.overlap_with(&b) - 10.0).abs() < f64::EPSILON);
        assert!((b.overlap_with(&a) - 10.0).abs() < f64::EPSILON);
        assert_eq!(a.overlap_with(&c), 0.0);
    }
}
