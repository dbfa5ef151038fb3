//! Transcript types produced by the transcribe stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One timed span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start offset in seconds from the beginning of the video
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Recognizer confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl TranscriptSegment {
    /// True when the segment has sane, ordered timings.
    pub fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.end >= self.start && self.start.is_finite() && self.end.is_finite()
    }
}

/// Full transcript for one video (1:1 with Video).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Ordered segments
    pub segments: Vec<TranscriptSegment>,
    /// Concatenated text of all segments
    pub full_text: String,
    /// Estimated token count (~4 chars per token)
    pub token_count: u32,
    /// BCP-47 language code used for transcription
    pub language: String,
    /// STT model that produced this transcript
    pub stt_model: String,
}

impl Transcript {
    /// Estimate a token count from raw text length.
    pub fn estimate_tokens(text: &str) -> u32 {
        (text.chars().count() as u32).div_ceil(4)
    }

    /// Segments fully contained in `[start, end]`, re-based to clip time.
    pub fn segments_within(&self, start: f64, end: f64) -> Vec<TranscriptSegment> {
        self.segments
            .iter()
            .filter(|s| s.start >= start && s.end <= end)
            .map(|s| TranscriptSegment {
                start: s.start - start,
                end: s.end - start,
                text: s.text.clone(),
                confidence: s.confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(Transcript::estimate_tokens(""), 0);
        assert_eq!(Transcript::estimate_tokens("abcd"), 1);
        assert_eq!(Transcript::estimate_tokens("abcde"), 2);
    }

    #[test]
    fn segments_within_rebases_to_clip_time() {
        let t = Transcript {
            segments: vec![seg(0.0, 5.0, "a"), seg(12.0, 18.0, "b"), seg(25.0, 40.0, "c")],
            full_text: "a b c".to_string(),
            token_count: 2,
            language: "ru".to_string(),
            stt_model: "whisper-1".to_string(),
        };

        let within = t.segments_within(10.0, 20.0);
        assert_eq!(within.len(), 1);
        assert!((within[0].start - 2.0).abs() < f64::EPSILON);
        assert!((within[0].end - 8.0).abs() < f64::EPSILON);
        assert_eq!(within[0].text, "b");
    }

    #[test]
    fn partially_overlapping_segments_are_excluded() {
        let t = Transcript {
            segments: vec![seg(8.0, 12.0, "straddles start")],
            full_text: String::new(),
            token_count: 0,
            language: "ru".to_string(),
            stt_model: "whisper-1".to_string(),
        };
        assert!(t.segments_within(10.0, 20.0).is_empty());
    }
}
