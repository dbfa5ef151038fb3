//! Pure moment-selection algorithms: clamping, deduplication, fallbacks.

use klip_models::{EnrichedMoment, MomentCandidate};

/// Minimum clip length in seconds.
pub const MIN_CLIP_SECS: f64 = 15.0;

/// Maximum clip length in seconds.
pub const MAX_CLIP_SECS: f64 = 60.0;

/// Transcripts are truncated to this many estimated tokens before the
/// selection prompt is built.
pub const MAX_TRANSCRIPT_TOKENS: u32 = 200_000;

/// Transcripts below this word count skip the LLM entirely.
pub const SHORT_TRANSCRIPT_WORDS: usize = 100;

/// Two candidates are duplicates when their overlap exceeds half of the
/// later candidate's own duration. Exactly 50% is kept.
const OVERLAP_THRESHOLD: f64 = 0.5;

/// Clamp candidate windows into `[0, video_duration]` with a length of
/// 15-60 seconds.
///
/// The clamp order is: pull into bounds, extend short windows forward,
/// truncate long ones, then pull back from the tail. A video shorter than
/// 15 seconds yields the whole video as the window.
pub fn validate_moments(
    moments: Vec<MomentCandidate>,
    video_duration: f64,
) -> Vec<MomentCandidate> {
    moments
        .into_iter()
        .map(|mut m| {
            m.start = m.start.max(0.0);
            m.end = m.end.min(video_duration);

            if m.end - m.start < MIN_CLIP_SECS {
                m.end = m.start + MIN_CLIP_SECS;
            }
            if m.end - m.start > MAX_CLIP_SECS {
                m.end = m.start + MAX_CLIP_SECS;
            }
            if m.end > video_duration {
                m.end = video_duration;
                m.start = (m.end - MIN_CLIP_SECS).max(0.0);
            }

            if m.end - m.start < MIN_CLIP_SECS && video_duration < MIN_CLIP_SECS {
                m.start = 0.0;
                m.end = video_duration;
            }

            m
        })
        .collect()
}

/// Drop overlapping candidates, preferring the stronger hook.
///
/// Candidates are considered strongest-first; a candidate is dropped when
/// more than half of its own duration is covered by an already-kept one.
pub fn deduplicate_moments(moments: Vec<MomentCandidate>) -> Vec<MomentCandidate> {
    let mut sorted = moments;
    sorted.sort_by(|a, b| b.hook_strength.cmp(&a.hook_strength));

    let mut result: Vec<MomentCandidate> = Vec::new();
    for moment in sorted {
        let duration = moment.duration();
        let has_overlap = duration > 0.0
            && result
                .iter()
                .any(|kept| moment.overlap_with(kept) / duration > OVERLAP_THRESHOLD);
        if !has_overlap {
            result.push(moment);
        }
    }
    result
}

/// Make finalized titles unique within one batch by appending a part
/// suffix ("X", "X — Ч.2", "X — Ч.3", ...).
pub fn deduplicate_titles(moments: Vec<EnrichedMoment>) -> Vec<EnrichedMoment> {
    let mut seen: Vec<String> = Vec::new();

    moments
        .into_iter()
        .map(|mut item| {
            if seen.contains(&item.title) {
                let mut suffix = 2;
                let mut candidate = format!("{} — Ч.{}", item.title, suffix);
                while seen.contains(&candidate) {
                    suffix += 1;
                    candidate = format!("{} — Ч.{}", item.title, suffix);
                }
                item.title = candidate;
            }
            seen.push(item.title.clone());
            item
        })
        .collect()
}

/// Synthesize `count` evenly spaced 30-second windows when the LLM gives
/// nothing usable.
pub fn generate_fallback_moments(video_duration: f64, count: usize) -> Vec<MomentCandidate> {
    let clip_duration = 30.0;
    let spacing = (video_duration - clip_duration) / (count as f64 + 1.0);

    (1..=count)
        .map(|i| {
            let start = (spacing * i as f64).floor();
            MomentCandidate {
                start,
                end: start + clip_duration,
                title: format!("Момент {i}"),
                reason: "Auto-generated fallback".to_string(),
                hook_strength: 10,
            }
        })
        .collect()
}

/// One 60-second window centered on the video midpoint, for transcripts
/// too short to analyze.
pub fn short_transcript_moment(video_duration: f64) -> MomentCandidate {
    let mid_point = (video_duration / 2.0).floor();
    let start = (mid_point - 30.0).max(0.0);
    let end = (start + 60.0).min(video_duration);
    MomentCandidate {
        start,
        end,
        title: "Основной момент".to_string(),
        reason: "Auto-generated (short transcript)".to_string(),
        hook_strength: 10,
    }
}

/// Cut a transcript down to roughly `max_tokens`, assuming ~2.5 tokens
/// per word for Russian text.
pub fn truncate_transcript(full_text: &str, max_tokens: u32) -> String {
    let words: Vec<&str> = full_text.split_whitespace().collect();
    let max_words = (max_tokens as f64 / 2.5).floor() as usize;
    if words.len() <= max_words {
        return full_text.to_string();
    }
    words[..max_words].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use klip_models::ViralityScore;

    fn candidate(start: f64, end: f64, hook: u8) -> MomentCandidate {
        MomentCandidate {
            start,
            end,
            title: "t".to_string(),
            reason: "r".to_string(),
            hook_strength: hook,
        }
    }

    fn enriched(title: &str, total: u8) -> EnrichedMoment {
        EnrichedMoment {
            moment: candidate(0.0, 30.0, 10),
            virality: ViralityScore::from_hook_strength(total / 4),
            title: title.to_string(),
            cta: None,
            subtitle_segments: Vec::new(),
        }
    }

    #[test]
    fn validated_moments_respect_bounds_and_length() {
        let duration = 300.0;
        let cases = vec![
            candidate(-10.0, 5.0, 10),   // negative start, too short
            candidate(100.0, 105.0, 10), // too short
            candidate(0.0, 200.0, 10),   // too long
            candidate(290.0, 400.0, 10), // runs past the tail
        ];
        for m in validate_moments(cases, duration) {
            assert!(m.start >= 0.0);
            assert!(m.end <= duration);
            assert!(m.duration() >= MIN_CLIP_SECS - f64::EPSILON);
            assert!(m.duration() <= MAX_CLIP_SECS + f64::EPSILON);
        }
    }

    #[test]
    fn short_moments_extend_forward() {
        let result = validate_moments(vec![candidate(100.0, 105.0, 10)], 300.0);
        assert!((result[0].start - 100.0).abs() < f64::EPSILON);
        assert!((result[0].end - 115.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tail_moments_pull_back() {
        // Extending 295..300 forward overshoots the tail, so the window is
        // pulled back to the final 15 seconds.
        let result = validate_moments(vec![candidate(295.0, 300.0, 10)], 300.0);
        assert!((result[0].start - 285.0).abs() < f64::EPSILON);
        assert!((result[0].end - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn whole_video_when_shorter_than_minimum() {
        let result = validate_moments(vec![candidate(2.0, 8.0, 10)], 10.0);
        assert!((result[0].start - 0.0).abs() < f64::EPSILON);
        assert!((result[0].end - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dedup_drops_weaker_overlapping_candidate() {
        let kept = candidate(0.0, 30.0, 20);
        let dropped = candidate(5.0, 35.0, 10); // 25s overlap / 30s = 83%
        let result = deduplicate_moments(vec![dropped, kept]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hook_strength, 20);
    }

    #[test]
    fn exact_half_overlap_keeps_both() {
        let a = candidate(0.0, 30.0, 20);
        let b = candidate(15.0, 45.0, 10); // 15s overlap / 30s = exactly 0.5
        let result = deduplicate_moments(vec![a, b]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn dedup_is_idempotent() {
        let input = vec![
            candidate(0.0, 30.0, 20),
            candidate(5.0, 35.0, 15),
            candidate(50.0, 80.0, 10),
        ];
        let once = deduplicate_moments(input);
        let twice = deduplicate_moments(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn triple_title_collision_gets_part_suffixes() {
        let result = deduplicate_titles(vec![enriched("X", 80), enriched("X", 60), enriched("X", 40)]);
        let titles: Vec<&str> = result.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["X", "X — Ч.2", "X — Ч.3"]);
    }

    #[test]
    fn fallback_moments_are_spaced_inside_the_video() {
        let moments = generate_fallback_moments(300.0, 3);
        assert_eq!(moments.len(), 3);
        for (i, m) in moments.iter().enumerate() {
            assert!(m.start >= 0.0);
            assert!(m.end <= 300.0);
            assert!((m.duration() - 30.0).abs() < f64::EPSILON);
            assert_eq!(m.title, format!("Момент {}", i + 1));
        }
        // Non-overlapping: 67.5 spacing gives starts at 67, 135, 202.
        for pair in moments.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn short_transcript_window_is_centered() {
        let m = short_transcript_moment(40.0);
        assert!((m.start - 0.0).abs() < f64::EPSILON);
        assert!((m.end - 40.0).abs() < f64::EPSILON);
        assert_eq!(m.title, "Основной момент");

        let m = short_transcript_moment(300.0);
        assert!((m.start - 120.0).abs() < f64::EPSILON);
        assert!((m.end - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn truncation_caps_word_count() {
        let text = vec!["слово"; 100].join(" ");
        // 100 tokens / 2.5 = 40 words
        let truncated = truncate_transcript(&text, 100);
        assert_eq!(truncated.split_whitespace().count(), 40);

        let short = "пара слов";
        assert_eq!(truncate_transcript(short, 100), short);
    }
}
