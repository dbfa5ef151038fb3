//! Schema validation for structured LLM responses.
//!
//! Every structured task's response is parsed and range-checked before
//! use; anything malformed yields `None` and the caller falls back.

use serde::Deserialize;

use klip_models::{Cta, CtaPosition, MomentCandidate, ViralityScore};

#[derive(Debug, Deserialize)]
struct MomentsResponse {
    moments: Vec<RawMoment>,
}

#[derive(Debug, Deserialize)]
struct RawMoment {
    start: f64,
    end: f64,
    title: String,
    reason: String,
    hook_strength: f64,
}

#[derive(Debug, Deserialize)]
struct ViralityResponse {
    hook: f64,
    engagement: f64,
    flow: f64,
    trend: f64,
    #[serde(default)]
    tips: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Debug, Deserialize)]
struct CtaResponse {
    text: String,
    position: String,
    duration: f64,
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value.is_finite() && value >= min && value <= max
}

/// Parse and validate a moment-selection response. Expects 1-15 moments
/// with bounded title/reason lengths and hook strength in [0, 25].
pub fn parse_moments(content: &str) -> Option<Vec<MomentCandidate>> {
    let parsed: MomentsResponse = serde_json::from_str(content).ok()?;

    if parsed.moments.is_empty() || parsed.moments.len() > 15 {
        return None;
    }

    let mut moments = Vec::with_capacity(parsed.moments.len());
    for raw in parsed.moments {
        if !raw.start.is_finite() || raw.start < 0.0 {
            return None;
        }
        if !raw.end.is_finite() || raw.end < 0.0 {
            return None;
        }
        if raw.title.is_empty() || raw.title.chars().count() > 100 {
            return None;
        }
        if raw.reason.is_empty() || raw.reason.chars().count() > 500 {
            return None;
        }
        if !in_range(raw.hook_strength, 0.0, 25.0) {
            return None;
        }
        moments.push(MomentCandidate {
            start: raw.start,
            end: raw.end,
            title: raw.title,
            reason: raw.reason,
            hook_strength: raw.hook_strength.round() as u8,
        });
    }
    Some(moments)
}

/// Parse and validate a virality-scoring response. The total is always
/// recomputed from the sub-scores; 1-3 tips are required.
pub fn parse_virality(content: &str) -> Option<ViralityScore> {
    let parsed: ViralityResponse = serde_json::from_str(content).ok()?;

    for value in [parsed.hook, parsed.engagement, parsed.flow, parsed.trend] {
        if !in_range(value, 0.0, 25.0) {
            return None;
        }
    }
    if parsed.tips.is_empty() || parsed.tips.len() > 3 {
        return None;
    }

    Some(ViralityScore::from_parts(
        parsed.hook.round() as u8,
        parsed.engagement.round() as u8,
        parsed.flow.round() as u8,
        parsed.trend.round() as u8,
        parsed.tips,
    ))
}

/// Parse and validate a title response: 1-60 characters.
pub fn parse_title(content: &str) -> Option<String> {
    let parsed: TitleResponse = serde_json::from_str(content).ok()?;
    let len = parsed.title.chars().count();
    (1..=60).contains(&len).then_some(parsed.title)
}

/// Parse and validate a CTA response: 3-8 words, at most 50 characters,
/// a known position, and a 3-5 second duration.
pub fn parse_cta(content: &str) -> Option<Cta> {
    let parsed: CtaResponse = serde_json::from_str(content).ok()?;

    let text = parsed.text.trim();
    if text.is_empty() || text.chars().count() > 50 {
        return None;
    }
    let words = text.split_whitespace().count();
    if !(3..=8).contains(&words) {
        return None;
    }

    let position = match parsed.position.as_str() {
        "end" => CtaPosition::End,
        "overlay" => CtaPosition::Overlay,
        _ => return None,
    };

    if parsed.duration.fract() != 0.0 || !in_range(parsed.duration, 3.0, 5.0) {
        return None;
    }

    Some(Cta {
        text: text.to_string(),
        position,
        duration: parsed.duration as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_moments() {
        let content = r#"{"moments": [
            {"start": 10, "end": 40, "title": "Крутой момент", "reason": "hook", "hook_strength": 18}
        ]}"#;
        let moments = parse_moments(content).unwrap();
        assert_eq!(moments.len(), 1);
        assert_eq!(moments[0].hook_strength, 18);
    }

    #[test]
    fn rejects_bad_moment_payloads() {
        assert!(parse_moments("not json").is_none());
        assert!(parse_moments(r#"{"moments": []}"#).is_none());
        assert!(parse_moments(
            r#"{"moments": [{"start": -1, "end": 10, "title": "t", "reason": "r", "hook_strength": 10}]}"#
        )
        .is_none());
        assert!(parse_moments(
            r#"{"moments": [{"start": 0, "end": 10, "title": "t", "reason": "r", "hook_strength": 26}]}"#
        )
        .is_none());
        assert!(parse_moments(
            r#"{"moments": [{"start": 0, "end": 10, "title": "", "reason": "r", "hook_strength": 10}]}"#
        )
        .is_none());
    }

    #[test]
    fn virality_total_is_recomputed() {
        // The model claims total 100; we ignore it.
        let content = r#"{"hook": 20, "engagement": 15, "flow": 10, "trend": 5, "total": 100, "tips": ["a"]}"#;
        let score = parse_virality(content).unwrap();
        assert_eq!(score.total, 50);
    }

    #[test]
    fn rejects_out_of_range_scores_and_missing_tips() {
        assert!(parse_virality(
            r#"{"hook": 30, "engagement": 15, "flow": 10, "trend": 5, "tips": ["a"]}"#
        )
        .is_none());
        assert!(
            parse_virality(r#"{"hook": 20, "engagement": 15, "flow": 10, "trend": 5, "tips": []}"#)
                .is_none()
        );
    }

    #[test]
    fn title_length_is_bounded() {
        assert_eq!(
            parse_title(r#"{"title": "Отличный заголовок"}"#).as_deref(),
            Some("Отличный заголовок")
        );
        assert!(parse_title(r#"{"title": ""}"#).is_none());
        let long = format!(r#"{{"title": "{}"}}"#, "ы".repeat(61));
        assert!(parse_title(&long).is_none());
    }

    #[test]
    fn cta_word_count_and_duration_enforced() {
        let cta =
            parse_cta(r#"{"text": "Подпишись на наш канал", "position": "end", "duration": 4}"#)
                .unwrap();
        assert_eq!(cta.position, CtaPosition::End);
        assert_eq!(cta.duration, 4);

        // Two words.
        assert!(parse_cta(r#"{"text": "Жми сюда", "position": "end", "duration": 4}"#).is_none());
        // Nine words.
        assert!(parse_cta(
            r#"{"text": "a b c d e f g h i", "position": "end", "duration": 4}"#
        )
        .is_none());
        // Unknown position.
        assert!(parse_cta(
            r#"{"text": "Подпишись на наш канал", "position": "corner", "duration": 4}"#
        )
        .is_none());
        // Out-of-range duration.
        assert!(parse_cta(
            r#"{"text": "Подпишись на наш канал", "position": "end", "duration": 6}"#
        )
        .is_none());
    }
}
