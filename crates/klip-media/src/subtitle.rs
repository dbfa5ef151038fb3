//! ASS subtitle track composition.

use klip_models::{ClipFormat, SubtitleSegment};

/// ASS style block shared by all clips. Fontsize is tuned for 1080-wide
/// output; the player scales it with PlayRes.
const ASS_STYLE: &str = "Style: Default,Arial,64,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,\
-1,0,0,0,100,100,0,0,1,3,1,2,40,40,80,1";

/// Format seconds as an ASS timecode `H:MM:SS.CC`.
///
/// Centiseconds are clamped to 99 so that values like 90.999 never round
/// up to an invalid ".100".
pub fn format_ass_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds.floor();
    let h = (whole / 3600.0) as u64;
    let m = ((whole % 3600.0) / 60.0) as u64;
    let s = (whole % 60.0) as u64;
    let cs = (((seconds - whole) * 100.0) as u64).min(99);
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

/// Greedy word-wrap to at most `max_len` characters per line.
///
/// A single word longer than the limit gets its own line rather than being
/// split mid-word.
pub fn wrap_text(text: &str, max_len: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= max_len {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Escape ASS override-block braces so subtitle text cannot inject styling.
fn escape_ass(text: &str) -> String {
    text.replace('{', "\\{").replace('}', "\\}")
}

/// Compose an ASS document from clip-relative subtitle segments.
///
/// Segments are clamped to `[0, clip_duration]`; segments that end up with
/// zero or negative duration after clamping are dropped.
pub fn compose_ass(
    segments: &[SubtitleSegment],
    format: ClipFormat,
    clip_duration: f64,
) -> String {
    let (play_x, play_y) = format.dimensions();
    let max_line = format.max_subtitle_line();

    let mut doc = String::new();
    doc.push_str("[Script Info]\n");
    doc.push_str("ScriptType: v4.00+\n");
    doc.push_str(&format!("PlayResX: {play_x}\n"));
    doc.push_str(&format!("PlayResY: {play_y}\n"));
    doc.push_str("WrapStyle: 2\n\n");

    doc.push_str("[V4+ Styles]\n");
    doc.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    doc.push_str(ASS_STYLE);
    doc.push_str("\n\n");

    doc.push_str("[Events]\n");
    doc.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");

    for seg in segments {
        let start = seg.start.max(0.0);
        let end = seg.end.min(clip_duration);
        if end <= start {
            continue;
        }

        let wrapped = wrap_text(&seg.text, max_line);
        let text = escape_ass(&wrapped).replace('\n', "\\N");

        doc.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_time(start),
            format_ass_time(end),
            text
        ));
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> SubtitleSegment {
        SubtitleSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn timecode_clamps_centiseconds() {
        assert_eq!(format_ass_time(90.999), "0:01:30.99");
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(3661.5), "1:01:01.50");
        assert_eq!(format_ass_time(-2.0), "0:00:00.00");
    }

    #[test]
    fn greedy_wrap_fills_lines() {
        assert_eq!(wrap_text("a bb ccc dddd", 6), "a bb\nccc\ndddd");
        // Oversized word keeps its own line.
        assert_eq!(wrap_text("короткое слишкомдлинноеслово", 10), "короткое\nслишкомдлинноеслово");
        assert_eq!(wrap_text("", 10), "");
    }

    #[test]
    fn portrait_wraps_narrower_than_landscape() {
        let text = "в этом видео мы разберем самый важный момент недели";
        let portrait = wrap_text(text, ClipFormat::Portrait.max_subtitle_line());
        let landscape = wrap_text(text, ClipFormat::Landscape.max_subtitle_line());
        assert!(portrait.matches('\n').count() >= landscape.matches('\n').count());
    }

    #[test]
    fn braces_are_escaped() {
        let doc = compose_ass(&[seg(0.0, 2.0, "{\\b1}bold{\\b0}")], ClipFormat::Portrait, 10.0);
        assert!(doc.contains("\\{\\b1\\}bold\\{\\b0\\}"));
    }

    #[test]
    fn newlines_become_ass_breaks() {
        let doc = compose_ass(
            &[seg(0.0, 2.0, "первая строка этого текста довольно длинная да")],
            ClipFormat::Portrait,
            10.0,
        );
        assert!(doc.contains("\\N"));
        assert!(!doc.lines().any(|l| l.starts_with("Dialogue") && l.contains('\n')));
    }

    #[test]
    fn segments_clamped_and_empty_dropped() {
        let doc = compose_ass(
            &[
                seg(-1.0, 2.0, "clamped start"),
                seg(8.0, 15.0, "clamped end"),
                seg(11.0, 12.0, "fully outside"),
                seg(3.0, 3.0, "zero duration"),
            ],
            ClipFormat::Square,
            10.0,
        );
        assert!(doc.contains("0:00:00.00,0:00:02.00"));
        assert!(doc.contains("0:00:08.00,0:00:10.00"));
        assert!(!doc.contains("fully outside"));
        assert!(!doc.contains("zero duration"));
    }

    #[test]
    fn header_matches_format_resolution() {
        let doc = compose_ass(&[], ClipFormat::Landscape, 10.0);
        assert!(doc.contains("PlayResX: 1920"));
        assert!(doc.contains("PlayResY: 1080"));
    }
}
