//! FFmpeg video filter construction for clip rendering.
//!
//! The render chain is always built in the same order: scale-and-letterbox
//! to the target format, burn in subtitles, draw the CTA overlay, draw the
//! watermark. Later stages are skipped when their input is absent.

use std::path::Path;

use klip_models::{ClipFormat, Cta, CtaPosition};

/// Watermark text drawn on free-plan exports.
pub const WATERMARK_TEXT: &str = "KlipMaker.ru";

/// Inputs for one clip's filter chain.
#[derive(Debug, Clone, Default)]
pub struct FilterChainSpec {
    /// Path to an ASS subtitle file to burn in, if any
    pub subtitle_path: Option<std::path::PathBuf>,
    /// CTA to draw as an overlay during the clip's tail, if positioned so
    pub cta: Option<Cta>,
    /// Clip duration in seconds (needed to time the CTA overlay)
    pub clip_duration: f64,
    /// Whether to draw the platform watermark
    pub watermark: bool,
}

/// Scale to the format's fixed dimensions, preserving aspect ratio and
/// padding the remainder with black bars.
pub fn scale_letterbox(format: ClipFormat) -> String {
    let (w, h) = format.dimensions();
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
    )
}

/// Build the full `-vf` filter chain for a clip.
pub fn build_filter_chain(format: ClipFormat, spec: &FilterChainSpec) -> String {
    let mut stages = vec![scale_letterbox(format)];

    if let Some(path) = &spec.subtitle_path {
        stages.push(format!("subtitles='{}'", escape_filter_path(path)));
    }

    if let Some(cta) = &spec.cta {
        if cta.position == CtaPosition::Overlay {
            stages.push(cta_overlay_filter(cta, spec.clip_duration));
        }
    }

    if spec.watermark {
        stages.push(watermark_filter());
    }

    stages.join(",")
}

/// Draw the CTA text centered near the bottom for the clip's final seconds.
fn cta_overlay_filter(cta: &Cta, clip_duration: f64) -> String {
    let show_from = (clip_duration - cta.duration as f64).max(0.0);
    format!(
        "drawtext=text='{}':fontsize=48:fontcolor=white:box=1:boxcolor=black@0.5:boxborderw=16:\
         x=(w-text_w)/2:y=h-text_h-160:enable='gte(t\\,{:.3})'",
        escape_drawtext(&cta.text),
        show_from
    )
}

/// Semi-transparent branding in the bottom-right corner.
fn watermark_filter() -> String {
    format!(
        "drawtext=text='{}':fontsize=36:fontcolor=white@0.5:x=w-text_w-20:y=h-text_h-20",
        escape_drawtext(WATERMARK_TEXT)
    )
}

/// Escape a path for use inside a quoted filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Escape user-supplied text for drawtext. Percent signs trigger expansion
/// and colons terminate the option, so both must be escaped.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn scale_filters_per_format() {
        assert_eq!(
            scale_letterbox(ClipFormat::Portrait),
            "scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2"
        );
        assert_eq!(
            scale_letterbox(ClipFormat::Square),
            "scale=1080:1080:force_original_aspect_ratio=decrease,pad=1080:1080:(ow-iw)/2:(oh-ih)/2"
        );
        assert_eq!(
            scale_letterbox(ClipFormat::Landscape),
            "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2"
        );
    }

    #[test]
    fn chain_order_is_scale_subs_cta_watermark() {
        let spec = FilterChainSpec {
            subtitle_path: Some(PathBuf::from("/tmp/subs.ass")),
            cta: Some(Cta {
                text: "Подписывайся".to_string(),
                position: CtaPosition::Overlay,
                duration: 4,
            }),
            clip_duration: 30.0,
            watermark: true,
        };
        let chain = build_filter_chain(ClipFormat::Portrait, &spec);

        let scale_pos = chain.find("scale=").unwrap();
        let subs_pos = chain.find("subtitles=").unwrap();
        let cta_pos = chain.find("Подписывайся").unwrap();
        let wm_pos = chain.find("KlipMaker.ru").unwrap();
        assert!(scale_pos < subs_pos);
        assert!(subs_pos < cta_pos);
        assert!(cta_pos < wm_pos);
    }

    #[test]
    fn end_positioned_cta_is_not_overlaid() {
        let spec = FilterChainSpec {
            cta: Some(Cta {
                text: "Смотри полное видео".to_string(),
                position: CtaPosition::End,
                duration: 3,
            }),
            clip_duration: 30.0,
            ..Default::default()
        };
        let chain = build_filter_chain(ClipFormat::Square, &spec);
        assert!(!chain.contains("drawtext"));
    }

    #[test]
    fn cta_overlay_enabled_for_tail_only() {
        let cta = Cta {
            text: "go".to_string(),
            position: CtaPosition::Overlay,
            duration: 5,
        };
        let filter = cta_overlay_filter(&cta, 30.0);
        assert!(filter.contains("gte(t\\,25.000)"));

        // Clip shorter than the CTA window shows it from the start.
        let filter = cta_overlay_filter(&cta, 3.0);
        assert!(filter.contains("gte(t\\,0.000)"));
    }

    #[test]
    fn drawtext_escaping() {
        assert_eq!(escape_drawtext("a:b'c%d"), "a\\:b\\'c\\%d");
    }
}
