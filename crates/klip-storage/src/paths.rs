//! Deterministic object key scheme.
//!
//! Every key is built from validated segments so user-controlled IDs can
//! never traverse into another prefix.

use crate::error::{StorageError, StorageResult};

/// Segments may contain ASCII letters, digits, `_` and `-`.
fn validate_segment(segment: &str) -> StorageResult<&str> {
    if segment.is_empty()
        || !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    Ok(segment)
}

/// Extensions are short lowercase alphanumeric strings, no dot.
fn validate_extension(ext: &str) -> StorageResult<&str> {
    let ok = (1..=10).contains(&ext.len())
        && ext
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !ok {
        return Err(StorageError::InvalidKey(ext.to_string()));
    }
    Ok(ext)
}

/// Key for a video's source file.
pub fn source_key(user_id: &str, video_id: &str, extension: &str) -> StorageResult<String> {
    Ok(format!(
        "videos/{}/{}/source.{}",
        validate_segment(user_id)?,
        validate_segment(video_id)?,
        validate_extension(extension)?
    ))
}

/// Key for a rendered clip.
pub fn clip_key(user_id: &str, video_id: &str, clip_id: &str) -> StorageResult<String> {
    Ok(format!(
        "clips/{}/{}/{}.mp4",
        validate_segment(user_id)?,
        validate_segment(video_id)?,
        validate_segment(clip_id)?
    ))
}

/// Key for a clip's thumbnail.
pub fn thumbnail_key(user_id: &str, video_id: &str, clip_id: &str) -> StorageResult<String> {
    Ok(format!(
        "thumbnails/{}/{}/{}.jpg",
        validate_segment(user_id)?,
        validate_segment(video_id)?,
        validate_segment(clip_id)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_keys() {
        assert_eq!(
            source_key("u1", "vid-2", "mp4").unwrap(),
            "videos/u1/vid-2/source.mp4"
        );
        assert_eq!(
            clip_key("u1", "vid-2", "clip_3").unwrap(),
            "clips/u1/vid-2/clip_3.mp4"
        );
        assert_eq!(
            thumbnail_key("u1", "vid-2", "clip_3").unwrap(),
            "thumbnails/u1/vid-2/clip_3.jpg"
        );
    }

    #[test]
    fn rejects_traversal_and_separator_segments() {
        assert!(source_key("../etc", "v", "mp4").is_err());
        assert!(source_key("u", "v/w", "mp4").is_err());
        assert!(source_key("", "v", "mp4").is_err());
        assert!(clip_key("u", "v", "c c").is_err());
    }

    #[test]
    fn rejects_bad_extensions() {
        assert!(source_key("u", "v", "").is_err());
        assert!(source_key("u", "v", "MP4").is_err());
        assert!(source_key("u", "v", "m.p4").is_err());
        assert!(source_key("u", "v", "verylongexts").is_err());
    }
}
