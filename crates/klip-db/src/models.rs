//! Row types and insert DTOs.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use klip_models::{
    ClipFormat, ClipStatus, Cta, SubtitleSegment, Transcript, TranscriptSegment, VideoStatus,
    ViralityScore,
};

use crate::error::DbResult;

/// A row from the `videos` table.
#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: String,
    pub user_id: String,
    pub source_type: String,
    pub source_url: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRow {
    pub fn status(&self) -> VideoStatus {
        VideoStatus::parse(&self.status)
    }
}

/// Insert DTO for `videos`.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub id: String,
    pub user_id: String,
    pub source_type: String,
    pub source_url: Option<String>,
    pub status: VideoStatus,
}

/// A row from the `transcripts` table.
#[derive(Debug, Clone, FromRow)]
pub struct TranscriptRow {
    pub id: String,
    pub video_id: String,
    pub segments: serde_json::Value,
    pub full_text: String,
    pub token_count: i32,
    pub language: String,
    pub stt_model: String,
    pub created_at: DateTime<Utc>,
}

impl TranscriptRow {
    /// Rehydrate the domain transcript from the stored row.
    pub fn to_domain(&self) -> DbResult<Transcript> {
        let segments: Vec<TranscriptSegment> = serde_json::from_value(self.segments.clone())?;
        Ok(Transcript {
            segments,
            full_text: self.full_text.clone(),
            token_count: self.token_count.max(0) as u32,
            language: self.language.clone(),
            stt_model: self.stt_model.clone(),
        })
    }
}

/// A row from the `clips` table.
#[derive(Debug, Clone, FromRow)]
pub struct ClipRow {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
    pub format: String,
    pub status: String,
    pub virality: serde_json::Value,
    pub cta: Option<serde_json::Value>,
    pub subtitle_segments: serde_json::Value,
    pub watermark: bool,
    pub file_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClipRow {
    pub fn status(&self) -> ClipStatus {
        ClipStatus::parse(&self.status)
    }

    pub fn virality(&self) -> DbResult<ViralityScore> {
        Ok(serde_json::from_value(self.virality.clone())?)
    }

    pub fn cta(&self) -> DbResult<Option<Cta>> {
        match &self.cta {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn subtitle_segments(&self) -> DbResult<Vec<SubtitleSegment>> {
        Ok(serde_json::from_value(self.subtitle_segments.clone())?)
    }
}

/// Insert DTO for `clips`.
#[derive(Debug, Clone)]
pub struct NewClip {
    pub id: String,
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
    pub format: ClipFormat,
    pub virality: ViralityScore,
    pub cta: Option<Cta>,
    pub subtitle_segments: Vec<SubtitleSegment>,
    pub watermark: bool,
}

/// Insert DTO for `usage_records`.
#[derive(Debug, Clone)]
pub struct NewUsageRecord {
    pub user_id: String,
    pub video_id: String,
    pub task: String,
    pub model: String,
    pub tier: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_kopecks: i64,
    pub byok: bool,
}
