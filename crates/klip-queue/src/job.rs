//! Typed job payloads, one per pipeline stage.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use klip_models::{ClipFormat, Cta, LlmStrategy, PlanTier, SubtitleSegment};

use crate::error::{QueueError, QueueResult};

/// Pipeline stages, each backed by its own Redis stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Transcribe,
    Analyze,
    Render,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Transcribe => "transcribe",
            Stage::Analyze => "analyze",
            Stage::Render => "render",
        }
    }

    pub const ALL: [Stage; 4] = [
        Stage::Download,
        Stage::Transcribe,
        Stage::Analyze,
        Stage::Render,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queued payload: knows its stage, its id and its dedup key.
pub trait QueueJob: Serialize + DeserializeOwned + Send + Sync {
    const STAGE: Stage;

    fn job_id(&self) -> &str;

    /// Key used to reject duplicate enqueues of the same logical work.
    fn idempotency_key(&self) -> String;

    /// Payload sanity check before any work starts. Failure is terminal.
    fn validate(&self) -> QueueResult<()> {
        Ok(())
    }
}

fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fetch a source video from a URL into object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    pub job_id: String,
    pub video_id: String,
    pub user_id: String,
    pub url: String,
    pub strategy: LlmStrategy,
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        url: impl Into<String>,
        strategy: LlmStrategy,
        plan: PlanTier,
    ) -> Self {
        Self {
            job_id: new_job_id(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            url: url.into(),
            strategy,
            plan,
            created_at: Utc::now(),
        }
    }
}

impl QueueJob for DownloadJob {
    const STAGE: Stage = Stage::Download;

    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn idempotency_key(&self) -> String {
        format!("download:{}", self.video_id)
    }
}

/// Extract audio and transcribe a stored source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeJob {
    pub job_id: String,
    pub video_id: String,
    pub user_id: String,
    /// Object storage key of the source file
    pub file_path: String,
    pub strategy: LlmStrategy,
    pub plan: PlanTier,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl TranscribeJob {
    pub fn new(
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        file_path: impl Into<String>,
        strategy: LlmStrategy,
        plan: PlanTier,
        language: impl Into<String>,
    ) -> Self {
        Self {
            job_id: new_job_id(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            file_path: file_path.into(),
            strategy,
            plan,
            language: language.into(),
            created_at: Utc::now(),
        }
    }
}

impl QueueJob for TranscribeJob {
    const STAGE: Stage = Stage::Transcribe;

    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn idempotency_key(&self) -> String {
        format!("transcribe:{}", self.video_id)
    }
}

/// Analysis inputs carried alongside the job so the stage can route
/// without re-reading the transcript row first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeInput {
    pub full_text: String,
    pub token_count: u32,
    pub plan: PlanTier,
    pub video_duration_seconds: f64,
}

/// Select and enrich moments for a transcribed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeJob {
    pub job_id: String,
    pub video_id: String,
    pub user_id: String,
    pub strategy: LlmStrategy,
    pub input: AnalyzeInput,
    pub created_at: DateTime<Utc>,
}

impl AnalyzeJob {
    pub fn new(
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        strategy: LlmStrategy,
        input: AnalyzeInput,
    ) -> Self {
        Self {
            job_id: new_job_id(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            strategy,
            input,
            created_at: Utc::now(),
        }
    }
}

impl QueueJob for AnalyzeJob {
    const STAGE: Stage = Stage::Analyze;

    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn idempotency_key(&self) -> String {
        format!("analyze:{}", self.video_id)
    }
}

/// Render one clip from the stored source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub job_id: String,
    pub clip_id: String,
    pub video_id: String,
    pub user_id: String,
    /// Object storage key of the source file
    pub source_file_path: String,
    pub start_time: f64,
    pub end_time: f64,
    pub format: ClipFormat,
    pub subtitle_segments: Vec<SubtitleSegment>,
    pub cta: Option<Cta>,
    pub watermark: bool,
    pub created_at: DateTime<Utc>,
}

impl QueueJob for RenderJob {
    const STAGE: Stage = Stage::Render;

    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn idempotency_key(&self) -> String {
        format!("render:{}", self.clip_id)
    }

    fn validate(&self) -> QueueResult<()> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(QueueError::invalid_payload("non-finite clip times"));
        }
        if self.start_time < 0.0 {
            return Err(QueueError::invalid_payload("negative start time"));
        }
        if self.end_time <= self.start_time {
            return Err(QueueError::invalid_payload("end time not after start time"));
        }
        if self.source_file_path.is_empty() {
            return Err(QueueError::invalid_payload("empty source file path"));
        }
        for segment in &self.subtitle_segments {
            if !segment.start.is_finite() || !segment.end.is_finite() {
                return Err(QueueError::invalid_payload("non-finite subtitle times"));
            }
        }
        Ok(())
    }
}

impl RenderJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clip_id: impl Into<String>,
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        source_file_path: impl Into<String>,
        start_time: f64,
        end_time: f64,
        format: ClipFormat,
        watermark: bool,
    ) -> Self {
        Self {
            job_id: new_job_id(),
            clip_id: clip_id.into(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            source_file_path: source_file_path.into(),
            start_time,
            end_time,
            format,
            subtitle_segments: Vec::new(),
            cta: None,
            watermark,
            created_at: Utc::now(),
        }
    }

    pub fn with_subtitles(mut self, segments: Vec<SubtitleSegment>) -> Self {
        self.subtitle_segments = segments;
        self
    }

    pub fn with_cta(mut self, cta: Option<Cta>) -> Self {
        self.cta = cta;
        self
    }
}
