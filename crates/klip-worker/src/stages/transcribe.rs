//! Transcription stage: extract audio, chunk it, run STT chunk by chunk
//! and persist the stitched transcript.

use tracing::{info, warn};

use klip_db::{TranscriptRepo, VideoRepo};
use klip_media::{extract_audio, split_audio};
use klip_models::{Transcript, TranscriptSegment, VideoStatus};
use klip_queue::{AnalyzeInput, AnalyzeJob, QueueError, TranscribeJob};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

pub async fn run(ctx: &WorkerContext, job: &TranscribeJob) -> WorkerResult<()> {
    let video = VideoRepo::get(&ctx.pool, &job.video_id).await?;
    match video.status() {
        VideoStatus::Transcribing => {}
        VideoStatus::Analyzing | VideoStatus::GeneratingClips | VideoStatus::Completed => {
            info!(video_id = %job.video_id, "already transcribed, skipping");
            return Ok(());
        }
        other => {
            return Err(WorkerError::terminal(format!(
                "video {} not transcribable in status {}",
                job.video_id,
                other.as_str()
            )))
        }
    }

    let workdir = tempfile::tempdir_in(&ctx.config.work_dir)?;

    let source_path = workdir.path().join("source");
    ctx.storage.download_file(&job.file_path, &source_path).await?;

    let audio_path = workdir.path().join("audio.wav");
    extract_audio(&source_path, &audio_path).await?;

    let chunks = split_audio(&audio_path, workdir.path()).await?;
    info!(video_id = %job.video_id, chunks = chunks.len(), "audio chunked for STT");

    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut texts: Vec<String> = Vec::new();
    let mut stt_model = String::new();

    // Chunks are transcribed sequentially; STT latency dominates and the
    // provider rate limits burst uploads anyway.
    for (index, chunk) in chunks.iter().enumerate() {
        let audio = tokio::fs::read(&chunk.path).await?;
        let file_name = format!("chunk_{index:04}.mp3");
        let response = ctx
            .router
            .transcribe(job.strategy, audio, &file_name, &job.language)
            .await?;

        stt_model = response.model;
        for segment in response.transcription.segments {
            segments.push(TranscriptSegment {
                start: segment.start + chunk.start_offset,
                end: segment.end + chunk.start_offset,
                text: segment.text,
                confidence: 1.0,
            });
        }
        let text = response.transcription.text.trim().to_string();
        if !text.is_empty() {
            texts.push(text);
        }
    }

    let full_text = texts.join(" ");
    let token_count = Transcript::estimate_tokens(&full_text);
    let transcript = Transcript {
        segments,
        full_text: full_text.clone(),
        token_count,
        language: job.language.clone(),
        stt_model,
    };
    TranscriptRepo::upsert(&ctx.pool, &job.video_id, &transcript).await?;

    // The stored duration comes from the download probe; fall back to the
    // last segment for direct uploads that skipped it.
    let video_duration = match video.duration_seconds {
        Some(d) if d > 0.0 => d,
        _ => transcript.segments.last().map(|s| s.end).unwrap_or(0.0),
    };

    VideoRepo::transition(
        &ctx.pool,
        &job.video_id,
        VideoStatus::Transcribing,
        VideoStatus::Analyzing,
    )
    .await?;

    let next = AnalyzeJob::new(
        &job.video_id,
        &job.user_id,
        job.strategy,
        AnalyzeInput {
            full_text,
            token_count,
            plan: job.plan,
            video_duration_seconds: video_duration,
        },
    );
    match ctx.queue.enqueue(&next).await {
        Ok(_) => {}
        Err(QueueError::EnqueueFailed(msg)) => {
            warn!(video_id = %job.video_id, msg, "analyze already queued");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
