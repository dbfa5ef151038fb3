//! Repository for the `transcripts` table (1:1 with videos).

use sqlx::PgPool;
use uuid::Uuid;

use klip_models::Transcript;

use crate::error::DbResult;
use crate::models::TranscriptRow;

const COLUMNS: &str =
    "id, video_id, segments, full_text, token_count, language, stt_model, created_at";

pub struct TranscriptRepo;

impl TranscriptRepo {
    /// Insert or replace the video's transcript. Re-running the
    /// transcribe stage overwrites rather than duplicating.
    pub async fn upsert(
        pool: &PgPool,
        video_id: &str,
        transcript: &Transcript,
    ) -> DbResult<TranscriptRow> {
        let segments = serde_json::to_value(&transcript.segments)?;
        let query = format!(
            "INSERT INTO transcripts (id, video_id, segments, full_text, token_count, language, stt_model) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (video_id) DO UPDATE SET \
                 segments = EXCLUDED.segments, \
                 full_text = EXCLUDED.full_text, \
                 token_count = EXCLUDED.token_count, \
                 language = EXCLUDED.language, \
                 stt_model = EXCLUDED.stt_model \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TranscriptRow>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(video_id)
            .bind(segments)
            .bind(&transcript.full_text)
            .bind(transcript.token_count as i32)
            .bind(&transcript.language)
            .bind(&transcript.stt_model)
            .fetch_one(pool)
            .await?;
        Ok(row)
    }

    pub async fn find_by_video(pool: &PgPool, video_id: &str) -> DbResult<Option<TranscriptRow>> {
        let query = format!("SELECT {COLUMNS} FROM transcripts WHERE video_id = $1");
        let row = sqlx::query_as::<_, TranscriptRow>(&query)
            .bind(video_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }
}
