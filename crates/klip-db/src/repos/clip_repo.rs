//! Repository for the `clips` table.

use sqlx::{PgPool, Postgres, Transaction};

use klip_models::{ClipStatus, VideoStatus};

use crate::error::{DbError, DbResult};
use crate::models::{ClipRow, NewClip};

const COLUMNS: &str = "\
    id, video_id, user_id, title, start_time, end_time, format, status, \
    virality, cta, subtitle_segments, watermark, file_path, thumbnail_path, \
    error_message, created_at, updated_at";

pub struct ClipRepo;

impl ClipRepo {
    /// Create the video's clips in one transaction, gated on the video
    /// still being in `analyzing`. The same transaction advances the
    /// video to `generating_clips`, so a concurrent duplicate analyze
    /// run can never double-insert.
    pub async fn create_batch(
        pool: &PgPool,
        video_id: &str,
        user_id: &str,
        clips: &[NewClip],
    ) -> DbResult<Vec<ClipRow>> {
        let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM videos WHERE id = $1 FOR UPDATE")
                .bind(video_id)
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or_else(|| DbError::NotFound {
            entity: "video",
            id: video_id.to_string(),
        })?;
        if VideoStatus::parse(&status.0) != VideoStatus::Analyzing {
            return Err(DbError::StaleStatus {
                entity: "video",
                id: video_id.to_string(),
                expected: VideoStatus::Analyzing.as_str().to_string(),
            });
        }

        let query = format!(
            "INSERT INTO clips (id, video_id, user_id, title, start_time, end_time, \
                                format, status, virality, cta, subtitle_segments, watermark) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        let mut rows = Vec::with_capacity(clips.len());
        for clip in clips {
            let cta = match &clip.cta {
                Some(cta) => Some(serde_json::to_value(cta)?),
                None => None,
            };
            let row = sqlx::query_as::<_, ClipRow>(&query)
                .bind(&clip.id)
                .bind(video_id)
                .bind(user_id)
                .bind(&clip.title)
                .bind(clip.start_time)
                .bind(clip.end_time)
                .bind(clip.format.as_str())
                .bind(ClipStatus::Pending.as_str())
                .bind(serde_json::to_value(&clip.virality)?)
                .bind(cta)
                .bind(serde_json::to_value(&clip.subtitle_segments)?)
                .bind(clip.watermark)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }

        sqlx::query(
            "UPDATE videos SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(video_id)
        .bind(VideoStatus::GeneratingClips.as_str())
        .bind(VideoStatus::Analyzing.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }

    pub async fn find(pool: &PgPool, clip_id: &str) -> DbResult<Option<ClipRow>> {
        let query = format!("SELECT {COLUMNS} FROM clips WHERE id = $1");
        let row = sqlx::query_as::<_, ClipRow>(&query)
            .bind(clip_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, clip_id: &str) -> DbResult<ClipRow> {
        Self::find(pool, clip_id)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "clip",
                id: clip_id.to_string(),
            })
    }

    pub async fn list_for_video(pool: &PgPool, video_id: &str) -> DbResult<Vec<ClipRow>> {
        let query =
            format!("SELECT {COLUMNS} FROM clips WHERE video_id = $1 ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, ClipRow>(&query)
            .bind(video_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Guarded clip status transition, same contract as the video one.
    pub async fn transition(
        pool: &PgPool,
        clip_id: &str,
        from: ClipStatus,
        to: ClipStatus,
    ) -> DbResult<()> {
        if !from.can_transition_to(to) {
            return Err(DbError::IllegalTransition {
                entity: "clip",
                id: clip_id.to_string(),
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let result = sqlx::query(
            "UPDATE clips SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(clip_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleStatus {
                entity: "clip",
                id: clip_id.to_string(),
                expected: from.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Commit a finished render: stored paths plus rendering → ready.
    pub async fn mark_ready(
        pool: &PgPool,
        clip_id: &str,
        file_path: &str,
        thumbnail_path: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE clips SET status = 'ready', file_path = $2, thumbnail_path = $3, \
                              updated_at = NOW() \
             WHERE id = $1 AND status = 'rendering'",
        )
        .bind(clip_id)
        .bind(file_path)
        .bind(thumbnail_path)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleStatus {
                entity: "clip",
                id: clip_id.to_string(),
                expected: ClipStatus::Rendering.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Jump to failed from any non-terminal status.
    pub async fn mark_failed(pool: &PgPool, clip_id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE clips SET status = 'failed', error_message = $2, updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('ready', 'failed')",
        )
        .bind(clip_id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Settle the owning video once its clips reach terminal states:
    /// completed iff all ready, failed iff all failed, otherwise the
    /// video stays in `generating_clips` (stable partial success).
    pub async fn settle_video(pool: &PgPool, video_id: &str) -> DbResult<VideoStatus> {
        let (total, ready, failed): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE status = 'ready'), \
                    COUNT(*) FILTER (WHERE status = 'failed') \
             FROM clips WHERE video_id = $1",
        )
        .bind(video_id)
        .fetch_one(pool)
        .await?;

        let target = if total > 0 && ready == total {
            VideoStatus::Completed
        } else if total > 0 && failed == total {
            VideoStatus::Failed
        } else {
            return Ok(VideoStatus::GeneratingClips);
        };

        // Another render worker may have settled the video already; a
        // zero-row update here is fine.
        sqlx::query(
            "UPDATE videos SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(video_id)
        .bind(target.as_str())
        .bind(VideoStatus::GeneratingClips.as_str())
        .execute(pool)
        .await?;

        Ok(target)
    }
}
