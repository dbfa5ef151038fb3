//! Repository for the `videos` table.

use sqlx::PgPool;

use klip_models::VideoStatus;

use crate::error::{DbError, DbResult};
use crate::models::{NewVideo, VideoRow};

/// Column list for `videos` queries.
const COLUMNS: &str = "\
    id, user_id, source_type, source_url, file_path, duration_seconds, \
    status, error_message, created_at, updated_at";

pub struct VideoRepo;

impl VideoRepo {
    pub async fn create(pool: &PgPool, input: &NewVideo) -> DbResult<VideoRow> {
        let query = format!(
            "INSERT INTO videos (id, user_id, source_type, source_url, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, VideoRow>(&query)
            .bind(&input.id)
            .bind(&input.user_id)
            .bind(&input.source_type)
            .bind(&input.source_url)
            .bind(input.status.as_str())
            .fetch_one(pool)
            .await?;
        Ok(row)
    }

    pub async fn find(pool: &PgPool, video_id: &str) -> DbResult<Option<VideoRow>> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id = $1");
        let row = sqlx::query_as::<_, VideoRow>(&query)
            .bind(video_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, video_id: &str) -> DbResult<VideoRow> {
        Self::find(pool, video_id)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "video",
                id: video_id.to_string(),
            })
    }

    /// Guarded status transition: the update only lands when the stored
    /// status still equals `from`, so concurrent workers cannot move a
    /// video backwards or double-advance it.
    pub async fn transition(
        pool: &PgPool,
        video_id: &str,
        from: VideoStatus,
        to: VideoStatus,
    ) -> DbResult<()> {
        if !from.can_transition_to(to) {
            return Err(DbError::IllegalTransition {
                entity: "video",
                id: video_id.to_string(),
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let result = sqlx::query(
            "UPDATE videos SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(video_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleStatus {
                entity: "video",
                id: video_id.to_string(),
                expected: from.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Record the downloaded source file and probed duration.
    pub async fn set_source(
        pool: &PgPool,
        video_id: &str,
        file_path: &str,
        duration_seconds: f64,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE videos SET file_path = $2, duration_seconds = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(video_id)
        .bind(file_path)
        .bind(duration_seconds)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Jump to failed from any non-terminal status. Idempotent: a video
    /// already completed or failed is left alone.
    pub async fn mark_failed(pool: &PgPool, video_id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE videos SET status = 'failed', error_message = $2, updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(video_id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}
