//! Repository for the `usage_records` table (LLM spend accounting).

use sqlx::PgPool;

use crate::error::DbResult;
use crate::models::NewUsageRecord;

pub struct UsageRepo;

impl UsageRepo {
    pub async fn record(pool: &PgPool, input: &NewUsageRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO usage_records (user_id, video_id, task, model, tier, \
                                        input_tokens, output_tokens, cost_kopecks, byok) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&input.user_id)
        .bind(&input.video_id)
        .bind(&input.task)
        .bind(&input.model)
        .bind(&input.tier)
        .bind(input.input_tokens)
        .bind(input.output_tokens)
        .bind(input.cost_kopecks)
        .bind(input.byok)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Platform-paid spend for one video, in kopecks.
    pub async fn video_cost(pool: &PgPool, video_id: &str) -> DbResult<i64> {
        let (total,): (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(cost_kopecks) FROM usage_records WHERE video_id = $1 AND NOT byok",
        )
        .bind(video_id)
        .fetch_one(pool)
        .await?;
        Ok(total.unwrap_or(0))
    }
}
