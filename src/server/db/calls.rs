//! Call database operations
//!
//! A unique constraint on the provider call id (NULLs exempt) keeps at most
//! one authoritative record per provider call; webhook writes go through
//! `upsert_analyzed` rather than plain inserts.

use sqlx::PgPool;
use crate::models::Call;

pub async fn get_by_call_id(pool: &PgPool, call_id: &str) -> Result<Option<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(
        r#"
        SELECT id, call_id, status, from_number, to_number, lead_id, user_id,
               analysis, transcript, recording_url, duration_ms, created_at
        FROM calls
        WHERE call_id = $1
        "#
    )
    .bind(call_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_lead(pool: &PgPool, lead_id: i64) -> Result<Vec<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(
        r#"
        SELECT id, call_id, status, from_number, to_number, lead_id, user_id,
               analysis, transcript, recording_url, duration_ms, created_at
        FROM calls
        WHERE lead_id = $1
        ORDER BY created_at DESC
        "#
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await
}

/// Persist a freshly placed (or failed-to-place) call attempt.
///
/// `call_id` is NULL when the provider invocation itself failed; the attempt
/// is still recorded.
pub async fn create(
    pool: &PgPool,
    call_id: Option<&str>,
    status: &str,
    from_number: &str,
    to_number: &str,
    lead_id: Option<i64>,
    user_id: Option<i64>,
) -> Result<Call, sqlx::Error> {
    sqlx::query_as::<_, Call>(
        r#"
        INSERT INTO calls (call_id, status, from_number, to_number, lead_id, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, call_id, status, from_number, to_number, lead_id, user_id,
                  analysis, transcript, recording_url, duration_ms, created_at
        "#
    )
    .bind(call_id)
    .bind(status)
    .bind(from_number)
    .bind(to_number)
    .bind(lead_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Apply terminal `call_analyzed` data, creating the record if the webhook
/// arrived before (or without) any locally placed call.
///
/// Replaying the same event twice leaves the row matching the latest payload.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_analyzed(
    pool: &PgPool,
    call_id: &str,
    status: &str,
    analysis: &serde_json::Value,
    transcript: Option<&str>,
    recording_url: Option<&str>,
    duration_ms: Option<i64>,
    from_number: Option<&str>,
    to_number: Option<&str>,
    lead_id: Option<i64>,
    user_id: Option<i64>,
) -> Result<Call, sqlx::Error> {
    sqlx::query_as::<_, Call>(
        r#"
        INSERT INTO calls (call_id, status, analysis, transcript, recording_url,
                           duration_ms, from_number, to_number, lead_id, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (call_id) DO UPDATE
        SET status = EXCLUDED.status,
            analysis = EXCLUDED.analysis,
            transcript = EXCLUDED.transcript,
            recording_url = EXCLUDED.recording_url,
            duration_ms = EXCLUDED.duration_ms,
            from_number = COALESCE(EXCLUDED.from_number, calls.from_number),
            to_number = COALESCE(EXCLUDED.to_number, calls.to_number)
        RETURNING id, call_id, status, from_number, to_number, lead_id, user_id,
                  analysis, transcript, recording_url, duration_ms, created_at
        "#
    )
    .bind(call_id)
    .bind(status)
    .bind(analysis)
    .bind(transcript)
    .bind(recording_url)
    .bind(duration_ms)
    .bind(from_number)
    .bind(to_number)
    .bind(lead_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}
