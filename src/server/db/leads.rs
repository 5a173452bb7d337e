//! Lead database operations
//!
//! Phone numbers are unique system-wide; concurrent creation for the same
//! number is resolved by treating the uniqueness violation as "lead already
//! exists" and re-fetching.

use sqlx::PgPool;
use crate::models::Lead;

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, name, ph_no, email, user_id, created_at
        FROM leads
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_ph_no(pool: &PgPool, ph_no: &str) -> Result<Option<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, name, ph_no, email, user_id, created_at
        FROM leads
        WHERE ph_no = $1
        "#
    )
    .bind(ph_no)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_user(pool: &PgPool, user_id: i64) -> Result<Vec<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, name, ph_no, email, user_id, created_at
        FROM leads
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Phone numbers among `ph_nos` that already exist as leads for this user.
pub async fn get_by_user_and_ph_nos(
    pool: &PgPool,
    user_id: i64,
    ph_nos: &[String],
) -> Result<Vec<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, name, ph_no, email, user_id, created_at
        FROM leads
        WHERE user_id = $1 AND ph_no = ANY($2)
        "#
    )
    .bind(user_id)
    .bind(ph_nos)
    .fetch_all(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    ph_no: &str,
    email: Option<&str>,
    user_id: i64,
) -> Result<Lead, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads (name, ph_no, email, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, ph_no, email, user_id, created_at
        "#
    )
    .bind(name)
    .bind(ph_no)
    .bind(email)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Find the lead for a phone number, creating it if unseen.
///
/// Returns the lead and whether it was created by this call. A losing racer
/// on the ph_no uniqueness constraint re-fetches instead of erroring.
pub async fn find_or_create(
    pool: &PgPool,
    name: &str,
    ph_no: &str,
    email: Option<&str>,
    user_id: i64,
) -> Result<(Lead, bool), sqlx::Error> {
    if let Some(lead) = get_by_ph_no(pool, ph_no).await? {
        return Ok((lead, false));
    }

    match create(pool, name, ph_no, email, user_id).await {
        Ok(lead) => Ok((lead, true)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let lead = get_by_ph_no(pool, ph_no)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            Ok((lead, false))
        }
        Err(e) => Err(e),
    }
}

/// Bulk-insert new leads for a batch call. Numbers that raced into existence
/// since the partition step are skipped.
pub async fn insert_many(
    pool: &PgPool,
    user_id: i64,
    names: &[String],
    ph_nos: &[String],
    emails: &[Option<String>],
) -> Result<Vec<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads (name, ph_no, email, user_id)
        SELECT t.name, t.ph_no, t.email, $4
        FROM UNNEST($1::text[], $2::text[], $3::text[]) AS t(name, ph_no, email)
        ON CONFLICT (ph_no) DO NOTHING
        RETURNING id, name, ph_no, email, user_id, created_at
        "#
    )
    .bind(names)
    .bind(ph_nos)
    .bind(emails)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Backfill missing emails on existing leads during batch import.
///
/// Only blank emails are overwritten; returns the number of rows changed.
pub async fn backfill_emails(
    pool: &PgPool,
    user_id: i64,
    ph_nos: &[String],
    emails: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET email = u.email
        FROM UNNEST($2::text[], $3::text[]) AS u(ph_no, email)
        WHERE leads.ph_no = u.ph_no
          AND leads.user_id = $1
          AND (leads.email IS NULL OR leads.email = '')
        "#
    )
    .bind(user_id)
    .bind(ph_nos)
    .bind(emails)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
