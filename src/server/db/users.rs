//! User database operations

use sqlx::PgPool;
use crate::models::User;

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, credits, total_mins_used, plan, created_at
        FROM users
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, credits, total_mins_used, plan, created_at
        FROM users
        WHERE email = $1
        "#
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, name, email, password_hash, credits, total_mins_used, plan, created_at
        "#
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}

/// Debit consumed call minutes from a user's balance.
///
/// Single conditional UPDATE so concurrent webhook deliveries for the same
/// user cannot lose a decrement through read-modify-write interleaving.
pub async fn debit_minutes(pool: &PgPool, id: i64, minutes: f64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET credits = credits - $2,
            total_mins_used = total_mins_used + $2
        WHERE id = $1
        "#
    )
    .bind(id)
    .bind(minutes)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
