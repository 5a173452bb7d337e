//! Read-through TTL cache for list views, backed by Redis.
//!
//! Two derived views are cached: "leads of a user" and "calls of a lead".
//! Entries expire after one hour and are deleted eagerly on any write that
//! changes the underlying set. The cache is a pure performance layer; every
//! miss or malformed entry falls back to the store.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{CallDetails, Lead};

/// One hour, in milliseconds.
pub const LIST_TTL_MS: u64 = 3_600_000;

pub fn user_leads_key(user_id: i64) -> String {
    format!("LEAD:{user_id}")
}

pub fn lead_calls_key(lead_id: i64) -> String {
    format!("LEAD_CALL:{lead_id}")
}

/// Cached payloads are wrapped so the stored JSON is always an object.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Clone)]
pub struct ListCache {
    redis: ConnectionManager,
}

impl ListCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut con = self.redis.clone();
        let raw: Option<String> = match con.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) => Some(envelope.data),
            Err(e) => {
                tracing::warn!("Discarding malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), redis::RedisError> {
        let json = serde_json::to_string(&Envelope { data: value })
            .unwrap_or_else(|_| "{\"data\":null}".to_string());
        let mut con = self.redis.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(json)
            .arg("PX")
            .arg(LIST_TTL_MS)
            .query_async::<_, ()>(&mut con)
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut con = self.redis.clone();
        con.del::<_, i64>(key).await.map(|_| ())
    }

    pub async fn get_user_leads(&self, user_id: i64) -> Option<Vec<Lead>> {
        self.get_json(&user_leads_key(user_id)).await
    }

    pub async fn put_user_leads(&self, user_id: i64, leads: &[Lead]) {
        if let Err(e) = self.set_json(&user_leads_key(user_id), &leads).await {
            tracing::warn!("Failed to cache leads for user {}: {}", user_id, e);
        }
    }

    pub async fn invalidate_user_leads(&self, user_id: i64) {
        if let Err(e) = self.delete(&user_leads_key(user_id)).await {
            tracing::warn!("Failed to invalidate lead cache for user {}: {}", user_id, e);
        }
    }

    pub async fn get_lead_calls(&self, lead_id: i64) -> Option<Vec<CallDetails>> {
        self.get_json(&lead_calls_key(lead_id)).await
    }

    pub async fn put_lead_calls(&self, lead_id: i64, calls: &[CallDetails]) {
        if let Err(e) = self.set_json(&lead_calls_key(lead_id), &calls).await {
            tracing::warn!("Failed to cache calls for lead {}: {}", lead_id, e);
        }
    }

    pub async fn invalidate_lead_calls(&self, lead_id: i64) {
        if let Err(e) = self.delete(&lead_calls_key(lead_id)).await {
            tracing::warn!("Failed to invalidate call cache for lead {}: {}", lead_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_namespaced_by_id() {
        assert_eq!(user_leads_key(42), "LEAD:42");
        assert_eq!(lead_calls_key(7), "LEAD_CALL:7");
        assert_ne!(user_leads_key(1), lead_calls_key(1));
    }

    #[test]
    fn envelope_wraps_payload_under_data() {
        let json = serde_json::to_value(Envelope { data: vec![1, 2, 3] }).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }
}
