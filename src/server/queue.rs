//! Durable delayed-call queue on Redis.
//!
//! Jobs live in a sorted set scored by their fire time (epoch millis); ids
//! come from a Redis counter. A consumer claims a due job by removing it from
//! the set — whichever process wins the ZREM owns the job, so each job is
//! consumed exactly once and disappears from the queue on claim. There is no
//! retry policy: a job that fails in the handler is gone.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CallMetadata;

const SCHEDULED_KEY: &str = "call-queue:scheduled";
const SEQ_KEY: &str = "call-queue:seq";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub fn minutes_to_ms(delay_minutes: i64) -> i64 {
    delay_minutes * 60_000
}

/// Payload of one "place this call later" job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallJobData {
    pub metadata: CallMetadata,
    pub from_number: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "dynamicVariables")]
    pub dynamic_variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCallJob {
    pub id: i64,
    #[serde(flatten)]
    pub data: CallJobData,
}

#[derive(Clone)]
pub struct CallQueue {
    redis: ConnectionManager,
}

impl CallQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Enqueue a delayed call job; returns the queue-assigned job id.
    pub async fn enqueue(&self, data: CallJobData, delay_ms: i64) -> Result<i64, QueueError> {
        let mut con = self.redis.clone();
        let id: i64 = con.incr(SEQ_KEY, 1).await?;

        let job = ScheduledCallJob { id, data };
        let payload = serde_json::to_string(&job)?;
        let fire_at = chrono::Utc::now().timestamp_millis() + delay_ms;

        con.zadd::<_, _, _, ()>(SCHEDULED_KEY, payload, fire_at).await?;
        Ok(id)
    }

    /// Claim the next job whose fire time has passed, if any.
    ///
    /// The job is removed from the queue as part of the claim; a concurrent
    /// consumer that loses the ZREM moves on to the next candidate.
    pub async fn claim_due(&self) -> Result<Option<ScheduledCallJob>, QueueError> {
        let mut con = self.redis.clone();
        let now = chrono::Utc::now().timestamp_millis();

        let candidates: Vec<String> = con
            .zrangebyscore_limit(SCHEDULED_KEY, "-inf", now, 0, 5)
            .await?;

        for payload in candidates {
            let removed: i64 = con.zrem(SCHEDULED_KEY, &payload).await?;
            if removed == 0 {
                continue; // another consumer won this one
            }
            match serde_json::from_str(&payload) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => {
                    // Already removed; drop it rather than poison the queue.
                    tracing::error!("Discarding unparsable job payload: {}", e);
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delay_is_minutes_times_sixty_thousand() {
        assert_eq!(minutes_to_ms(1), 60_000);
        assert_eq!(minutes_to_ms(5), 300_000);
        assert_eq!(minutes_to_ms(10), 600_000);
    }

    #[test]
    fn job_wire_format_matches_worker_contract() {
        let mut vars = serde_json::Map::new();
        vars.insert("phone_number".to_string(), json!("+15551234"));
        vars.insert("name".to_string(), json!("Ann"));

        let job = ScheduledCallJob {
            id: 12,
            data: CallJobData {
                metadata: CallMetadata {
                    lead_id: Some(7),
                    user_id: Some(3),
                    is_batch_call_record: false,
                },
                from_number: "+15550000".to_string(),
                agent_id: "agent_x".to_string(),
                dynamic_variables: vars,
            },
        };

        let wire = serde_json::to_value(&job).unwrap();
        assert_eq!(wire["id"], 12);
        assert_eq!(wire["from_number"], "+15550000");
        assert_eq!(wire["agentId"], "agent_x");
        assert_eq!(wire["dynamicVariables"]["phone_number"], "+15551234");
        assert_eq!(wire["metadata"]["leadId"], 7);
        assert_eq!(wire["metadata"]["isBatchCallRecord"], false);

        let back: ScheduledCallJob = serde_json::from_value(wire).unwrap();
        assert_eq!(back.id, 12);
        assert_eq!(back.data.metadata.user_id, Some(3));
    }
}
