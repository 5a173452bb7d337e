//! Job Consumer: places the deferred calls queued by the orchestrator and
//! the webhook ingestor.
//!
//! A single long-lived process polls the delayed queue and dials each due job
//! through the provider, with at most 5 calls in flight. Jobs are claimed
//! (and thereby removed) before processing; a provider failure is logged and
//! the job is gone — the provider's own webhook remains the source of truth
//! for whatever actually happened on the line.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

use crate::server::queue::{CallQueue, ScheduledCallJob};
use crate::server::retell::{CreatePhoneCallRequest, RetellClient, RetellError};

const WORKER_CONCURRENCY: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Destination number embedded in the job's dynamic variables.
pub fn destination_number(
    dynamic_variables: &serde_json::Map<String, serde_json::Value>,
) -> Option<String> {
    dynamic_variables
        .get("phone_number")
        .and_then(|v| v.as_str())
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
}

/// Tag the dynamic variables so the agent knows this is a follow-up call.
pub fn mark_follow_back(dynamic_variables: &mut serde_json::Map<String, serde_json::Value>) {
    dynamic_variables.insert(
        "followBackCall".to_string(),
        serde_json::Value::String("true".to_string()),
    );
}

pub struct JobConsumer {
    queue: CallQueue,
    retell: RetellClient,
}

impl JobConsumer {
    pub fn new(queue: CallQueue, retell: RetellClient) -> Self {
        Self { queue, retell }
    }

    /// Poll loop; runs until ctrl-c, finishing in-flight jobs on shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let semaphore = Arc::new(Semaphore::new(WORKER_CONCURRENCY));
        let mut ticker = interval(POLL_INTERVAL);

        tracing::info!(
            "Call worker started, concurrency {}",
            WORKER_CONCURRENCY
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received kill signal, shutting down gracefully");
                    break;
                }
            }

            loop {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                };

                let job = match self.queue.claim_due().await {
                    Ok(Some(job)) => job,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to poll job queue: {}", e);
                        break;
                    }
                };

                let retell = self.retell.clone();
                tokio::spawn(async move {
                    let job_id = job.id;
                    if let Err(e) = process_job(&retell, job).await {
                        tracing::error!("Job {} failed: {}", job_id, e);
                    }
                    drop(permit);
                });
            }
        }

        // Wait for in-flight jobs before exiting.
        let _ = semaphore.acquire_many(WORKER_CONCURRENCY as u32).await;
        tracing::info!("Call worker stopped");
        Ok(())
    }
}

/// Place one deferred call.
pub async fn process_job(retell: &RetellClient, job: ScheduledCallJob) -> Result<(), RetellError> {
    tracing::info!("Processing job {}", job.id);
    let mut data = job.data;

    let Some(to_number) = destination_number(&data.dynamic_variables) else {
        tracing::error!("Job {} has no destination phone number, dropping", job.id);
        return Ok(());
    };
    mark_follow_back(&mut data.dynamic_variables);

    let phone_call = retell
        .create_phone_call(&CreatePhoneCallRequest {
            from_number: data.from_number,
            to_number,
            override_agent_id: data.agent_id,
            retell_llm_dynamic_variables: data.dynamic_variables,
            metadata: data.metadata,
        })
        .await?;

    tracing::info!(
        "Deferred call placed: {} ({})",
        phone_call.call_id,
        phone_call.call_status
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(entries: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn destination_comes_from_phone_number_variable() {
        let map = vars(&[("phone_number", json!("+15551234")), ("name", json!("Ann"))]);
        assert_eq!(destination_number(&map), Some("+15551234".to_string()));
    }

    #[test]
    fn missing_or_blank_destination_is_none() {
        assert_eq!(destination_number(&vars(&[])), None);
        assert_eq!(
            destination_number(&vars(&[("phone_number", json!(""))])),
            None
        );
        assert_eq!(
            destination_number(&vars(&[("phone_number", json!(1555))])),
            None
        );
    }

    #[test]
    fn follow_back_flag_is_the_string_true() {
        let mut map = vars(&[("phone_number", json!("+1555"))]);
        mark_follow_back(&mut map);
        assert_eq!(map["followBackCall"], json!("true"));
    }
}
