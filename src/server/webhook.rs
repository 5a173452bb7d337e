//! Webhook Ingestor: reconciles Call state from provider lifecycle events.
//!
//! The provider retries webhooks on non-2xx responses, so only genuinely
//! malformed payloads are rejected (the provider will never send them
//! correctly); internal storage hiccups after the point of acknowledgment are
//! logged and swallowed.

use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::models::{WebhookCall, WebhookEnvelope, WebhookEvent};
use crate::server::error::ApiError;
use crate::server::queue::CallJobData;
use crate::server::{db, AppState};

/// Minutes of credit consumed by a call of the given duration.
pub fn minutes_consumed(duration_ms: i64) -> f64 {
    duration_ms as f64 / 60_000.0
}

/// Lead whose cached call list a terminal write has staled.
///
/// Creation and update both change what `getCalls` serves, so any committed
/// write drops the entry; only a failed write leaves the cache alone.
pub fn staled_lead_calls(write_ok: bool, lead_id: Option<i64>) -> Option<i64> {
    if write_ok {
        lead_id
    } else {
        None
    }
}

/// `POST /webhook/`
pub async fn handle_retell_webhook(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!("Received Retell webhook: {:?}", envelope.event);
    let call = envelope.call.unwrap_or_default();

    match envelope.event {
        WebhookEvent::CallStarted => handle_call_started(&state, call).await,
        WebhookEvent::CallAnalyzed => handle_call_analyzed(&state, call).await,
        WebhookEvent::CallEnded | WebhookEvent::Other => {
            Ok(Json(json!({ "message": "Event ignored" })))
        }
    }
}

/// A `call_started` for a batch call is the first time we hear about that
/// call, so a record is created. Every other start event is a no-op.
async fn handle_call_started(
    state: &AppState,
    call: WebhookCall,
) -> Result<Json<serde_json::Value>, ApiError> {
    let metadata = call.metadata.clone().unwrap_or_default();
    let Some(call_id) = call.call_id.as_deref() else {
        return Ok(Json(json!({ "message": "Event ignored" })));
    };
    if !metadata.is_batch_call_record {
        return Ok(Json(json!({ "message": "Event ignored" })));
    }

    match db::calls::get_by_call_id(&state.db, call_id).await {
        Ok(Some(_)) => return Ok(Json(json!({ "message": "Event ignored" }))),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Database error finding call record: {}", e);
            return Ok(Json(json!({ "message": "Event ignored" })));
        }
    }

    let status = call.call_status.as_deref().unwrap_or("registered");
    let created = db::calls::create(
        &state.db,
        Some(call_id),
        status,
        call.from_number.as_deref().unwrap_or_default(),
        call.to_number.as_deref().unwrap_or_default(),
        metadata.lead_id,
        metadata.user_id,
    )
    .await;

    match created {
        Ok(_) => {
            if let Some(lead_id) = metadata.lead_id {
                state.cache.invalidate_lead_calls(lead_id).await;
            }
            Ok(Json(json!({ "message": "Call record created" })))
        }
        Err(e) => {
            // Acknowledge anyway; a provider retry cannot fix our storage.
            tracing::error!("Failed to create call record for {}: {}", call_id, e);
            Ok(Json(json!({ "message": "Event ignored" })))
        }
    }
}

async fn handle_call_analyzed(
    state: &AppState,
    call: WebhookCall,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (Some(call_id), Some(analysis)) = (call.call_id.clone(), call.call_analysis.clone())
    else {
        return Err(ApiError::InvalidWebhookPayload);
    };
    let metadata = call.metadata.clone().unwrap_or_default();

    // Debit consumed minutes before anything else, whenever the event names
    // a user. The decrement is a single atomic UPDATE.
    if let Some(user_id) = metadata.user_id {
        if let Some(duration_ms) = call.duration_ms {
            let minutes = minutes_consumed(duration_ms);
            match db::users::debit_minutes(&state.db, user_id, minutes).await {
                Ok(true) => {
                    tracing::info!("Debited {:.2} minutes from user {}", minutes, user_id)
                }
                Ok(false) => tracing::warn!("Credit debit skipped, no user {}", user_id),
                Err(e) => tracing::error!("Credit debit failed for user {}: {}", user_id, e),
            }
        }
    }

    if analysis.needs_scheduling() {
        let delay = analysis
            .schedule_delay_minutes()
            .ok_or(ApiError::InvalidWebhookPayload)?;
        let delay_ms = crate::server::queue::minutes_to_ms(delay);

        let job_id = state
            .queue
            .enqueue(
                CallJobData {
                    metadata,
                    from_number: call.from_number.clone().unwrap_or_default(),
                    agent_id: call
                        .agent_id
                        .clone()
                        .unwrap_or_else(|| state.agent_id.clone()),
                    dynamic_variables: call.retell_llm_dynamic_variables.clone().unwrap_or_default(),
                },
                delay_ms,
            )
            .await?;

        tracing::info!("Follow-up call scheduled as job {} ({}ms)", job_id, delay_ms);
        // The call is a precursor to the follow-up; its terminal fields are
        // left untouched in this branch.
        return Ok(Json(json!({
            "message": "Call scheduled successfully",
            "delay": delay,
            "jobId": job_id,
        })));
    }

    let existing = db::calls::get_by_call_id(&state.db, &call_id).await?;
    let lead_id = existing
        .as_ref()
        .and_then(|c| c.lead_id)
        .or(metadata.lead_id);
    let user_id = existing
        .as_ref()
        .and_then(|c| c.user_id)
        .or(metadata.user_id);
    let status = call.call_status.clone().unwrap_or_else(|| "ended".to_string());

    let upserted = db::calls::upsert_analyzed(
        &state.db,
        &call_id,
        &status,
        &analysis.to_value(),
        call.transcript.as_deref(),
        call.recording_url.as_deref(),
        call.duration_ms,
        call.from_number.as_deref(),
        call.to_number.as_deref(),
        lead_id,
        user_id,
    )
    .await;

    let write_ok = match upserted {
        Ok(_) => true,
        Err(e) => {
            // Already past the point of acknowledgment; retrying the webhook
            // cannot fix our storage, so log and accept.
            tracing::error!("Database error saving call record {}: {}", call_id, e);
            false
        }
    };
    if let Some(lead_id) = staled_lead_calls(write_ok, lead_id) {
        state.cache.invalidate_lead_calls(lead_id).await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Webhook processed successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_scale_from_duration() {
        assert_eq!(minutes_consumed(60_000), 1.0);
        assert_eq!(minutes_consumed(90_000), 1.5);
        assert_eq!(minutes_consumed(0), 0.0);
        assert!((minutes_consumed(61_500) - 1.025).abs() < 1e-9);
    }

    #[test]
    fn terminal_update_stales_the_lead_call_cache() {
        // Updating an already-recorded call drops the cached list the same
        // as creating one; a getCalls after the write must not serve the
        // pre-write row.
        assert_eq!(staled_lead_calls(true, Some(7)), Some(7));
    }

    #[test]
    fn failed_or_ownerless_terminal_writes_leave_the_cache() {
        assert_eq!(staled_lead_calls(false, Some(7)), None);
        assert_eq!(staled_lead_calls(true, None), None);
    }
}
