//! Call Orchestrator: API-facing call creation, scheduling, and listing.
//!
//! All handlers validate first and touch storage before the provider, so a
//! rejected request leaves no partial writes. A provider failure after the
//! lead is durable still produces a Call record marked failed — a requested
//! call attempt is never silently dropped.

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::WithRejection;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    BatchCallRequest, BatchCallResponse, BatchLeadInput, CallDetails, CallMetadata,
    CreateCallRequest, CreateCallResponse, GetCallsResponse, Lead, ScheduleCallRequest,
    ScheduleCallResponse,
};
use crate::server::auth::AuthUser;
use crate::server::error::ApiError;
use crate::server::queue::{minutes_to_ms, CallJobData};
use crate::server::retell::{BatchCallTask, CreatePhoneCallRequest};
use crate::server::{db, AppState};

/// Minimum credit balance (minutes) required to place a single call.
pub const MIN_CALL_CREDITS: f64 = 5.0;
/// Approximate per-lead cost (minutes) used for the batch-call credit check.
pub const BATCH_PER_LEAD_CREDITS: f64 = 4.0;

pub fn has_call_credits(credits: f64) -> bool {
    credits > MIN_CALL_CREDITS
}

pub fn has_batch_credits(credits: f64, lead_count: usize) -> bool {
    credits > lead_count as f64 * BATCH_PER_LEAD_CREDITS
}

/// Provider-side template variables for one call.
pub fn dynamic_variables(
    name: &str,
    email: &str,
    ph_no: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let mut vars = serde_json::Map::new();
    vars.insert("name".to_string(), serde_json::Value::String(name.to_string()));
    vars.insert("email".to_string(), serde_json::Value::String(email.to_string()));
    vars.insert(
        "phone_number".to_string(),
        serde_json::Value::String(ph_no.to_string()),
    );
    vars
}

/// `POST /call/createCall`
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateCallRequest>,
) -> Result<Json<CreateCallResponse>, ApiError> {
    let ph_no = match req.ph_no.as_deref() {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => return Err(ApiError::Validation("Phone number is required".to_string())),
    };
    if !has_call_credits(user.credits) {
        return Err(ApiError::InsufficientCredits);
    }

    let name = req.name.unwrap_or_default();
    let email = req.email.unwrap_or_default();

    // Lead persistence failure aborts before any provider call.
    let (lead, created) = db::leads::find_or_create(
        &state.db,
        &name,
        &ph_no,
        (!email.is_empty()).then_some(email.as_str()),
        user.id,
    )
    .await?;
    if created {
        tracing::info!("New lead created for {}", ph_no);
        state.cache.invalidate_user_leads(user.id).await;
    } else {
        tracing::info!("Lead found for {}", ph_no);
    }

    let params = CreatePhoneCallRequest {
        from_number: state.from_number.clone(),
        to_number: ph_no.clone(),
        override_agent_id: state.agent_id.clone(),
        retell_llm_dynamic_variables: dynamic_variables(&name, &email, &ph_no),
        metadata: CallMetadata {
            lead_id: Some(lead.id),
            user_id: Some(user.id),
            is_batch_call_record: false,
        },
    };

    let phone_call = match state.retell.create_phone_call(&params).await {
        Ok(phone_call) => phone_call,
        Err(e) => {
            tracing::error!("Retell call placement failed: {}", e);
            // Record the failed attempt before reporting the provider error.
            db::calls::create(
                &state.db,
                None,
                "failed",
                &state.from_number,
                &ph_no,
                Some(lead.id),
                Some(user.id),
            )
            .await?;
            state.cache.invalidate_lead_calls(lead.id).await;
            return Err(e.into());
        }
    };

    let call = db::calls::create(
        &state.db,
        Some(&phone_call.call_id),
        &phone_call.call_status,
        &state.from_number,
        &ph_no,
        Some(lead.id),
        Some(user.id),
    )
    .await?;
    state.cache.invalidate_lead_calls(lead.id).await;

    Ok(Json(CreateCallResponse {
        message: format!("Call created successfully callId : {}", call.id),
        phone_call: serde_json::to_value(&phone_call).unwrap_or_default(),
    }))
}

/// `POST /call/scheduleCall`
pub async fn schedule_call(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ScheduleCallRequest>,
) -> Result<Json<ScheduleCallResponse>, ApiError> {
    let ph_no = match req.ph_no.as_deref() {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => return Err(ApiError::Validation("Phone number is required".to_string())),
    };
    let delay = req
        .delay
        .ok_or_else(|| ApiError::Validation("Delay is required".to_string()))?;
    if delay < 1 {
        return Err(ApiError::Validation(
            "Delay must be at least 1 minute".to_string(),
        ));
    }
    if !has_call_credits(user.credits) {
        return Err(ApiError::InsufficientCredits);
    }

    let name = req.name.unwrap_or_default();
    let email = req.email.unwrap_or_default();

    let (lead, created) = db::leads::find_or_create(
        &state.db,
        &name,
        &ph_no,
        (!email.is_empty()).then_some(email.as_str()),
        user.id,
    )
    .await?;
    if created {
        state.cache.invalidate_user_leads(user.id).await;
    }

    // No Call record yet; it appears when the job fires or the provider
    // reports the call back through the webhook.
    let delay_ms = minutes_to_ms(delay);
    let job_id = state
        .queue
        .enqueue(
            CallJobData {
                metadata: CallMetadata {
                    lead_id: Some(lead.id),
                    user_id: Some(user.id),
                    is_batch_call_record: false,
                },
                from_number: state.from_number.clone(),
                agent_id: state.agent_id.clone(),
                dynamic_variables: dynamic_variables(&name, &email, &ph_no),
            },
            delay_ms,
        )
        .await?;

    tracing::info!("Scheduled call job {} with delay {}ms", job_id, delay_ms);

    Ok(Json(ScheduleCallResponse {
        message: "Call scheduled successfully".to_string(),
        job_id,
        delay_in_ms: delay_ms,
    }))
}

/// `GET /call/getCalls/:leadId`
pub async fn get_calls(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    WithRejection(Path(lead_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<GetCallsResponse>, ApiError> {
    if let Some(calls) = state.cache.get_lead_calls(lead_id).await {
        return Ok(Json(GetCallsResponse {
            message: "Calls fetched successfully".to_string(),
            calls_of_the_lead: calls,
        }));
    }

    db::leads::get_by_id(&state.db, lead_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Lead not found".to_string()))?;

    let calls = db::calls::get_by_lead(&state.db, lead_id).await?;
    let details: Vec<CallDetails> = calls.iter().map(CallDetails::from).collect();
    state.cache.put_lead_calls(lead_id, &details).await;

    Ok(Json(GetCallsResponse {
        message: "Calls fetched successfully".to_string(),
        calls_of_the_lead: details,
    }))
}

/// Split a batch request into brand-new leads and email backfills against
/// the caller's existing leads. Inputs without a phone number are dropped;
/// duplicates within one request keep the first occurrence.
#[derive(Debug, Default, PartialEq)]
pub struct BatchPartition {
    /// (name, ph_no, email) triples to bulk-insert.
    pub new_leads: Vec<(String, String, Option<String>)>,
    /// (ph_no, email) pairs for existing leads with a blank email.
    pub email_backfills: Vec<(String, String)>,
}

pub fn partition_batch(inputs: &[BatchLeadInput], existing: &[Lead]) -> BatchPartition {
    let existing_by_ph_no: HashMap<&str, &Lead> =
        existing.iter().map(|l| (l.ph_no.as_str(), l)).collect();

    let mut partition = BatchPartition::default();
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for input in inputs {
        let Some(ph_no) = input.ph_no.as_deref().filter(|p| !p.trim().is_empty()) else {
            continue;
        };
        if !seen.insert(ph_no) {
            continue;
        }
        let email = input
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(str::to_string);

        match existing_by_ph_no.get(ph_no) {
            Some(lead) => {
                let blank = lead.email.as_deref().unwrap_or("").is_empty();
                if blank {
                    if let Some(email) = email {
                        partition.email_backfills.push((ph_no.to_string(), email));
                    }
                }
            }
            None => {
                let name = input.name.clone().unwrap_or_default();
                partition.new_leads.push((name, ph_no.to_string(), email));
            }
        }
    }
    partition
}

/// `POST /call/batchCall`
pub async fn batch_call(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<BatchCallRequest>,
) -> Result<Json<BatchCallResponse>, ApiError> {
    let inputs = match req.leads {
        Some(leads) if !leads.is_empty() => leads,
        _ => return Err(ApiError::Validation("Leads array is required".to_string())),
    };
    if !has_batch_credits(user.credits, inputs.len()) {
        return Err(ApiError::InsufficientCredits);
    }

    let ph_nos: Vec<String> = inputs
        .iter()
        .filter_map(|l| l.ph_no.clone())
        .filter(|p| !p.trim().is_empty())
        .collect();

    let existing = db::leads::get_by_user_and_ph_nos(&state.db, user.id, &ph_nos).await?;
    let partition = partition_batch(&inputs, &existing);

    // Lead persistence phase; any failure here aborts before the provider.
    let mut leads_by_ph_no: HashMap<String, i64> = existing
        .iter()
        .map(|l| (l.ph_no.clone(), l.id))
        .collect();

    if !partition.new_leads.is_empty() {
        let names: Vec<String> = partition.new_leads.iter().map(|l| l.0.clone()).collect();
        let numbers: Vec<String> = partition.new_leads.iter().map(|l| l.1.clone()).collect();
        let emails: Vec<Option<String>> =
            partition.new_leads.iter().map(|l| l.2.clone()).collect();

        let inserted =
            db::leads::insert_many(&state.db, user.id, &names, &numbers, &emails).await?;
        if !inserted.is_empty() {
            state.cache.invalidate_user_leads(user.id).await;
        }
        for lead in inserted {
            leads_by_ph_no.insert(lead.ph_no.clone(), lead.id);
        }
    }

    if !partition.email_backfills.is_empty() {
        let numbers: Vec<String> =
            partition.email_backfills.iter().map(|b| b.0.clone()).collect();
        let emails: Vec<String> =
            partition.email_backfills.iter().map(|b| b.1.clone()).collect();

        let changed = db::leads::backfill_emails(&state.db, user.id, &numbers, &emails).await?;
        if changed > 0 {
            state.cache.invalidate_user_leads(user.id).await;
        }
    }

    let tasks: Vec<BatchCallTask> = inputs
        .iter()
        .filter(|input| input.is_dialable())
        .filter_map(|input| {
            let ph_no = input.ph_no.as_deref()?;
            let lead_id = leads_by_ph_no.get(ph_no).copied();
            Some(BatchCallTask {
                to_number: ph_no.to_string(),
                retell_llm_dynamic_variables: dynamic_variables(
                    input.name.as_deref().unwrap_or_default(),
                    input.email.as_deref().unwrap_or_default(),
                    ph_no,
                ),
                metadata: CallMetadata {
                    lead_id,
                    user_id: Some(user.id),
                    is_batch_call_record: true,
                },
            })
        })
        .collect();

    // Leads are durable at this point regardless of the provider outcome.
    let batch = state
        .retell
        .create_batch_call(&crate::server::retell::CreateBatchCallRequest {
            from_number: state.from_number.clone(),
            tasks,
        })
        .await?;

    let processed = ph_nos.len();
    Ok(Json(BatchCallResponse {
        status: "success".to_string(),
        message: format!("Batch call created for {} leads", processed),
        data: serde_json::json!({
            "batchCall": batch,
            "leadsProcessed": processed,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: i64, ph_no: &str, email: Option<&str>) -> Lead {
        Lead {
            id,
            name: "Existing".to_string(),
            ph_no: ph_no.to_string(),
            email: email.map(str::to_string),
            user_id: 1,
            created_at: None,
        }
    }

    fn input(name: &str, ph_no: &str, email: &str) -> BatchLeadInput {
        BatchLeadInput {
            name: Some(name.to_string()),
            ph_no: Some(ph_no.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
        }
    }

    #[test]
    fn single_call_requires_more_than_five_credits() {
        assert!(!has_call_credits(0.0));
        assert!(!has_call_credits(5.0));
        assert!(has_call_credits(5.1));
        assert!(has_call_credits(10.0));
    }

    #[test]
    fn batch_requires_four_credits_per_lead() {
        assert!(has_batch_credits(9.0, 2));
        assert!(!has_batch_credits(8.0, 2));
        assert!(!has_batch_credits(3.9, 1));
    }

    #[test]
    fn dynamic_variables_carry_contact_fields() {
        let vars = dynamic_variables("Ann", "ann@example.com", "+1555");
        assert_eq!(vars["name"], "Ann");
        assert_eq!(vars["email"], "ann@example.com");
        assert_eq!(vars["phone_number"], "+1555");
    }

    #[test]
    fn partition_separates_new_from_existing() {
        let existing = vec![lead(1, "+1001", Some("a@x.com"))];
        let inputs = vec![input("A", "+1001", ""), input("B", "+1002", "b@x.com")];

        let partition = partition_batch(&inputs, &existing);
        assert_eq!(
            partition.new_leads,
            vec![("B".to_string(), "+1002".to_string(), Some("b@x.com".to_string()))]
        );
        assert!(partition.email_backfills.is_empty());
    }

    #[test]
    fn partition_backfills_blank_emails_only() {
        let existing = vec![
            lead(1, "+1001", None),
            lead(2, "+1002", Some("kept@x.com")),
            lead(3, "+1003", Some("")),
        ];
        let inputs = vec![
            input("A", "+1001", "new@x.com"),
            input("B", "+1002", "ignored@x.com"),
            input("C", "+1003", "filled@x.com"),
        ];

        let partition = partition_batch(&inputs, &existing);
        assert!(partition.new_leads.is_empty());
        assert_eq!(
            partition.email_backfills,
            vec![
                ("+1001".to_string(), "new@x.com".to_string()),
                ("+1003".to_string(), "filled@x.com".to_string()),
            ]
        );
    }

    #[test]
    fn partition_skips_blank_numbers_and_duplicates() {
        let inputs = vec![
            BatchLeadInput {
                name: Some("NoPhone".to_string()),
                ph_no: None,
                email: None,
            },
            input("Blank", "  ", ""),
            input("First", "+1001", ""),
            input("Dup", "+1001", ""),
        ];

        let partition = partition_batch(&inputs, &[]);
        assert_eq!(partition.new_leads.len(), 1);
        assert_eq!(partition.new_leads[0].0, "First");
    }
}
