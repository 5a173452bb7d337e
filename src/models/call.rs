use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One placed or scheduled call attempt, tied to a Lead.
///
/// `call_id` is the provider-assigned id. It is NULL for attempts where the
/// provider invocation itself failed; at most one record exists per non-null
/// provider call id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Call {
    pub id: i64,
    #[serde(rename = "callId")]
    pub call_id: Option<String>,
    pub status: String,
    #[serde(rename = "fromNumber")]
    pub from_number: Option<String>,
    #[serde(rename = "toNumber")]
    pub to_number: Option<String>,
    #[serde(rename = "leadId")]
    pub lead_id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub analysis: Option<serde_json::Value>,
    pub transcript: Option<String>,
    #[serde(rename = "recordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

pub const TRANSCRIPT_PLACEHOLDER: &str = "Transcript not available";
pub const RECORDING_PLACEHOLDER: &str = "Recording not available";
pub const ANALYSIS_PLACEHOLDER: &str = "Analysis not available";
pub const DURATION_MS_DEFAULT: i64 = 200;

/// Stable response projection of a Call for `GET /call/getCalls/:leadId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallDetails {
    #[serde(rename = "callDBId")]
    pub call_db_id: String,
    #[serde(rename = "callId")]
    pub call_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    pub status: String,
    pub analysis: serde_json::Value,
    pub transcript: String,
    #[serde(rename = "recordingUrl")]
    pub recording_url: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: i64,
    #[serde(rename = "fromNumber")]
    pub from_number: String,
    #[serde(rename = "toNumber")]
    pub to_number: String,
}

impl From<&Call> for CallDetails {
    fn from(call: &Call) -> Self {
        CallDetails {
            call_db_id: call.id.to_string(),
            call_id: call.call_id.clone().unwrap_or_default(),
            created_at: call.created_at,
            status: call.status.clone(),
            analysis: call
                .analysis
                .clone()
                .unwrap_or_else(|| serde_json::Value::String(ANALYSIS_PLACEHOLDER.to_string())),
            transcript: call
                .transcript
                .clone()
                .unwrap_or_else(|| TRANSCRIPT_PLACEHOLDER.to_string()),
            recording_url: call
                .recording_url
                .clone()
                .unwrap_or_else(|| RECORDING_PLACEHOLDER.to_string()),
            duration_ms: call.duration_ms.unwrap_or(DURATION_MS_DEFAULT),
            from_number: call.from_number.clone().unwrap_or_default(),
            to_number: call.to_number.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCallRequest {
    pub name: Option<String>,
    #[serde(rename = "phNo")]
    pub ph_no: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCallRequest {
    pub name: Option<String>,
    #[serde(rename = "phNo")]
    pub ph_no: Option<String>,
    pub email: Option<String>,
    /// Delay before the call fires, in minutes.
    pub delay: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCallRequest {
    pub leads: Option<Vec<super::BatchLeadInput>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCallResponse {
    pub message: String,
    #[serde(rename = "phoneCall")]
    pub phone_call: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleCallResponse {
    pub message: String,
    #[serde(rename = "jobId")]
    pub job_id: i64,
    #[serde(rename = "delay_in_Ms")]
    pub delay_in_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetCallsResponse {
    pub message: String,
    #[serde(rename = "callsOftheLead")]
    pub calls_of_the_lead: Vec<CallDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchCallResponse {
    pub status: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_call() -> Call {
        Call {
            id: 42,
            call_id: Some("call_abc".to_string()),
            status: "registered".to_string(),
            from_number: Some("+15550000".to_string()),
            to_number: Some("+15551234".to_string()),
            lead_id: Some(7),
            user_id: Some(1),
            analysis: None,
            transcript: None,
            recording_url: None,
            duration_ms: None,
            created_at: None,
        }
    }

    #[test]
    fn projection_defaults_missing_fields_to_placeholders() {
        let details = CallDetails::from(&bare_call());
        assert_eq!(details.call_db_id, "42");
        assert_eq!(details.transcript, TRANSCRIPT_PLACEHOLDER);
        assert_eq!(details.recording_url, RECORDING_PLACEHOLDER);
        assert_eq!(details.duration_ms, DURATION_MS_DEFAULT);
        assert_eq!(
            details.analysis,
            serde_json::Value::String(ANALYSIS_PLACEHOLDER.to_string())
        );
    }

    #[test]
    fn projection_keeps_populated_fields() {
        let mut call = bare_call();
        call.transcript = Some("Agent: hello".to_string());
        call.recording_url = Some("https://rec.example/abc.mp3".to_string());
        call.duration_ms = Some(61_500);
        call.analysis = Some(serde_json::json!({ "call_successful": true }));

        let details = CallDetails::from(&call);
        assert_eq!(details.transcript, "Agent: hello");
        assert_eq!(details.recording_url, "https://rec.example/abc.mp3");
        assert_eq!(details.duration_ms, 61_500);
        assert_eq!(details.analysis["call_successful"], true);
    }

    #[test]
    fn projection_serializes_wire_field_names() {
        let details = CallDetails::from(&bare_call());
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("callDBId").is_some());
        assert!(json.get("recordingUrl").is_some());
        assert!(json.get("durationMs").is_some());
        assert!(json.get("call_db_id").is_none());
    }
}
