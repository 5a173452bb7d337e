//! Typed envelope for inbound Retell webhook events.
//!
//! The provider posts loosely-shaped JSON; everything beyond the event name is
//! optional at the wire level and validated explicitly by the ingestor.

use serde::{Deserialize, Serialize};

/// Lifecycle event names the provider delivers.
///
/// Anything unrecognized lands on `Other` and is acknowledged without any
/// state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    CallStarted,
    CallEnded,
    CallAnalyzed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: WebhookEvent,
    pub call: Option<WebhookCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookCall {
    pub call_id: Option<String>,
    pub call_status: Option<String>,
    pub call_analysis: Option<CallAnalysis>,
    pub metadata: Option<CallMetadata>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub retell_llm_dynamic_variables: Option<serde_json::Map<String, serde_json::Value>>,
    pub agent_id: Option<String>,
}

/// Call identifiers we attach when placing calls, echoed back by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallMetadata {
    #[serde(rename = "leadId")]
    pub lead_id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    #[serde(rename = "isBatchCallRecord", default)]
    pub is_batch_call_record: bool,
}

/// Post-call analysis blob. Stored verbatim; only the scheduling hints in
/// `custom_analysis_data` are inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct CallAnalysis {
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl CallAnalysis {
    fn custom_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get("custom_analysis_data")?.get(key)
    }

    /// The agent can flag a call for a follow-up. Accepted as boolean `true`
    /// or the case-insensitive string `"true"`; anything else means no.
    pub fn needs_scheduling(&self) -> bool {
        match self.custom_field("need_scheduling") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Follow-up delay in minutes, from the same custom data block.
    pub fn schedule_delay_minutes(&self) -> Option<i64> {
        match self.custom_field("schedule_delay") {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis(custom: serde_json::Value) -> CallAnalysis {
        serde_json::from_value(json!({
            "call_successful": true,
            "custom_analysis_data": custom,
        }))
        .unwrap()
    }

    #[test]
    fn known_events_deserialize() {
        let env: WebhookEnvelope =
            serde_json::from_value(json!({ "event": "call_analyzed" })).unwrap();
        assert_eq!(env.event, WebhookEvent::CallAnalyzed);
        assert!(env.call.is_none());

        let env: WebhookEnvelope =
            serde_json::from_value(json!({ "event": "call_started", "call": {} })).unwrap();
        assert_eq!(env.event, WebhookEvent::CallStarted);
    }

    #[test]
    fn unknown_event_maps_to_other() {
        let env: WebhookEnvelope =
            serde_json::from_value(json!({ "event": "call_transferred" })).unwrap();
        assert_eq!(env.event, WebhookEvent::Other);
    }

    #[test]
    fn need_scheduling_accepts_bool_and_string_true() {
        assert!(analysis(json!({ "need_scheduling": true })).needs_scheduling());
        assert!(analysis(json!({ "need_scheduling": "true" })).needs_scheduling());
        assert!(analysis(json!({ "need_scheduling": "TRUE" })).needs_scheduling());
    }

    #[test]
    fn need_scheduling_rejects_everything_else() {
        assert!(!analysis(json!({ "need_scheduling": false })).needs_scheduling());
        assert!(!analysis(json!({ "need_scheduling": "yes" })).needs_scheduling());
        assert!(!analysis(json!({ "need_scheduling": 1 })).needs_scheduling());
        assert!(!analysis(json!({})).needs_scheduling());

        let no_custom: CallAnalysis =
            serde_json::from_value(json!({ "call_successful": false })).unwrap();
        assert!(!no_custom.needs_scheduling());
    }

    #[test]
    fn schedule_delay_reads_numbers_and_numeric_strings() {
        assert_eq!(
            analysis(json!({ "schedule_delay": 10 })).schedule_delay_minutes(),
            Some(10)
        );
        assert_eq!(
            analysis(json!({ "schedule_delay": "15" })).schedule_delay_minutes(),
            Some(15)
        );
        assert_eq!(
            analysis(json!({ "schedule_delay": "soon" })).schedule_delay_minutes(),
            None
        );
        assert_eq!(analysis(json!({})).schedule_delay_minutes(), None);
    }

    #[test]
    fn metadata_round_trips_wire_names() {
        let meta: CallMetadata = serde_json::from_value(json!({
            "leadId": 9,
            "userId": 3,
            "isBatchCallRecord": true,
        }))
        .unwrap();
        assert_eq!(meta.lead_id, Some(9));
        assert_eq!(meta.user_id, Some(3));
        assert!(meta.is_batch_call_record);

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["isBatchCallRecord"], true);
        assert_eq!(back["leadId"], 9);
    }

    #[test]
    fn batch_flag_defaults_to_false() {
        let meta: CallMetadata = serde_json::from_value(json!({ "leadId": 1 })).unwrap();
        assert!(!meta.is_batch_call_record);
    }
}
