//! Retell Voice API client

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CallMetadata;

#[derive(Error, Debug)]
pub enum RetellError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {message}")]
    Api { message: String },
}

#[derive(Clone)]
pub struct RetellClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl RetellClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.retellai.com".to_string(),
        }
    }

    async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, RetellError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetellError::Api { message: error_text });
        }

        Ok(response.json().await?)
    }

    /// Place an outbound phone call through the voice agent.
    pub async fn create_phone_call(
        &self,
        params: &CreatePhoneCallRequest,
    ) -> Result<PhoneCallResponse, RetellError> {
        self.post("/v2/create-phone-call", params).await
    }

    /// Place one batch of outbound calls in a single provider request.
    pub async fn create_batch_call(
        &self,
        params: &CreateBatchCallRequest,
    ) -> Result<serde_json::Value, RetellError> {
        self.post("/create-batch-call", params).await
    }
}

// Request/Response types

#[derive(Debug, Clone, Serialize)]
pub struct CreatePhoneCallRequest {
    pub from_number: String,
    pub to_number: String,
    pub override_agent_id: String,
    pub retell_llm_dynamic_variables: serde_json::Map<String, serde_json::Value>,
    pub metadata: CallMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBatchCallRequest {
    pub from_number: String,
    pub tasks: Vec<BatchCallTask>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchCallTask {
    pub to_number: String,
    pub retell_llm_dynamic_variables: serde_json::Map<String, serde_json::Value>,
    pub metadata: CallMetadata,
}

/// Provider response for a placed call. `call_id` and `call_status` drive the
/// local Call record; everything else is passed through to the API caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneCallResponse {
    pub call_id: String,
    pub call_status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
