use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// A callable contact, unique system-wide by phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    #[serde(rename = "phNo")]
    pub ph_no: String,
    pub email: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One entry of a `POST /call/batchCall` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLeadInput {
    pub name: Option<String>,
    #[serde(rename = "phNo")]
    pub ph_no: Option<String>,
    pub email: Option<String>,
}

impl BatchLeadInput {
    /// A lead can only be dialed with a non-empty phone number.
    pub fn is_dialable(&self) -> bool {
        self.ph_no.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllLeadsResponse {
    pub message: String,
    pub leads: Vec<Lead>,
}
