use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Account that owns leads and pays for call minutes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Remaining call minutes.
    pub credits: f64,
    #[serde(rename = "totalMinsUsed")]
    pub total_mins_used: f64,
    pub plan: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            credits: self.credits,
            total_mins_used: self.total_mins_used,
            plan: self.plan.clone(),
            created_at: self.created_at,
        }
    }
}

/// User shape returned to clients, password hash stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub credits: f64,
    #[serde(rename = "totalMinsUsed")]
    pub total_mins_used: f64,
    pub plan: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub token: String,
}
