//! Authentication module with JWT
//!
//! Bearer tokens carry the user id and are valid for 30 days. The `AuthUser`
//! extractor validates the token and loads the full account row, so handlers
//! downstream always see current credit balances.

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::server::{db, error::ApiError, AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiration timestamp
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Create a JWT token for a user
pub fn create_token(user_id: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(30))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Authenticated request extractor: bearer token plus the account it names.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        let claims = validate_token(bearer.token(), &state.jwt_secret)
            .map_err(|_| ApiError::Unauthorized)?;

        let user = db::users::get_by_id(&state.db, claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser(user))
    }
}

/// Register handler
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (name, email, password) = match (req.name, req.email, req.password) {
        (Some(n), Some(e), Some(p)) if !n.is_empty() && !e.is_empty() && !p.is_empty() => (n, e, p),
        _ => return Err(ApiError::Validation("Please add all fields".to_string())),
    };

    if db::users::get_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Validation("User already exists".to_string()));
    }

    let password_hash = hash_password(&password)
        .map_err(|_| ApiError::Validation("Invalid user data".to_string()))?;

    let user = db::users::create(&state.db, &name, &email, &password_hash).await?;
    let token = create_token(user.id, &state.jwt_secret)
        .map_err(|_| ApiError::Validation("Invalid user data".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }),
    ))
}

/// Login handler
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = db::users::get_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid credentials".to_string()))?;

    let valid = verify_password(&req.password, &user.password_hash).unwrap_or(false);
    if !valid {
        return Err(ApiError::Validation("Invalid credentials".to_string()));
    }

    let token = create_token(user.id, &state.jwt_secret)
        .map_err(|_| ApiError::Validation("Invalid credentials".to_string()))?;

    Ok(Json(AuthResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub message: String,
    pub user: crate::models::UserInfo,
}

/// `GET /user/me`
pub async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        message: "User fetched successfully".to_string(),
        user: user.to_info(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_user_id() {
        let token = create_token(42, "test-secret").unwrap();
        let claims = validate_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.exp > chrono::Utc::now().timestamp() as usize);
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = create_token(42, "test-secret").unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }
}
