use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, stringified.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i32, ttl_minutes: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::minutes(ttl_minutes as i64)).timestamp();

        Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp,
        }
    }
}

/// Issue a signed bearer token for the given user.
pub fn issue_token(security: &SecurityConfig, user_id: i32) -> Result<String, ApiError> {
    if security.jwt_secret.is_empty() {
        tracing::error!("JWT secret not configured");
        return Err(ApiError::internal_server_error("Token signing unavailable"));
    }

    let claims = Claims::new(user_id, security.jwt_expiry_minutes);
    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());

    encode(&Header::default(), &claims, &encoding_key).map_err(|e| {
        tracing::error!("JWT generation error: {}", e);
        ApiError::internal_server_error("Token signing failed")
    })
}

/// Resolve a bearer token to the user id it was issued for. Fails with
/// `Unauthorized` on bad signature, expiry, or a missing/malformed subject.
pub fn resolve_token(security: &SecurityConfig, token: &str) -> Result<i32, ApiError> {
    if security.jwt_secret.is_empty() {
        return Err(ApiError::unauthorized("JWT secret not configured"));
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|_| ApiError::unauthorized("Could not validate credentials"))?;

    token_data
        .claims
        .sub
        .parse::<i32>()
        .map_err(|_| ApiError::unauthorized("Could not validate credentials"))
}

/// One-way salted hash of a plaintext credential.
pub fn hash_password(security: &SecurityConfig, plaintext: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(plaintext, security.bcrypt_cost)?)
}

pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Registration password policy: 8-16 characters, at least one uppercase
/// letter, one lowercase letter, one digit, and one symbol. Checked before any
/// persistence happens.
pub fn validate_password_policy(password: &str) -> Result<(), ApiError> {
    let length = password.chars().count();
    let ok = (8..=16).contains(&length)
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_alphanumeric() && c != '_' && !c.is_whitespace());

    if ok {
        Ok(())
    } else {
        Err(ApiError::validation_error(
            "Password must be 8-16 characters, include upper and lower case letters, \
             at least one number, and one symbol.",
        ))
    }
}
