use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::ApiError;
use crate::models::{Login, User, UserStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

/// User projection returned to clients; never includes the credential hash.
#[derive(Debug, Serialize)]
pub struct UserOut {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub registered_date: DateTime<Utc>,
    pub last_login_date: Option<DateTime<Utc>>,
    pub user_status: UserStatus,
    pub user_is_active: bool,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            registered_date: user.registered_date,
            last_login_date: user.last_login_date,
            user_status: user.user_status,
            user_is_active: user.user_is_active,
        }
    }
}

/// POST /users/register/ - create a new account.
///
/// The password policy is enforced before anything is persisted; the stored
/// credential is a bcrypt hash, never the plaintext.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserOut>), ApiError> {
    auth::validate_password_policy(&body.password)?;

    let existing: Option<i32> = sqlx::query_scalar("SELECT user_id FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = auth::hash_password(&state.config.security, &body.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (first_name, last_name, email, password_hash, phone_number) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&body.first_name)
    .bind(&body.last_name)
    .bind(&body.email)
    .bind(&password_hash)
    .bind(&body.phone_number)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = user.user_id, "registered new user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserPreview {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub last_login_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserPreview,
}

/// POST /users/login/ - verify credentials and issue a bearer token.
///
/// A successful login appends an immutable audit row and stamps the user's
/// `last_login_date` with that row's timestamp, in one transaction.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No registered user found with this email"))?;

    if !auth::verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Incorrect password"));
    }

    let client_ip = body
        .ip_address
        .clone()
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let mut tx = state.pool.begin().await?;

    let login_row = sqlx::query_as::<_, Login>(
        "INSERT INTO user_logins (user_id, ip_address) VALUES ($1, $2) RETURNING *",
    )
    .bind(user.user_id)
    .bind(&client_ip)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET last_login_date = $1 WHERE user_id = $2")
        .bind(login_row.login_timestamp)
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let access_token = auth::issue_token(&state.config.security, user.user_id)?;
    tracing::info!(user_id = user.user_id, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        user: UserPreview {
            user_id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            last_login_date: Some(login_row.login_timestamp),
        },
    }))
}
